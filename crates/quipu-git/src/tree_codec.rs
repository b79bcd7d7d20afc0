//! Direct binary decoding of git tree objects.
//!
//! The git tree format is `<mode:ASCII> SP <name> NUL <sha:20 bytes>`
//! repeated for each entry. Hydration needs to pull the `metadata.json`
//! blob hash out of many trees in a hot loop, so this decodes the raw bytes
//! directly rather than paying `gix`'s full tree-object decode for every
//! tree, per the spec's stated hot-path requirement.

use crate::types::Oid;

/// Decode raw tree object bytes into `(mode, name, oid)` triples.
///
/// Returns an error if the buffer is truncated mid-entry.
pub fn decode_tree(data: &[u8]) -> Result<Vec<(String, String, Oid)>, &'static str> {
    let mut entries = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let space = data[i..]
            .iter()
            .position(|&b| b == b' ')
            .ok_or("missing SP after mode")?;
        let mode = std::str::from_utf8(&data[i..i + space]).map_err(|_| "mode is not UTF-8")?;
        i += space + 1;

        let nul = data[i..]
            .iter()
            .position(|&b| b == 0)
            .ok_or("missing NUL after name")?;
        let name = std::str::from_utf8(&data[i..i + nul]).map_err(|_| "name is not UTF-8")?;
        i += nul + 1;

        if data.len() < i + 20 {
            return Err("truncated SHA in tree entry");
        }
        let mut sha = [0u8; 20];
        sha.copy_from_slice(&data[i..i + 20]);
        i += 20;

        entries.push((mode.to_owned(), name.to_owned(), Oid::from_bytes(sha)));
    }
    Ok(entries)
}

/// Find a single named entry's OID in raw tree bytes without allocating the
/// whole entry list.
#[must_use]
pub fn find_entry(data: &[u8], target_name: &str) -> Option<Oid> {
    let mut i = 0;
    while i < data.len() {
        let space = data[i..].iter().position(|&b| b == b' ')?;
        i += space + 1;

        let nul = data[i..].iter().position(|&b| b == 0)?;
        let name = std::str::from_utf8(&data[i..i + nul]).ok()?;
        let name_end = i + nul;
        i = name_end + 1;

        if data.len() < i + 20 {
            return None;
        }
        if name == target_name {
            let mut sha = [0u8; 20];
            sha.copy_from_slice(&data[i..i + 20]);
            return Some(Oid::from_bytes(sha));
        }
        i += 20;
    }
    None
}

/// Encode `(mode, name, oid)` triples into raw tree object bytes, in the
/// order given (callers are responsible for git's canonical name ordering).
#[must_use]
pub fn encode_tree(entries: &[(&str, &str, Oid)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (mode, name, oid) in entries {
        out.extend_from_slice(mode.as_bytes());
        out.push(b' ');
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        out.extend_from_slice(oid.as_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_single_entry() {
        let oid = Oid::EMPTY_TREE;
        let encoded = encode_tree(&[("100644", "metadata.json", oid)]);
        let decoded = decode_tree(&encoded).unwrap();
        assert_eq!(decoded, vec![("100644".to_owned(), "metadata.json".to_owned(), oid)]);
    }

    #[test]
    fn find_entry_locates_by_name() {
        let oid_a = Oid::EMPTY_TREE;
        let oid_b = Oid::from_bytes([7; 20]);
        let encoded = encode_tree(&[
            ("100644", "metadata.json", oid_a),
            ("100644", "plan.md", oid_b),
        ]);
        assert_eq!(find_entry(&encoded, "plan.md"), Some(oid_b));
        assert_eq!(find_entry(&encoded, "missing"), None);
    }

    #[test]
    fn decode_rejects_truncated_sha() {
        let mut bytes = b"100644 a\0".to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        assert!(decode_tree(&bytes).is_err());
    }
}
