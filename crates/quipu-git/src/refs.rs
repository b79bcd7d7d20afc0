//! Ref read/write/list operations, including compare-and-swap updates.

use gix::refs::transaction::{PreviousValue, Target};

use crate::error::GitError;
use crate::objects::{from_gix_oid, to_gix_oid};
use crate::types::Oid;

/// Read the current OID a ref points to, if it exists.
pub fn read_ref(repo: &gix::Repository, name: &str) -> Result<Option<Oid>, GitError> {
    match repo.find_reference(name) {
        Ok(mut r) => {
            let id = r.peel_to_id_in_place().map_err(|e| GitError::Backend {
                message: format!("failed to peel ref `{name}`: {e}"),
            })?;
            Ok(Some(from_gix_oid(id.detach())))
        }
        // gix doesn't distinguish "not found" from other lookup failures in
        // the easy `find_reference` API; treat any failure here as absence,
        // matching the cheaper ref-existence probes in the corpus.
        Err(_) => Ok(None),
    }
}

/// Compare-and-swap update of a ref: succeeds only if the ref's current
/// value matches `expected` (or `expected` is [`Oid::ZERO`] and the ref does
/// not yet exist).
pub fn update_ref(
    repo: &gix::Repository,
    name: &str,
    new_oid: Oid,
    expected: Oid,
) -> Result<(), GitError> {
    let previous = if expected.is_zero() {
        PreviousValue::MustNotExist
    } else {
        PreviousValue::ExistingMustMatch(Target::from(to_gix_oid(expected)))
    };

    repo.reference(name, to_gix_oid(new_oid), previous, "quipu: update ref")
        .map_err(|e| GitError::RefConflict {
            ref_name: name.to_owned(),
            message: e.to_string(),
        })?;
    Ok(())
}

/// Delete a ref unconditionally. A no-op if it doesn't exist.
pub fn delete_ref(repo: &gix::Repository, name: &str) -> Result<(), GitError> {
    match repo.find_reference(name) {
        Ok(r) => {
            r.delete().map_err(|e| GitError::Backend {
                message: format!("failed to delete ref `{name}`: {e}"),
            })?;
            Ok(())
        }
        Err(_) => Ok(()),
    }
}

/// List all refs under `prefix` as `(oid, full_ref_name)` pairs.
pub fn get_all_ref_heads(repo: &gix::Repository, prefix: &str) -> Result<Vec<(Oid, String)>, GitError> {
    let platform = repo.references().map_err(|e| GitError::Backend {
        message: format!("failed to open reference iterator: {e}"),
    })?;
    let iter = platform.prefixed(prefix).map_err(|e| GitError::Backend {
        message: format!("failed to list refs under `{prefix}`: {e}"),
    })?;

    let mut out = Vec::new();
    for r in iter {
        let mut r = r.map_err(|e| GitError::Backend {
            message: format!("failed to read ref entry under `{prefix}`: {e}"),
        })?;
        let full_name = r.name().as_bstr().to_string();
        let id = r.peel_to_id_in_place().map_err(|e| GitError::Backend {
            message: format!("failed to peel ref `{full_name}`: {e}"),
        })?;
        out.push((from_gix_oid(id.detach()), full_name));
    }
    Ok(out)
}
