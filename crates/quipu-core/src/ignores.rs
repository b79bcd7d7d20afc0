//! Persistent ignores sync into `.git/info/exclude` (§4.10).

use std::fs;
use std::path::Path;

use crate::error::Result;

const BEGIN_SENTINEL: &str = "# --- Managed by Quipu ---";
const END_SENTINEL: &str = "# --- End Managed by Quipu ---";

/// Default ignore patterns used when no user configuration overrides them.
pub const DEFAULT_PATTERNS: &[&str] = &[".envs", ".vscode", "o.md", ".quipu/cache/"];

/// Write (or replace) the managed block in `exclude_path`, preserving any
/// surrounding content verbatim. Creates the file if it doesn't exist.
pub fn sync_ignores(exclude_path: &Path, patterns: &[String]) -> Result<()> {
    let existing = fs::read_to_string(exclude_path).unwrap_or_default();
    let rebuilt = replace_managed_block(&existing, patterns);
    if rebuilt != existing {
        if let Some(parent) = exclude_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(exclude_path, rebuilt)?;
    }
    Ok(())
}

fn replace_managed_block(existing: &str, patterns: &[String]) -> String {
    let begin = existing.find(BEGIN_SENTINEL);
    let end = existing.find(END_SENTINEL);

    let mut block = String::new();
    block.push_str(BEGIN_SENTINEL);
    block.push('\n');
    for pattern in patterns {
        block.push_str(pattern);
        block.push('\n');
    }
    block.push_str(END_SENTINEL);

    match (begin, end) {
        (Some(b), Some(e)) if e >= b => {
            let before = &existing[..b];
            let after_start = e + END_SENTINEL.len();
            let after = &existing[after_start..];
            format!("{before}{block}{after}")
        }
        _ => {
            if existing.is_empty() {
                format!("{block}\n")
            } else if existing.ends_with('\n') {
                format!("{existing}{block}\n")
            } else {
                format!("{existing}\n{block}\n")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_block_in_empty_file() {
        let out = replace_managed_block("", &["a".to_owned(), "b".to_owned()]);
        assert!(out.contains(BEGIN_SENTINEL));
        assert!(out.contains("a\nb\n"));
        assert!(out.contains(END_SENTINEL));
    }

    #[test]
    fn preserves_surrounding_content() {
        let existing = "# my own ignores\nfoo.txt\n";
        let out = replace_managed_block(existing, &["a".to_owned()]);
        assert!(out.starts_with("# my own ignores\nfoo.txt\n"));
        assert!(out.contains(BEGIN_SENTINEL));
    }

    #[test]
    fn replaces_only_between_sentinels() {
        let existing = format!(
            "before\n{BEGIN_SENTINEL}\nold-pattern\n{END_SENTINEL}\nafter\n"
        );
        let out = replace_managed_block(&existing, &["new-pattern".to_owned()]);
        assert!(out.starts_with("before\n"));
        assert!(out.ends_with("after\n"));
        assert!(out.contains("new-pattern"));
        assert!(!out.contains("old-pattern"));
    }

    #[test]
    fn idempotent_on_repeated_sync() {
        let first = replace_managed_block("", &["a".to_owned()]);
        let second = replace_managed_block(&first, &["a".to_owned()]);
        assert_eq!(first, second);
    }
}
