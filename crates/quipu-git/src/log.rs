//! Commit-log walking and trailer parsing.

use crate::error::GitError;
use crate::objects::{from_gix_oid, to_gix_oid};
use crate::types::{CommitRecord, Oid};

/// Regex-free scan for the `X-Quipu-Output-Tree: <40-hex>` trailer in a
/// commit body. Matches `^X-Quipu-Output-Tree:\s*([0-9a-f]{40})\s*$` against
/// each line, as required by the spec.
#[must_use]
pub fn find_output_tree_trailer(body: &str) -> Option<Oid> {
    const PREFIX: &str = "X-Quipu-Output-Tree:";
    body.lines().find_map(|line| {
        let rest = line.strip_prefix(PREFIX)?;
        rest.trim().parse::<Oid>().ok()
    })
}

/// Walk all commits reachable from `heads`, newest first, decoding each into
/// a [`CommitRecord`]. Used by the Hydrator to fetch only missing commits.
pub fn log_ref(repo: &gix::Repository, heads: &[Oid]) -> Result<Vec<CommitRecord>, GitError> {
    if heads.is_empty() {
        return Ok(Vec::new());
    }
    let start: Vec<gix::ObjectId> = heads.iter().map(|h| to_gix_oid(*h)).collect();
    let walk = repo.rev_walk(start).all().map_err(|e| GitError::Backend {
        message: format!("failed to start rev-walk: {e}"),
    })?;

    let mut out = Vec::new();
    for info in walk {
        let info = info.map_err(|e| GitError::Backend {
            message: format!("rev-walk step failed: {e}"),
        })?;
        let commit = repo
            .find_commit(info.id)
            .map_err(|e| GitError::NotFound {
                message: format!("commit {}: {e}", info.id),
            })?;
        let decoded = commit.decode().map_err(|e| GitError::Backend {
            message: format!("failed to decode commit {}: {e}", info.id),
        })?;

        let tree = from_gix_oid(decoded.tree());
        let parents: Vec<Oid> = decoded.parents().map(from_gix_oid).collect();
        let message = decoded.message.to_string();
        let author = decoded.author();
        let timestamp = author.time().seconds as f64;
        let author_email = author.email.to_string();

        out.push(CommitRecord {
            hash: from_gix_oid(info.id),
            parents,
            tree,
            timestamp,
            author_email,
            body: message,
        });
    }
    Ok(out)
}

/// Reverse lookup: walk commits reachable from `heads` and return the most
/// recent one (by the Git parent-first walk order) whose Output-Tree trailer
/// equals `tree_sha`.
pub fn get_commit_by_output_tree(
    repo: &gix::Repository,
    heads: &[Oid],
    tree_sha: Oid,
) -> Result<Option<Oid>, GitError> {
    for record in log_ref(repo, heads)? {
        if find_output_tree_trailer(&record.body) == Some(tree_sha) {
            return Ok(Some(record.hash));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_trailer_in_multiline_body() {
        let body = "Capture drift\n\nsome notes\nX-Quipu-Output-Tree: 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n";
        let found = find_output_tree_trailer(body);
        assert_eq!(
            found,
            Some("4b825dc642cb6eb9a060e54bf8d69288fbee4904".parse().unwrap())
        );
    }

    #[test]
    fn missing_trailer_is_none() {
        assert_eq!(find_output_tree_trailer("just a summary\n"), None);
    }

    #[test]
    fn malformed_trailer_is_none() {
        assert_eq!(
            find_output_tree_trailer("X-Quipu-Output-Tree: not-hex\n"),
            None
        );
    }
}
