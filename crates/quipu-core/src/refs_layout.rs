//! The multi-owner `refs/quipu/*` ref layout (spec §4.3).
//!
//! ```text
//! refs/quipu/
//! ├── local/heads/<branch>                     this machine's own heads
//! ├── remotes/<remote>/<owner_id>/heads/<branch> local mirrors of other owners
//! └── users/<owner_id>/heads/<branch>           canonical remote-side layout
//! ```

/// Prefix under which all quipu refs live.
pub const QUIPU_PREFIX: &str = "refs/quipu/";

/// Prefix for this machine's own heads.
pub const LOCAL_HEADS_PREFIX: &str = "refs/quipu/local/heads/";

/// Build this machine's head ref name for `branch`.
#[must_use]
pub fn local_head_ref(branch: &str) -> String {
    format!("{LOCAL_HEADS_PREFIX}{branch}")
}

/// Build the local mirror ref name for `owner_id`'s heads fetched from `remote`.
#[must_use]
pub fn remote_mirror_head_ref(remote: &str, owner_id: &str, branch: &str) -> String {
    format!("refs/quipu/remotes/{remote}/{owner_id}/heads/{branch}")
}

/// Build the canonical remote-side publish ref name for `owner_id`.
#[must_use]
pub fn user_head_ref(owner_id: &str, branch: &str) -> String {
    format!("refs/quipu/users/{owner_id}/heads/{branch}")
}

/// Resolve the owning `owner_id` for a ref name, per §4.3:
///
/// - `refs/quipu/remotes/<remote>/<owner_id>/heads/...` → `owner_id`.
/// - `refs/quipu/local/heads/...` → `local_user_id`.
/// - anything else → `None` (unknown, caller should skip with a warning).
#[must_use]
pub fn resolve_owner(ref_name: &str, local_user_id: &str) -> Option<String> {
    if ref_name.starts_with(LOCAL_HEADS_PREFIX) {
        return Some(local_user_id.to_owned());
    }
    let rest = ref_name.strip_prefix("refs/quipu/remotes/")?;
    let mut parts = rest.splitn(3, '/');
    let _remote = parts.next()?;
    let owner = parts.next()?;
    let tail = parts.next()?;
    if tail.starts_with("heads/") && !owner.is_empty() {
        Some(owner.to_owned())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ref_resolves_to_local_user() {
        assert_eq!(
            resolve_owner("refs/quipu/local/heads/main", "me"),
            Some("me".to_owned())
        );
    }

    #[test]
    fn remote_mirror_ref_resolves_to_owner_group() {
        assert_eq!(
            resolve_owner("refs/quipu/remotes/origin/u1/heads/main", "me"),
            Some("u1".to_owned())
        );
    }

    #[test]
    fn unrelated_ref_resolves_to_none() {
        assert_eq!(resolve_owner("refs/heads/main", "me"), None);
        assert_eq!(resolve_owner("refs/quipu/users/u1/heads/main", "me"), None);
    }

    #[test]
    fn builders_produce_expected_paths() {
        assert_eq!(local_head_ref("main"), "refs/quipu/local/heads/main");
        assert_eq!(
            remote_mirror_head_ref("origin", "u1", "main"),
            "refs/quipu/remotes/origin/u1/heads/main"
        );
        assert_eq!(user_head_ref("u1", "main"), "refs/quipu/users/u1/heads/main");
    }
}
