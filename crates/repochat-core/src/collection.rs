//! Collection naming.
//!
//! Maps a repository identity to a storage-safe collection identifier:
//! 3–60 characters, alphanumerics and `_` only, never starting or ending
//! with `_`. The mapping is deterministic but not injective; distinct
//! repositories that normalize to the same string share a collection.

/// Longest name produced before the minimum-length suffix is considered.
const MAX_NAME_CHARS: usize = 60;

/// Shortest acceptable name.
const MIN_NAME_CHARS: usize = 3;

const SHORT_NAME_SUFFIX: &str = "_collection";

/// Derive the collection name for `owner`/`repo`.
///
/// 1. Join as `owner_repo` and turn `-` into `_`.
/// 2. Drop every character that is not alphanumeric or `_`.
/// 3. Trim leading and trailing `_`.
/// 4. Truncate to 60 characters.
/// 5. If shorter than 3 characters, append `_collection`.
/// 6. If the result still ends in `_`, replace that character with `x`.
///
/// ```rust
/// use repochat_core::collection::sanitize_collection_name;
///
/// assert_eq!(sanitize_collection_name("foo", "bar"), "foo_bar");
/// assert_eq!(sanitize_collection_name("a--b", "c.d"), "a__b_cd");
/// ```
pub fn sanitize_collection_name(owner: &str, repo: &str) -> String {
    let raw = format!("{}_{}", owner, repo).replace('-', "_");

    let filtered: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();

    let mut name: String = filtered
        .trim_matches('_')
        .chars()
        .take(MAX_NAME_CHARS)
        .collect();

    if name.chars().count() < MIN_NAME_CHARS {
        name.push_str(SHORT_NAME_SUFFIX);
        // Only an empty stem leaves the suffix's underscore in front.
        name = name.trim_start_matches('_').to_string();
    }

    if name.ends_with('_') {
        name.pop();
        name.push('x');
    }

    name
}
