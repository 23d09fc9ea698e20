use std::collections::HashSet;

use crate::models::comment::Comment;

/// Merge remote-fetched and locally-cached comments into the canonical
/// list shown to the user.
///
/// Remote entries are listed first so they win id ties, duplicates are
/// collapsed keeping the first occurrence, and the deduplicated
/// concatenation is reversed. The caller feeds `remote` newest-first (the
/// backend's return order); this is an explicit ordering contract, not an
/// incidental detail. An empty `remote` degrades the result to cached
/// comments only.
pub fn merge(remote: Vec<Comment>, local: Vec<Comment>) -> Vec<Comment> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Comment> = remote
        .into_iter()
        .chain(local)
        .filter(|comment| seen.insert(comment.id.clone()))
        .collect();
    merged.reverse();
    merged
}
