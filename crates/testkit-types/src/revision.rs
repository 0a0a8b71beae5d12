//! Revision id and document id helpers.

/// Id prefix of the principal documents the server injects into a user's feed.
pub const PRINCIPAL_DOC_PREFIX: &str = "_user/";

/// Whether `doc_id` is a server-generated principal document rather than user data.
pub fn is_principal_doc(doc_id: &str) -> bool {
    doc_id.starts_with(PRINCIPAL_DOC_PREFIX)
}

/// Generation number of a revision id of the form `N-digest`.
///
/// Returns `None` when the id does not start with a decimal generation
/// followed by `-`.
pub fn revision_generation(rev: &str) -> Option<u64> {
    let (generation, digest) = rev.split_once('-')?;
    if digest.is_empty() || generation.is_empty() {
        return None;
    }
    if !generation.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    generation.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_generation() {
        assert_eq!(revision_generation("1-abc"), Some(1));
        assert_eq!(revision_generation("11-5f2e8d"), Some(11));
        assert_eq!(revision_generation("abc"), None);
        assert_eq!(revision_generation("x-abc"), None);
        assert_eq!(revision_generation("3-"), None);
        assert_eq!(revision_generation("-abc"), None);
    }

    #[test]
    fn test_principal_doc() {
        assert!(is_principal_doc("_user/seth"));
        assert!(!is_principal_doc("seth_0"));
        assert!(!is_principal_doc("_local/checkpoint"));
    }
}
