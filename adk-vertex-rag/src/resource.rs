//! Canonical resource paths used by the RAG platform API.
//!
//! Corpora are addressed as `projects/{project}/locations/{location}/ragCorpora/{id}`
//! and their files as `{corpus}/ragFiles/{document_id}`. Both formats are
//! reproduced exactly.

use std::sync::LazyLock;

use regex::Regex;

static CORPUS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^projects/[^/]+/locations/[^/]+/ragCorpora/[^/]+$")
        .expect("corpus name pattern is valid")
});

static SIMPLE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("token pattern is valid"));

/// Build the canonical path of a corpus.
pub fn corpus_resource_name(project_id: &str, location: &str, corpus_id: &str) -> String {
    format!("projects/{project_id}/locations/{location}/ragCorpora/{corpus_id}")
}

/// Build the canonical path of a file inside a corpus.
pub fn rag_file_name(corpus_name: &str, document_id: &str) -> String {
    format!("{corpus_name}/ragFiles/{document_id}")
}

/// Whether `name` is a canonical four-segment corpus path.
pub fn is_canonical_corpus_name(name: &str) -> bool {
    CORPUS_NAME.is_match(name)
}

/// Whether `value` consists only of `[a-zA-Z0-9_-]` characters.
pub fn is_simple_token(value: &str) -> bool {
    SIMPLE_TOKEN.is_match(value)
}

/// Whether `value` can stand as one segment of a resource path.
pub(crate) fn is_path_segment(value: &str) -> bool {
    !value.is_empty() && !value.contains('/') && !value.chars().any(char::is_whitespace)
}

/// The last `/`-separated segment of a resource name (its id).
pub fn resource_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Replace every character outside `[a-zA-Z0-9_-]` with `_`.
pub fn sanitize_id(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_canonical_names() {
        assert!(is_canonical_corpus_name("projects/p/locations/l/ragCorpora/42"));
        assert!(!is_canonical_corpus_name("projects/p/locations/l/ragCorpora/"));
        assert!(!is_canonical_corpus_name("projects/p/locations/l/ragCorpora/42/ragFiles/1"));
        assert!(!is_canonical_corpus_name("locations/l/ragCorpora/42"));
        assert!(!is_canonical_corpus_name("my corpus"));
    }

    #[test]
    fn builds_file_names() {
        let corpus = corpus_resource_name("p", "us-central1", "7");
        assert_eq!(
            rag_file_name(&corpus, "99"),
            "projects/p/locations/us-central1/ragCorpora/7/ragFiles/99"
        );
    }

    #[test]
    fn sanitizes_non_token_characters() {
        assert_eq!(sanitize_id("Site Plans (v2).pdf"), "Site_Plans__v2__pdf");
        assert_eq!(sanitize_id("ok_id-1"), "ok_id-1");
        assert_eq!(sanitize_id("é"), "_");
    }

    #[test]
    fn extracts_resource_id() {
        assert_eq!(resource_id("projects/p/locations/l/ragCorpora/42/ragFiles/abc"), "abc");
        assert_eq!(resource_id("plain"), "plain");
        assert_eq!(resource_id("trailing/"), "");
    }
}
