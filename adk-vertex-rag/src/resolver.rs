//! Corpus name resolution.
//!
//! [`CorpusResolver`] maps whatever a user or model calls a corpus (a full
//! resource path, a display name, or a bare id) onto a canonical
//! `projects/{project}/locations/{location}/ragCorpora/{id}` path. It never
//! fails: when nothing better is known it falls back to the configured
//! default corpus or to a sanitized id derived from the input.
//!
//! Precedence:
//!
//! 1. an input that is already canonical is returned unchanged
//! 2. the configured default display name maps to the default corpus
//! 3. a display name found among the known corpora maps to that corpus
//! 4. if the known corpora could not be listed, a simple token
//!    (`[a-zA-Z0-9_-]+`) maps to the default corpus
//! 5. otherwise the last path segment, sanitized, is used as the id

use tracing::{debug, warn};

use crate::config::CorpusConfig;
use crate::error::Result;
use crate::resource::{is_canonical_corpus_name, is_simple_token, sanitize_id};
use crate::service::{Corpus, RagService};

/// Generic names treated as "the default corpus" when listing fails.
const GENERIC_DEFAULTS: [&str; 2] = ["test", "default"];

/// Resolves corpus identifiers against a [`CorpusConfig`].
#[derive(Debug, Clone, Copy)]
pub struct CorpusResolver<'a> {
    config: &'a CorpusConfig,
}

impl<'a> CorpusResolver<'a> {
    pub fn new(config: &'a CorpusConfig) -> Self {
        Self { config }
    }

    /// Resolve `identifier`, listing corpora through `service` only when the
    /// configuration alone cannot decide.
    ///
    /// A listing failure is logged and treated as "known corpora unavailable";
    /// passing `None` for `service` has the same effect.
    pub async fn resolve(&self, identifier: &str, service: Option<&dyn RagService>) -> String {
        if let Some(resolved) = self.resolve_from_config(identifier) {
            return resolved;
        }

        let known = match service {
            Some(service) => match service.list_corpora().await {
                Ok(corpora) => Some(corpora),
                Err(e) => {
                    warn!(identifier, error = %e, "listing corpora failed during name resolution");
                    None
                }
            },
            None => None,
        };

        self.resolve_with(identifier, known.as_deref())
    }

    /// Resolve `identifier` without the listing-failure fallback.
    ///
    /// Used before destructive or targeted operations, where silently
    /// falling back to the default corpus would act on the wrong corpus.
    ///
    /// # Errors
    ///
    /// Returns the service error when the corpora cannot be listed.
    pub async fn try_resolve(&self, identifier: &str, service: &dyn RagService) -> Result<String> {
        if let Some(resolved) = self.resolve_from_config(identifier) {
            return Ok(resolved);
        }
        let known = service.list_corpora().await?;
        Ok(self.resolve_with(identifier, Some(&known)))
    }

    /// Resolve `identifier` against a snapshot of known corpora.
    ///
    /// `known` is `None` when the corpora could not be listed.
    pub fn resolve_with(&self, identifier: &str, known: Option<&[Corpus]>) -> String {
        if let Some(resolved) = self.resolve_from_config(identifier) {
            return resolved;
        }
        let identifier = identifier.trim();

        match known {
            Some(corpora) => {
                if let Some(corpus) = corpora.iter().find(|c| {
                    c.display_name == identifier && is_canonical_corpus_name(&c.name)
                }) {
                    debug!(identifier, corpus = %corpus.name, "resolved corpus by display name");
                    return corpus.name.clone();
                }
            }
            None => {
                if is_simple_token(identifier) || GENERIC_DEFAULTS.contains(&identifier) {
                    debug!(identifier, "corpora unavailable, using default corpus");
                    return self.config.default_corpus_path();
                }
            }
        }

        self.derive(identifier)
    }

    /// Steps that need no listing: canonical input, empty input, and the
    /// default display name.
    fn resolve_from_config(&self, identifier: &str) -> Option<String> {
        if is_canonical_corpus_name(identifier) {
            return Some(identifier.to_string());
        }
        let trimmed = identifier.trim();
        if trimmed.is_empty() || trimmed == self.config.default_display_name {
            return Some(self.config.default_corpus_path());
        }
        None
    }

    fn derive(&self, identifier: &str) -> String {
        let last = identifier.rsplit('/').next().unwrap_or(identifier);
        let id = sanitize_id(last);
        if id.is_empty() {
            return self.config.default_corpus_path();
        }
        debug!(identifier, id = %id, "derived corpus id from identifier");
        self.config.corpus_path(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CorpusConfig {
        CorpusConfig::builder()
            .project_id("gen-lang-client-0516570023")
            .location("us-central1")
            .default_corpus_id("4532873024948404224")
            .default_display_name("test")
            .build()
            .unwrap()
    }

    fn corpus(id: &str, display_name: &str) -> Corpus {
        Corpus {
            name: format!("projects/gen-lang-client-0516570023/locations/us-central1/ragCorpora/{id}"),
            display_name: display_name.to_string(),
            description: None,
            create_time: None,
            update_time: None,
        }
    }

    const DEFAULT_PATH: &str =
        "projects/gen-lang-client-0516570023/locations/us-central1/ragCorpora/4532873024948404224";

    #[test]
    fn canonical_input_is_returned_unchanged() {
        let config = config();
        let resolver = CorpusResolver::new(&config);
        assert_eq!(
            resolver.resolve_with("projects/p/locations/l/ragCorpora/42", None),
            "projects/p/locations/l/ragCorpora/42"
        );
    }

    #[test]
    fn default_display_name_maps_to_default_corpus() {
        let config = config();
        let resolver = CorpusResolver::new(&config);
        assert_eq!(resolver.resolve_with("test", Some(&[corpus("9", "test")])), DEFAULT_PATH);
    }

    #[test]
    fn display_name_found_in_listing() {
        let config = config();
        let resolver = CorpusResolver::new(&config);
        let known = [corpus("1", "Site Plans"), corpus("2", "contracts"), corpus("3", "contracts")];
        assert_eq!(resolver.resolve_with("contracts", Some(&known)), known[1].name);
        assert_eq!(resolver.resolve_with("Site Plans", Some(&known)), known[0].name);
    }

    #[test]
    fn simple_token_falls_back_to_default_when_listing_unavailable() {
        let config = config();
        let resolver = CorpusResolver::new(&config);
        assert_eq!(resolver.resolve_with("contracts", None), DEFAULT_PATH);
        assert_eq!(resolver.resolve_with("default", None), DEFAULT_PATH);
    }

    #[test]
    fn unmatched_name_with_listing_derives_id() {
        let config = config();
        let resolver = CorpusResolver::new(&config);
        assert_eq!(
            resolver.resolve_with("contracts", Some(&[])),
            "projects/gen-lang-client-0516570023/locations/us-central1/ragCorpora/contracts"
        );
    }

    #[test]
    fn complex_name_is_sanitized_from_last_segment() {
        let config = config();
        let resolver = CorpusResolver::new(&config);
        assert_eq!(
            resolver.resolve_with("shared/Site Plans v2", None),
            "projects/gen-lang-client-0516570023/locations/us-central1/ragCorpora/Site_Plans_v2"
        );
    }

    #[test]
    fn empty_or_degenerate_input_uses_default() {
        let config = config();
        let resolver = CorpusResolver::new(&config);
        assert_eq!(resolver.resolve_with("", None), DEFAULT_PATH);
        assert_eq!(resolver.resolve_with("   ", Some(&[])), DEFAULT_PATH);
        assert_eq!(resolver.resolve_with("a/b/", Some(&[])), DEFAULT_PATH);
    }

    #[test]
    fn listing_with_non_canonical_name_is_ignored() {
        let config = config();
        let resolver = CorpusResolver::new(&config);
        let mut odd = corpus("1", "odd");
        odd.name = "ragCorpora/1".to_string();
        assert_eq!(
            resolver.resolve_with("odd", Some(&[odd])),
            "projects/gen-lang-client-0516570023/locations/us-central1/ragCorpora/odd"
        );
    }

    #[test]
    fn resolution_is_idempotent_on_examples() {
        let config = config();
        let resolver = CorpusResolver::new(&config);
        for input in ["test", "contracts", "My Docs", "x/y/z", "", "projects/p/locations/l/ragCorpora/1"]
        {
            let once = resolver.resolve_with(input, None);
            assert_eq!(resolver.resolve_with(&once, None), once);
            assert!(is_canonical_corpus_name(&once));
        }
    }
}
