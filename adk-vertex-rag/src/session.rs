//! Per-session corpus state.
//!
//! A [`SessionState`] lives for one conversation. It remembers which corpus
//! names have been confirmed to exist (positive results only), the resource
//! each of them resolved to, and which corpus is "current", i.e. used when a request names none. It is owned by
//! the session and passed by `&mut` to the tools, so it needs no locking.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CorpusConfig;
use crate::resolver::CorpusResolver;
use crate::service::RagService;

/// Corpus flags scoped to a single session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
    /// Confirmed name mapped to its canonical resource name.
    confirmed: HashMap<String, String>,
    current_corpus: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The corpus used when a request names none.
    pub fn current_corpus(&self) -> Option<&str> {
        self.current_corpus.as_deref()
    }

    pub fn set_current_corpus(&mut self, name: impl Into<String>) {
        self.current_corpus = Some(name.into());
    }

    /// Set the current corpus only if none is set yet.
    pub fn adopt_current_corpus(&mut self, name: &str) {
        if self.current_corpus.is_none() {
            self.current_corpus = Some(name.to_string());
        }
    }

    /// Whether `name` was already confirmed to exist in this session.
    pub fn is_confirmed(&self, name: &str) -> bool {
        self.confirmed.contains_key(name)
    }

    /// Canonical resource name `name` was confirmed under.
    pub fn confirmed_resource(&self, name: &str) -> Option<&str> {
        self.confirmed.get(name).map(String::as_str)
    }

    /// Record that `name` exists as the corpus `resource_name`.
    pub fn confirm(&mut self, name: &str, resource_name: &str) {
        self.confirmed.insert(name.to_string(), resource_name.to_string());
    }

    /// Drop everything known about the corpus `resource_name`, under any
    /// name it was confirmed as. Used after the corpus was deleted.
    pub fn forget(&mut self, resource_name: &str) {
        let current_is_gone = self.current_corpus.as_deref().is_some_and(|current| {
            current == resource_name || self.confirmed_resource(current) == Some(resource_name)
        });
        if current_is_gone {
            self.current_corpus = None;
        }
        self.confirmed.retain(|name, resource| {
            name.as_str() != resource_name && resource.as_str() != resource_name
        });
    }
}

/// Outcome of an existence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorpusPresence {
    /// The corpus exists.
    Present,
    /// The listing succeeded and no corpus matched.
    Absent,
    /// The corpora could not be listed.
    LookupFailed(String),
}

impl CorpusPresence {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present)
    }
}

/// Check whether the corpus `name` exists.
///
/// A name confirmed earlier in the session is answered from `session` without
/// calling the service. Otherwise the corpora are listed once, `name` is
/// resolved against that listing, and a corpus matches by canonical name or
/// by display name. A match is memoized together with the corpus resource
/// name (see [`SessionState::confirmed_resource`]) and becomes the current corpus if
/// none is set. Negative results are never memoized.
pub async fn check_corpus(
    name: &str,
    session: &mut SessionState,
    config: &CorpusConfig,
    service: &dyn RagService,
) -> CorpusPresence {
    if session.is_confirmed(name) {
        return CorpusPresence::Present;
    }

    let corpora = match service.list_corpora().await {
        Ok(corpora) => corpora,
        Err(e) => {
            warn!(corpus = name, error = %e, "corpus existence lookup failed");
            return CorpusPresence::LookupFailed(e.to_string());
        }
    };

    let resolved = CorpusResolver::new(config).resolve_with(name, Some(&corpora));
    let display_name = name.trim();
    let found = corpora
        .iter()
        .find(|c| c.name == resolved)
        .or_else(|| corpora.iter().find(|c| c.display_name == display_name));
    let Some(corpus) = found else {
        debug!(corpus = name, resolved = %resolved, "corpus not found");
        return CorpusPresence::Absent;
    };

    session.confirm(name, &corpus.name);
    session.adopt_current_corpus(name);
    debug!(corpus = name, resource = %corpus.name, "corpus confirmed");
    CorpusPresence::Present
}

/// Conservative boolean view of [`check_corpus`]: a failed lookup counts as
/// "does not exist".
pub async fn corpus_exists(
    name: &str,
    session: &mut SessionState,
    config: &CorpusConfig,
    service: &dyn RagService,
) -> bool {
    check_corpus(name, session, config, service).await.is_present()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adopt_only_sets_when_empty() {
        let mut session = SessionState::new();
        session.adopt_current_corpus("a");
        session.adopt_current_corpus("b");
        assert_eq!(session.current_corpus(), Some("a"));
        session.set_current_corpus("c");
        assert_eq!(session.current_corpus(), Some("c"));
    }

    #[test]
    fn forget_clears_flag_and_current() {
        let mut session = SessionState::new();
        session.confirm("a", "projects/p/locations/l/ragCorpora/1");
        session.set_current_corpus("a");
        session.forget("projects/p/locations/l/ragCorpora/1");
        assert!(!session.is_confirmed("a"));
        assert_eq!(session.current_corpus(), None);
    }

    #[test]
    fn forget_clears_every_alias_of_the_corpus() {
        let resource = "projects/p/locations/l/ragCorpora/7";
        let mut session = SessionState::new();
        session.confirm("docs", resource);
        session.confirm(resource, resource);
        session.confirm("plans", "projects/p/locations/l/ragCorpora/8");
        session.set_current_corpus("docs");

        session.forget(resource);

        assert!(!session.is_confirmed("docs"));
        assert!(!session.is_confirmed(resource));
        assert!(session.is_confirmed("plans"));
        assert_eq!(session.current_corpus(), None);
    }

    #[test]
    fn forget_keeps_other_current_corpus() {
        let mut session = SessionState::new();
        session.confirm("a", "projects/p/locations/l/ragCorpora/1");
        session.confirm("b", "projects/p/locations/l/ragCorpora/2");
        session.set_current_corpus("b");
        session.forget("projects/p/locations/l/ragCorpora/1");
        assert_eq!(session.current_corpus(), Some("b"));
        assert_eq!(session.confirmed_resource("b"), Some("projects/p/locations/l/ragCorpora/2"));
    }
}
