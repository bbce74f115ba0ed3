//! Maps a parsed identity to card records with an ordered fallback chain.
//!
//! Stage A looks up the exact printing by set code and collector number.
//! Stage B searches by name. If that finds nothing, it retries once with a
//! shortened query and only accepts the top hit when it plausibly names the
//! same card.

use thiserror::Error;

use super::card::CardCandidate;
use super::client::{CardSearch, SearchQuery};
use crate::log;
use crate::ocr::ParsedIdentity;

const MIN_NAME_LEN: usize = 3;
const MIN_FALLBACK_WORD_LEN: usize = 3;
const FALLBACK_PREFIX_LEN: usize = 8;

/// Why a capture produced no card.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveFailure {
    #[error("no readable name or set info")]
    NoNameDetected,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("search failed: {0}")]
    SearchTransport(String),
}

/// Outcome of resolving one capture.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionResult {
    Resolved {
        primary: CardCandidate,
        variants: Vec<CardCandidate>,
    },
    Unresolved(ResolveFailure),
}

impl ResolutionResult {
    fn from_results(results: Vec<CardCandidate>) -> Option<Self> {
        let primary = results.first()?.clone();
        Some(ResolutionResult::Resolved {
            primary,
            variants: results,
        })
    }

    #[cfg(test)]
    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolutionResult::Resolved { .. })
    }
}

/// Picks a shorter query for a name that found nothing.
///
/// Prefers the first word when it is a real word rather than the whole name,
/// otherwise the first eight characters of a long name.
pub fn fallback_query(name: &str) -> Option<String> {
    let first_word = name.split_whitespace().next().unwrap_or("");
    let word_len = first_word.chars().count();
    let name_len = name.chars().count();

    if word_len < name_len && word_len > MIN_FALLBACK_WORD_LEN {
        Some(first_word.to_string())
    } else if name_len > FALLBACK_PREFIX_LEN {
        Some(name.chars().take(FALLBACK_PREFIX_LEN).collect())
    } else {
        None
    }
}

/// Guards against false positives from truncated queries.
fn accept_fallback(name: &str, fallback: &str, top: &CardCandidate) -> bool {
    let name = name.to_lowercase();
    let result_name = top.name().to_lowercase();
    if result_name.is_empty() {
        return false;
    }
    let fallback = fallback.to_lowercase();
    name.contains(&result_name) || result_name.contains(&fallback)
}

/// Stage A / Stage B resolver over a search service.
pub struct ResolutionEngine<'a> {
    search: &'a dyn CardSearch,
}

impl<'a> ResolutionEngine<'a> {
    pub fn new(search: &'a dyn CardSearch) -> Self {
        Self { search }
    }

    pub fn resolve(&self, identity: &ParsedIdentity) -> ResolutionResult {
        log(&format!(
            "Resolving: name=\"{}\", set=\"{}\", cn=\"{}\"",
            identity.name, identity.set_code, identity.collector_number
        ));

        if let Some(resolved) = self.exact_stage(identity) {
            return resolved;
        }

        match self.name_stage(&identity.name) {
            Ok(result) => result,
            Err(e) => {
                log(&format!("Name search failed: {:#}", e));
                ResolutionResult::Unresolved(ResolveFailure::SearchTransport(e.to_string()))
            }
        }
    }

    /// Stage A. Failures here demote to Stage B and are never terminal.
    fn exact_stage(&self, identity: &ParsedIdentity) -> Option<ResolutionResult> {
        if identity.set_code.is_empty() || identity.collector_number.is_empty() {
            return None;
        }

        let query = SearchQuery::Exact {
            set: identity.set_code.clone(),
            cn: identity.collector_number.clone(),
        };
        log(&format!("Attempting set/number match: {}", query));

        match self.search.search(&query) {
            Ok(results) => {
                let resolved = ResolutionResult::from_results(results);
                match &resolved {
                    Some(ResolutionResult::Resolved { primary, .. }) => {
                        log(&format!("Match found by set/number: {}", primary.name()))
                    }
                    _ => log(&format!("No printing for {}, trying name search", query)),
                }
                resolved
            }
            Err(e) => {
                log(&format!("Set/number search failed: {:#}", e));
                None
            }
        }
    }

    /// Stage B. `Err` is a transport failure.
    fn name_stage(&self, name: &str) -> anyhow::Result<ResolutionResult> {
        if name.chars().count() < MIN_NAME_LEN {
            return Ok(ResolutionResult::Unresolved(ResolveFailure::NoNameDetected));
        }
        let not_found = || ResolutionResult::Unresolved(ResolveFailure::NotFound(name.to_string()));

        let direct = self.search.search(&SearchQuery::Name {
            query: name.to_string(),
        })?;
        if let Some(resolved) = ResolutionResult::from_results(direct) {
            return Ok(resolved);
        }

        let Some(fallback) = fallback_query(name) else {
            log(&format!("No direct match for \"{}\" and no fallback query", name));
            return Ok(not_found());
        };
        log(&format!("No direct match for \"{}\", fuzzy fallback with \"{}\"", name, fallback));

        let results = self.search.search(&SearchQuery::Name {
            query: fallback.clone(),
        })?;
        let Some(top) = results.first() else {
            return Ok(not_found());
        };

        if !accept_fallback(name, &fallback, top) {
            log(&format!("Fallback result \"{}\" rejected for \"{}\"", top.name(), name));
            return Ok(not_found());
        }

        log(&format!("Fallback match accepted: \"{}\"", top.name()));
        Ok(ResolutionResult::from_results(results).unwrap_or_else(not_found))
    }
}
