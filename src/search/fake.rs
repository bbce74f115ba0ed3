//! In-memory search service for tests.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Mutex;

use super::card::CardCandidate;
use super::client::{CardSearch, SearchQuery};

/// Answers queries from a table keyed by the query's display form
/// (`MH2 #100`, `"Lightning Bolt"`) and records every call.
#[derive(Default)]
pub struct FakeSearch {
    answers: HashMap<String, Vec<CardCandidate>>,
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn answer(mut self, key: &str, cards: Vec<CardCandidate>) -> Self {
        self.answers.insert(key.to_string(), cards);
        self
    }

    pub fn fail(mut self, key: &str) -> Self {
        self.failing.push(key.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CardSearch for FakeSearch {
    fn search(&self, query: &SearchQuery) -> Result<Vec<CardCandidate>> {
        let key = query.to_string();
        self.calls.lock().unwrap().push(key.clone());
        if self.failing.contains(&key) {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.answers.get(&key).cloned().unwrap_or_default())
    }
}
