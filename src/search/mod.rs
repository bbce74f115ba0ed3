pub mod card;
pub mod client;
pub mod resolve;

#[cfg(test)]
pub mod fake;

pub use card::CardCandidate;
pub use client::{CardSearch, HttpCardSearch, SearchQuery};
pub use resolve::{ResolutionEngine, ResolutionResult, ResolveFailure};
