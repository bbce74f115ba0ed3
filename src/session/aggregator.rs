//! The working batch of a scanning session.
//!
//! Entries arrive from local resolution (always appended) or from a paired
//! device (merged into an existing entry with the same printing and finish).
//! When the session lacks batch capability every accepted submission
//! replaces the whole batch, so only the latest card is kept.

use serde::{Deserialize, Serialize};

use super::remote::RemoteCard;
use crate::log;
use crate::ocr::ParsedIdentity;
use crate::search::{CardCandidate, ResolutionResult};

/// Card finish.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Finish {
    #[default]
    Nonfoil,
    Foil,
    Etched,
}

impl Finish {
    pub fn is_foil(self) -> bool {
        !matches!(self, Finish::Nonfoil)
    }
}

/// What the current session is allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Accumulate cards. Without it, each new card replaces the batch.
    pub batch_scan: bool,
}

/// Display fields taken from the selected printing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CardDisplay {
    pub candidate_id: String,
    pub name: String,
    pub set_code: String,
    pub set_name: String,
    pub collector_number: String,
    pub image: Option<String>,
}

impl From<&CardCandidate> for CardDisplay {
    fn from(card: &CardCandidate) -> Self {
        Self {
            candidate_id: card.identifier().to_string(),
            name: card.name().to_string(),
            set_code: card.set_code().to_string(),
            set_name: card.set_name().to_string(),
            collector_number: card.collector_number().to_string(),
            image: card.image_ref().map(str::to_string),
        }
    }
}

/// One card in the batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScannedEntry {
    pub id: String,
    /// OCR evidence for locally scanned cards.
    pub raw_ocr: Option<ParsedIdentity>,
    pub card: CardDisplay,
    /// Full record of the selected printing.
    pub data: CardCandidate,
    pub finish: Finish,
    pub quantity: u32,
    pub is_wishlist: bool,
    /// Every printing the search returned, for re-selection during review.
    pub variants: Vec<CardCandidate>,
}

/// Review edits. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryUpdate {
    #[serde(default)]
    pub finish: Option<Finish>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub is_wishlist: Option<bool>,
}

/// Something to add to the batch.
#[derive(Clone, Debug)]
pub enum Submission {
    /// Result of the local pipeline, with the OCR evidence that produced it.
    Local {
        result: ResolutionResult,
        evidence: ParsedIdentity,
    },
    /// A pre-resolved card pushed from a paired device.
    Remote(RemoteCard),
}

fn new_entry_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub struct ScanAggregator {
    capabilities: Capabilities,
    default_finish: Finish,
    entries: Vec<ScannedEntry>,
}

impl ScanAggregator {
    pub fn new(capabilities: Capabilities, default_finish: Finish) -> Self {
        Self {
            capabilities,
            default_finish,
            entries: Vec::new(),
        }
    }

    /// Applies a submission and returns the entry it created or updated.
    ///
    /// Unresolved local results leave the batch untouched and return `None`.
    pub fn submit(&mut self, submission: Submission) -> Option<ScannedEntry> {
        match submission {
            Submission::Local { result, evidence } => self.submit_local(result, evidence),
            Submission::Remote(card) => Some(self.submit_remote(card)),
        }
    }

    fn submit_local(
        &mut self,
        result: ResolutionResult,
        evidence: ParsedIdentity,
    ) -> Option<ScannedEntry> {
        let ResolutionResult::Resolved { primary, variants } = result else {
            return None;
        };

        let entry = ScannedEntry {
            id: new_entry_id(),
            raw_ocr: Some(evidence),
            card: CardDisplay::from(&primary),
            data: primary,
            finish: self.default_finish,
            quantity: 1,
            is_wishlist: false,
            variants,
        };
        Some(self.accept(entry))
    }

    fn submit_remote(&mut self, card: RemoteCard) -> ScannedEntry {
        let finish = card.finish.unwrap_or(self.default_finish);
        let quantity = card.quantity.unwrap_or(1).max(1);
        let display = card.display();

        let existing = self.entries.iter_mut().find(|e| {
            !display.candidate_id.is_empty()
                && e.card.candidate_id == display.candidate_id
                && e.finish == finish
        });

        if let Some(entry) = existing {
            entry.quantity = entry.quantity.saturating_add(quantity);
            log(&format!(
                "Remote card merged: {} ({:?}) x{}",
                entry.card.name, entry.finish, entry.quantity
            ));
            let merged = entry.clone();
            if !self.capabilities.batch_scan {
                self.entries = vec![merged.clone()];
            }
            return merged;
        }

        let data = card.record();
        let variants = if card.variants.is_empty() {
            vec![data.clone()]
        } else {
            card.variants
        };
        // Payload ids are kept only while they stay unique in the batch.
        let id = card
            .id
            .filter(|id| !id.is_empty() && !self.entries.iter().any(|e| &e.id == id))
            .unwrap_or_else(new_entry_id);
        let entry = ScannedEntry {
            id,
            raw_ocr: None,
            card: display,
            data,
            finish,
            quantity,
            is_wishlist: false,
            variants,
        };
        self.accept(entry)
    }

    /// Adds a new entry subject to the capability gate.
    fn accept(&mut self, entry: ScannedEntry) -> ScannedEntry {
        if self.capabilities.batch_scan {
            self.entries.push(entry.clone());
        } else {
            if !self.entries.is_empty() {
                log("Batch scanning disabled, replacing previous card");
            }
            self.entries = vec![entry.clone()];
        }
        log(&format!(
            "Added {} [{} #{}] ({} in batch)",
            entry.card.name,
            entry.card.set_code,
            entry.card.collector_number,
            self.entries.len()
        ));
        entry
    }

    pub fn list(&self) -> &[ScannedEntry] {
        &self.entries
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn update(&mut self, id: &str, update: &EntryUpdate) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        if let Some(finish) = update.finish {
            entry.finish = finish;
        }
        if let Some(quantity) = update.quantity {
            entry.quantity = quantity.max(1);
        }
        if let Some(is_wishlist) = update.is_wishlist {
            entry.is_wishlist = is_wishlist;
        }
        true
    }

    /// Points an entry at another printing from its variant list.
    ///
    /// Keeps the entry's id, finish and quantity.
    pub fn switch_variant(&mut self, id: &str, candidate_id: &str) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        let Some(variant) = entry
            .variants
            .iter()
            .find(|v| v.identifier() == candidate_id)
            .cloned()
        else {
            return false;
        };
        entry.card = CardDisplay::from(&variant);
        entry.data = variant;
        true
    }

    /// Hands the whole batch to the caller and starts a new one.
    pub fn take_all(&mut self) -> Vec<ScannedEntry> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::ResolveFailure;

    const BATCH: Capabilities = Capabilities { batch_scan: true };
    const SINGLE: Capabilities = Capabilities { batch_scan: false };

    fn card(id: &str, name: &str, set: &str, number: &str) -> CardCandidate {
        CardCandidate::named(id, name, set, number)
    }

    fn local(primary: CardCandidate, variants: Vec<CardCandidate>) -> Submission {
        Submission::Local {
            result: ResolutionResult::Resolved { primary, variants },
            evidence: ParsedIdentity::default(),
        }
    }

    fn remote(id: &str, name: &str, finish: Option<Finish>) -> Submission {
        Submission::Remote(RemoteCard {
            scryfall_id: Some(id.to_string()),
            name: Some(name.to_string()),
            finish,
            ..Default::default()
        })
    }

    #[test]
    fn test_local_submission_defaults() {
        let mut agg = ScanAggregator::new(BATCH, Finish::Nonfoil);
        let bolt = card("b1", "Lightning Bolt", "MH2", "100");
        let entry = agg.submit(local(bolt.clone(), vec![bolt.clone()])).unwrap();

        assert_eq!(entry.finish, Finish::Nonfoil);
        assert_eq!(entry.quantity, 1);
        assert!(!entry.is_wishlist);
        assert_eq!(entry.card.name, "Lightning Bolt");
        assert_eq!(entry.card.candidate_id, "b1");
        assert_eq!(entry.variants, vec![bolt]);
        assert_eq!(agg.list().len(), 1);
    }

    #[test]
    fn test_local_uses_configured_finish() {
        let mut agg = ScanAggregator::new(BATCH, Finish::Foil);
        let bolt = card("b1", "Lightning Bolt", "MH2", "100");
        let entry = agg.submit(local(bolt.clone(), vec![bolt])).unwrap();
        assert_eq!(entry.finish, Finish::Foil);
    }

    #[test]
    fn test_unresolved_adds_nothing() {
        let mut agg = ScanAggregator::new(BATCH, Finish::Nonfoil);
        let result = agg.submit(Submission::Local {
            result: ResolutionResult::Unresolved(ResolveFailure::NoNameDetected),
            evidence: ParsedIdentity::default(),
        });
        assert!(result.is_none());
        assert!(agg.list().is_empty());
    }

    #[test]
    fn test_local_duplicates_append() {
        let mut agg = ScanAggregator::new(BATCH, Finish::Nonfoil);
        let bolt = card("b1", "Lightning Bolt", "MH2", "100");
        agg.submit(local(bolt.clone(), vec![bolt.clone()]));
        agg.submit(local(bolt.clone(), vec![bolt]));

        assert_eq!(agg.list().len(), 2);
        assert_ne!(agg.list()[0].id, agg.list()[1].id);
    }

    #[test]
    fn test_single_capability_keeps_latest() {
        let mut agg = ScanAggregator::new(SINGLE, Finish::Nonfoil);
        for (id, name) in [("a", "Opt"), ("b", "Ponder"), ("c", "Preordain")] {
            let c = card(id, name, "M21", "1");
            agg.submit(local(c.clone(), vec![c]));
        }

        assert_eq!(agg.list().len(), 1);
        assert_eq!(agg.list()[0].card.name, "Preordain");
    }

    #[test]
    fn test_remote_merges_same_printing_and_finish() {
        let mut agg = ScanAggregator::new(BATCH, Finish::Nonfoil);
        agg.submit(remote("sf-1", "Opt", None));
        let merged = agg.submit(remote("sf-1", "Opt", None)).unwrap();

        assert_eq!(agg.list().len(), 1);
        assert_eq!(merged.quantity, 2);
        assert_eq!(agg.list()[0].quantity, 2);
    }

    #[test]
    fn test_remote_merge_quantity_saturates() {
        let mut agg = ScanAggregator::new(BATCH, Finish::Nonfoil);
        agg.submit(Submission::Remote(RemoteCard {
            scryfall_id: Some("sf-1".to_string()),
            name: Some("Opt".to_string()),
            quantity: Some(u32::MAX),
            ..Default::default()
        }));
        let merged = agg.submit(remote("sf-1", "Opt", None)).unwrap();

        assert_eq!(merged.quantity, u32::MAX);
        assert_eq!(agg.list().len(), 1);
    }

    #[test]
    fn test_remote_payload_id_kept_unique() {
        let mut agg = ScanAggregator::new(BATCH, Finish::Nonfoil);
        let mystery = || {
            Submission::Remote(RemoteCard {
                id: Some("local1".to_string()),
                name: Some("Mystery".to_string()),
                ..Default::default()
            })
        };
        let first = agg.submit(mystery()).unwrap();
        let second = agg.submit(mystery()).unwrap();

        assert_eq!(first.id, "local1");
        assert_ne!(second.id, "local1");
        assert!(agg.remove("local1"));
        assert_eq!(agg.list().len(), 1);
        assert_eq!(agg.list()[0].id, second.id);
    }

    #[test]
    fn test_remote_different_finish_appends() {
        let mut agg = ScanAggregator::new(BATCH, Finish::Nonfoil);
        agg.submit(remote("sf-1", "Opt", None));
        agg.submit(remote("sf-1", "Opt", Some(Finish::Foil)));

        assert_eq!(agg.list().len(), 2);
        assert!(agg.list()[0].raw_ocr.is_none());
    }

    #[test]
    fn test_remote_without_identifier_never_merges() {
        let mut agg = ScanAggregator::new(BATCH, Finish::Nonfoil);
        agg.submit(Submission::Remote(RemoteCard {
            name: Some("Mystery".to_string()),
            ..Default::default()
        }));
        agg.submit(Submission::Remote(RemoteCard {
            name: Some("Mystery".to_string()),
            ..Default::default()
        }));
        assert_eq!(agg.list().len(), 2);
    }

    #[test]
    fn test_remote_subject_to_capability_gate() {
        let mut agg = ScanAggregator::new(SINGLE, Finish::Nonfoil);
        let bolt = card("b1", "Lightning Bolt", "MH2", "100");
        agg.submit(local(bolt.clone(), vec![bolt]));
        agg.submit(remote("sf-1", "Opt", None));

        assert_eq!(agg.list().len(), 1);
        assert_eq!(agg.list()[0].card.name, "Opt");
    }

    #[test]
    fn test_update_and_remove() {
        let mut agg = ScanAggregator::new(BATCH, Finish::Nonfoil);
        let bolt = card("b1", "Lightning Bolt", "MH2", "100");
        let entry = agg.submit(local(bolt.clone(), vec![bolt])).unwrap();

        let changed = agg.update(
            &entry.id,
            &EntryUpdate {
                finish: Some(Finish::Foil),
                quantity: Some(0),
                is_wishlist: Some(true),
            },
        );
        assert!(changed);
        let updated = &agg.list()[0];
        assert_eq!(updated.finish, Finish::Foil);
        assert_eq!(updated.quantity, 1, "quantity is clamped to 1");
        assert!(updated.is_wishlist);

        assert!(!agg.update("missing", &EntryUpdate::default()));
        assert!(!agg.remove("missing"));
        assert!(agg.remove(&entry.id));
        assert!(agg.list().is_empty());
    }

    #[test]
    fn test_switch_variant_keeps_identity() {
        let mut agg = ScanAggregator::new(BATCH, Finish::Nonfoil);
        let mh2 = card("b1", "Lightning Bolt", "MH2", "100");
        let mut m10 = card("b2", "Lightning Bolt", "M10", "146");
        m10.image_uri = Some("m10.jpg".to_string());
        let entry = agg.submit(local(mh2.clone(), vec![mh2, m10.clone()])).unwrap();
        agg.update(
            &entry.id,
            &EntryUpdate {
                finish: Some(Finish::Foil),
                quantity: Some(3),
                is_wishlist: None,
            },
        );

        assert!(agg.switch_variant(&entry.id, "b2"));
        let switched = &agg.list()[0];
        assert_eq!(switched.id, entry.id);
        assert_eq!(switched.finish, Finish::Foil);
        assert_eq!(switched.quantity, 3);
        assert_eq!(switched.card.set_code, "M10");
        assert_eq!(switched.card.collector_number, "146");
        assert_eq!(switched.card.image.as_deref(), Some("m10.jpg"));
        assert_eq!(switched.data, m10);

        assert!(!agg.switch_variant(&entry.id, "nope"));
        assert!(!agg.switch_variant("missing", "b1"));
    }

    #[test]
    fn test_take_all_resets_batch() {
        let mut agg = ScanAggregator::new(BATCH, Finish::Nonfoil);
        agg.submit(remote("sf-1", "Opt", None));
        let taken = agg.take_all();
        assert_eq!(taken.len(), 1);
        assert!(agg.list().is_empty());
    }
}
