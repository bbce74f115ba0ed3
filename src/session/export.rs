//! JSON export for finished batches.

use super::state::FinishedBatch;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a finished batch to a JSON file.
///
/// The output is pretty-printed so it can be checked by hand before import.
pub fn export_batch(batch: &FinishedBatch, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(batch).context("Failed to serialize batch to JSON")?;

    let mut file = File::create(output_path)
        .context(format!("Failed to create JSON file: {}", output_path.display()))?;

    file.write_all(json.as_bytes())
        .context("Failed to write JSON data")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::CardCandidate;
    use crate::session::aggregator::{CardDisplay, Finish, ScannedEntry};
    use crate::session::state::{AdditionMode, FinishSettings};
    use tempfile::tempdir;

    #[test]
    fn test_export_batch() {
        let card = CardCandidate::named("b1", "Lightning Bolt", "MH2", "100");
        let batch = FinishedBatch {
            session_id: "k3j9x0abc".to_string(),
            finished_at: "2026-01-01T12:00:00".to_string(),
            settings: FinishSettings {
                target_deck_id: Some("deck-7".to_string()),
                addition_mode: AdditionMode::Transfer,
                default_finish: Finish::Foil,
            },
            cards: vec![ScannedEntry {
                id: "e1".to_string(),
                raw_ocr: None,
                card: CardDisplay::from(&card),
                data: card.clone(),
                finish: Finish::Etched,
                quantity: 3,
                is_wishlist: true,
                variants: vec![card],
            }],
        };

        let dir = tempdir().unwrap();
        let path = dir.path().join("batch.json");

        export_batch(&batch, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["settings"]["addition_mode"], "transfer");
        assert_eq!(parsed["settings"]["target_deck_id"], "deck-7");
        assert_eq!(parsed["cards"][0]["finish"], "etched");
        assert_eq!(parsed["cards"][0]["quantity"], 3);
        assert_eq!(parsed["cards"][0]["card"]["name"], "Lightning Bolt");
    }

    #[test]
    fn test_export_to_missing_dir_fails() {
        let batch = FinishedBatch {
            session_id: "s".to_string(),
            finished_at: String::new(),
            settings: FinishSettings::default(),
            cards: Vec::new(),
        };
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope").join("batch.json");
        assert!(export_batch(&batch, &path).is_err());
    }
}
