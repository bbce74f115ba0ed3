//! Cards pushed from a paired device.
//!
//! The paired device runs its own recognition and sends finished cards. The
//! transport itself lives elsewhere; this module only consumes its messages.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::SyncSender;

use super::aggregator::{CardDisplay, Finish, Submission};
use super::queue::SessionCommand;
use crate::log;
use crate::search::CardCandidate;

/// Inbound pairing message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteMessage {
    #[serde(rename = "sessionId", alias = "session_id")]
    pub session_id: String,
    pub card: RemoteCard,
}

/// Card payload built by the paired device.
///
/// Top-level display fields win; `data` carries the full printing record.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RemoteCard {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub scryfall_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub set_name: Option<String>,
    #[serde(default)]
    pub set_code: Option<String>,
    #[serde(default)]
    pub collector_number: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub finish: Option<Finish>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub data: Option<CardCandidate>,
    #[serde(default)]
    pub variants: Vec<CardCandidate>,
}

fn pick(top: &Option<String>, fallback: &str) -> String {
    top.as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

impl RemoteCard {
    /// The printing record, rebuilt from display fields when `data` is absent.
    pub fn record(&self) -> CardCandidate {
        self.data.clone().unwrap_or_else(|| CardCandidate {
            scryfall_id: self.scryfall_id.clone(),
            name: self.name.clone(),
            set: self.set_code.clone(),
            set_name: self.set_name.clone(),
            collector_number: self.collector_number.clone(),
            image_uri: self.image.clone(),
            ..Default::default()
        })
    }

    pub fn display(&self) -> CardDisplay {
        let base = self
            .data
            .as_ref()
            .map(CardDisplay::from)
            .unwrap_or_default();
        CardDisplay {
            candidate_id: pick(&self.scryfall_id, &base.candidate_id),
            name: pick(&self.name, &base.name),
            set_code: pick(&self.set_code, &base.set_code),
            set_name: pick(&self.set_name, &base.set_name),
            collector_number: pick(&self.collector_number, &base.collector_number),
            image: self.image.clone().or(base.image),
        }
    }
}

/// Delivery point for pairing messages addressed to one session.
///
/// Messages go through the session's bounded command channel, so they are
/// applied in order with local results and review actions.
#[derive(Clone)]
pub struct RemoteInbox {
    session_id: String,
    commands: SyncSender<SessionCommand>,
}

impl RemoteInbox {
    pub(super) fn new(session_id: String, commands: SyncSender<SessionCommand>) -> Self {
        Self {
            session_id,
            commands,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Queues a message for this session.
    ///
    /// Returns `Ok(false)` for messages addressed to another session. Blocks
    /// while the channel is full.
    pub fn deliver(&self, message: RemoteMessage) -> Result<bool> {
        if message.session_id != self.session_id {
            log(&format!(
                "Ignoring remote card for session {} (this is {})",
                message.session_id, self.session_id
            ));
            return Ok(false);
        }

        log(&format!(
            "Card received from remote: {}",
            message.card.name.as_deref().unwrap_or("?")
        ));
        self.commands
            .send(SessionCommand::Submit {
                submission: Submission::Remote(message.card),
                reply: None,
            })
            .map_err(|_| anyhow!("Session closed"))?;
        Ok(true)
    }

    /// Parses one JSON message and delivers it.
    pub fn deliver_json(&self, line: &str) -> Result<bool> {
        let message: RemoteMessage =
            serde_json::from_str(line).context("Malformed remote message")?;
        self.deliver(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::queue::create_command_queue;

    #[test]
    fn test_parse_paired_device_payload() {
        let json = r#"{
            "sessionId": "k3j9x0abc",
            "card": {
                "id": "local1",
                "scryfall_id": "sf-9",
                "name": "Brainstorm",
                "set_code": "ICE",
                "collector_number": "61",
                "image": "bs.jpg",
                "finish": "nonfoil",
                "quantity": 1,
                "data": {"id": "sf-9", "name": "Brainstorm", "set": "ice", "set_name": "Ice Age"},
                "variants": []
            }
        }"#;
        let message: RemoteMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.session_id, "k3j9x0abc");

        let display = message.card.display();
        assert_eq!(display.candidate_id, "sf-9");
        assert_eq!(display.set_code, "ICE");
        assert_eq!(display.set_name, "Ice Age");
        assert_eq!(display.image.as_deref(), Some("bs.jpg"));
    }

    #[test]
    fn test_record_from_display_fields() {
        let card = RemoteCard {
            scryfall_id: Some("sf-2".to_string()),
            name: Some("Ponder".to_string()),
            set_code: Some("LRW".to_string()),
            ..Default::default()
        };
        let record = card.record();
        assert_eq!(record.identifier(), "sf-2");
        assert_eq!(record.set_code(), "LRW");
    }

    #[test]
    fn test_deliver_filters_by_session() {
        let (sender, receiver) = create_command_queue(4);
        let inbox = RemoteInbox::new("abc".to_string(), sender);

        let foreign = r#"{"sessionId": "zzz", "card": {"name": "Opt"}}"#;
        assert!(!inbox.deliver_json(foreign).unwrap());
        assert!(receiver.try_recv().is_err());

        let ours = r#"{"sessionId": "abc", "card": {"name": "Opt"}}"#;
        assert!(inbox.deliver_json(ours).unwrap());
        assert!(matches!(
            receiver.try_recv(),
            Ok(SessionCommand::Submit {
                submission: Submission::Remote(_),
                reply: None
            })
        ));
    }

    #[test]
    fn test_deliver_malformed_and_closed() {
        let (sender, receiver) = create_command_queue(4);
        let inbox = RemoteInbox::new("abc".to_string(), sender);
        assert!(inbox.deliver_json("not json").is_err());

        drop(receiver);
        assert!(inbox.deliver_json(r#"{"sessionId": "abc", "card": {}}"#).is_err());
    }
}
