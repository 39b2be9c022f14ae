//! Message fixtures for dry runs against the in-memory backend.

use std::collections::HashMap;
use std::path::Path;

use contracts::{ChannelType, MsgId, OutgoingMsg};
use sender::MemoryBackend;
use serde::Deserialize;

use crate::error::CliError;

/// Messages plus pre-existing backend markers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixture {
    pub messages: Vec<OutgoingMsg>,

    /// Ids that already carry a sent marker
    #[serde(default)]
    pub sent: Vec<MsgId>,

    /// Ids the loop detector flags
    #[serde(default)]
    pub loops: Vec<MsgId>,
}

/// Accepted file layouts: the full object or a bare message array
#[derive(Deserialize)]
#[serde(untagged)]
enum FixtureFile {
    Full(Fixture),
    Messages(Vec<OutgoingMsg>),
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Err(CliError::fixture_not_found(path));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| CliError::fixture_parse(path, e.to_string()))
    }

    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        Ok(match serde_json::from_str(content)? {
            FixtureFile::Full(fixture) => fixture,
            FixtureFile::Messages(messages) => Self {
                messages,
                ..Default::default()
            },
        })
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Distinct channel types, in first-seen order
    pub fn channel_types(&self) -> Vec<ChannelType> {
        let mut types: Vec<ChannelType> = Vec::new();
        for msg in &self.messages {
            if !types.contains(msg.channel_type()) {
                types.push(msg.channel_type().clone());
            }
        }
        types
    }

    /// Queue the messages, one conversation per contact
    pub fn seed(self, backend: &MemoryBackend) {
        for id in self.sent {
            backend.mark_sent(id);
        }
        for id in self.loops {
            backend.mark_loop(id);
        }

        let mut order = Vec::new();
        let mut conversations: HashMap<_, Vec<OutgoingMsg>> = HashMap::new();
        for msg in self.messages {
            let key = msg.contact.uuid;
            conversations
                .entry(key)
                .or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                })
                .push(msg);
        }

        for key in order {
            if let Some(msgs) = conversations.remove(&key) {
                backend.push_conversation(msgs);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MESSAGES: &str = r#"[
        {
            "id": 1,
            "uuid": "0f6d8b6e-58c4-4c34-a5c2-5b0a1f6a1a01",
            "channel": {"uuid": "8f1c1a0e-8e47-4b5b-9a51-0d6d1c3f2a10", "channel_type": "WAC", "name": "WhatsApp", "address": "+15550001111"},
            "contact": {"uuid": "5a7c9c1e-6d3f-4a8e-9b2d-2f1e3c4d5e60", "name": "Ana"},
            "urn": "whatsapp:15551234567",
            "text": "Hi Ana"
        },
        {
            "id": 2,
            "uuid": "0f6d8b6e-58c4-4c34-a5c2-5b0a1f6a1a02",
            "channel": {"uuid": "8f1c1a0e-8e47-4b5b-9a51-0d6d1c3f2a11", "channel_type": "TG", "name": "Telegram", "address": "bot"},
            "contact": {"uuid": "5a7c9c1e-6d3f-4a8e-9b2d-2f1e3c4d5e61", "name": "Bo"},
            "urn": "telegram:1234",
            "text": "Hi Bo"
        }
    ]"#;

    #[test]
    fn test_parse_bare_array() {
        let fixture = Fixture::parse(MESSAGES).unwrap();
        assert_eq!(fixture.len(), 2);
        assert_eq!(
            fixture.channel_types(),
            vec![ChannelType::from("WAC"), ChannelType::from("TG")]
        );
        assert!(fixture.sent.is_empty());
    }

    #[test]
    fn test_parse_full_object() {
        let content = format!(r#"{{"messages": {MESSAGES}, "sent": [1], "loops": [2]}}"#);
        let fixture = Fixture::parse(&content).unwrap();
        assert_eq!(fixture.sent, vec![MsgId(1)]);
        assert_eq!(fixture.loops, vec![MsgId(2)]);
    }

    #[test]
    fn test_seed_backend() {
        let backend = MemoryBackend::new();
        let content = format!(r#"{{"messages": {MESSAGES}, "sent": [1]}}"#);
        Fixture::parse(&content).unwrap().seed(&backend);

        assert_eq!(backend.queue_len(), 2);
        assert!(backend.is_sent(MsgId(1)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(MESSAGES.as_bytes()).unwrap();

        let fixture = Fixture::load(file.path()).unwrap();
        assert_eq!(fixture.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Fixture::load(Path::new("/nonexistent/fixture.json"));
        assert!(matches!(result, Err(CliError::FixtureNotFound { .. })));
    }
}
