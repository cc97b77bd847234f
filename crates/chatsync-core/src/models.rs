//! Data models for chatsync
//!
//! Defines the snapshot exchanged with remote stores: `ApplicationState`,
//! `Session`, and `Message`. The JSON shape (camelCase field names) is shared
//! with every other device syncing the same identity, so field renames here
//! are wire-format changes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The complete application state, the unit of synchronization
///
/// A snapshot is always complete; partial snapshots are never transmitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationState {
    /// Conversations in display order (most recent first)
    #[serde(default)]
    pub sessions: Vec<Session>,
    /// Flat named settings (model defaults, UI preferences)
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
    /// Tombstones: session id -> deletion time (epoch ms)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deleted_sessions: BTreeMap<String, i64>,
}

impl ApplicationState {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a snapshot from its JSON representation
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Serialize to the compact JSON form pushed to remote stores
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Find a session by ID
    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Total number of messages across all sessions
    pub fn message_count(&self) -> usize {
        self.sessions.iter().map(|s| s.messages.len()).sum()
    }

    /// Remove a session and record a tombstone so the deletion can propagate
    ///
    /// Returns the removed session, if it existed.
    pub fn delete_session(&mut self, id: &str, at: DateTime<Utc>) -> Option<Session> {
        let index = self.sessions.iter().position(|s| s.id == id)?;
        self.deleted_sessions
            .insert(id.to_string(), at.timestamp_millis());
        Some(self.sessions.remove(index))
    }
}

/// One conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Stable unique identifier
    pub id: String,
    /// Display title
    #[serde(default)]
    pub topic: String,
    /// Messages in conversation order
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Model and generation parameters used by this session
    #[serde(default)]
    pub model_config: ModelConfig,
    /// Last edit (epoch ms), including feedback and comment edits
    #[serde(default)]
    pub last_update: i64,
}

impl Session {
    /// Create a new empty session with a random ID
    pub fn new(topic: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), topic)
    }

    /// Create a session with a specific ID
    pub fn with_id(id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            messages: Vec::new(),
            model_config: ModelConfig::default(),
            last_update: Utc::now().timestamp_millis(),
        }
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.last_update = self.last_update.max(message.date.timestamp_millis());
        self.messages.push(message);
    }

    /// Most recent message timestamp (epoch ms), 0 for an empty session
    pub fn last_activity(&self) -> i64 {
        self.messages
            .iter()
            .map(|m| m.date.timestamp_millis())
            .max()
            .unwrap_or(0)
    }

    /// Recency used to resolve merge conflicts
    ///
    /// Latest message date first; edits that add no message (feedback,
    /// comment, topic) break ties through `last_update`.
    pub fn recency(&self) -> (i64, i64) {
        (self.last_activity(), self.last_update)
    }

    /// Record an edit made at `at`
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_update = self.last_update.max(at.timestamp_millis());
    }

    /// Rename the session
    pub fn set_topic(&mut self, topic: impl Into<String>, at: DateTime<Utc>) {
        self.topic = topic.into();
        self.touch(at);
    }

    /// Set or clear feedback on a message; `false` if no such message
    pub fn set_feedback(
        &mut self,
        message_id: &str,
        feedback: Option<Feedback>,
        at: DateTime<Utc>,
    ) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) else {
            return false;
        };
        message.feedback = feedback;
        self.touch(at);
        true
    }

    /// Set or clear the comment on a message; `false` if no such message
    pub fn set_comment(
        &mut self,
        message_id: &str,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) else {
            return false;
        };
        message.comment = comment;
        self.touch(at);
        true
    }
}

/// Model selection and generation parameters
///
/// Only `model` is interpreted; everything else is carried verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default)]
    pub model: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            extra: BTreeMap::new(),
        }
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// User feedback on an assistant reply
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Up,
    Down,
}

/// One turn in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique within its session
    pub id: String,
    pub role: Role,
    pub content: MessageContent,
    /// Creation time
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Message {
    /// Create a text message with a random ID, dated now
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), role, text, Utc::now())
    }

    /// Create a text message with a specific ID and date
    pub fn with_id(
        id: impl Into<String>,
        role: Role,
        text: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            content: MessageContent::Text(text.into()),
            date,
            feedback: None,
            comment: None,
        }
    }

    /// Plain text of the message
    ///
    /// For multimodal content this is the first text part, or empty.
    pub fn text_content(&self) -> &str {
        match &self.content {
            MessageContent::Text(text) => text,
            MessageContent::Parts(parts) => parts
                .iter()
                .find_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .unwrap_or(""),
        }
    }
}

/// Message body: plain text or a list of multimodal parts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One part of a multimodal message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_session_new() {
        let session = Session::new("Rust questions");
        assert_eq!(session.topic, "Rust questions");
        assert!(session.messages.is_empty());
        assert!(!session.id.is_empty());
        assert_eq!(session.last_activity(), 0);
    }

    #[test]
    fn test_last_activity_is_max_message_date() {
        let mut session = Session::with_id("s1", "t");
        session.push(Message::with_id("m1", Role::User, "a", at(3_000)));
        session.push(Message::with_id("m2", Role::Assistant, "b", at(1_000)));
        assert_eq!(session.last_activity(), 3_000);
    }

    #[test]
    fn test_feedback_edit_bumps_last_update() {
        let mut session = Session::with_id("s1", "t");
        session.last_update = 0;
        session.push(Message::with_id("m1", Role::Assistant, "a", at(1_000)));

        assert!(session.set_feedback("m1", Some(Feedback::Up), at(9_000)));
        assert_eq!(session.messages[0].feedback, Some(Feedback::Up));
        assert_eq!(session.last_update, 9_000);
        assert_eq!(session.last_activity(), 1_000);

        assert!(session.set_comment("m1", Some("nice".to_string()), at(9_500)));
        assert_eq!(session.recency(), (1_000, 9_500));

        // Unknown message leaves the session untouched
        assert!(!session.set_feedback("nope", None, at(20_000)));
        assert_eq!(session.last_update, 9_500);

        // Clock going backwards never lowers last_update
        session.set_topic("renamed", at(5_000));
        assert_eq!(session.topic, "renamed");
        assert_eq!(session.last_update, 9_500);
    }

    #[test]
    fn test_text_content_multimodal() {
        let json = r#"{
            "id": "m1",
            "role": "user",
            "date": "2024-05-01T10:00:00Z",
            "content": [
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}},
                {"type": "text", "text": "what is this?"}
            ]
        }"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.text_content(), "what is this?");
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut state = ApplicationState::new();
        let mut session = Session::with_id("s1", "Topic");
        session.model_config = ModelConfig::new("gpt-4o");
        let mut msg = Message::with_id("m1", Role::Assistant, "hi", at(0));
        msg.feedback = Some(Feedback::Up);
        session.push(msg);
        state.sessions.push(session);

        let value: serde_json::Value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["sessions"][0]["modelConfig"]["model"], "gpt-4o");
        assert_eq!(value["sessions"][0]["messages"][0]["feedback"], "up");
        assert!(value.get("deletedSessions").is_none());
    }

    #[test]
    fn test_model_config_keeps_extra_params() {
        let json = r#"{"model": "gpt-4o", "temperature": 0.5, "max_tokens": 4000}"#;
        let config: ModelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.extra.len(), 2);

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["temperature"], 0.5);
    }

    #[test]
    fn test_delete_session_records_tombstone() {
        let mut state = ApplicationState::new();
        state.sessions.push(Session::with_id("s1", "a"));
        state.sessions.push(Session::with_id("s2", "b"));

        let removed = state.delete_session("s1", at(5_000)).unwrap();
        assert_eq!(removed.id, "s1");
        assert_eq!(state.sessions.len(), 1);
        assert_eq!(state.deleted_sessions.get("s1"), Some(&5_000));
        assert!(state.delete_session("missing", at(0)).is_none());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(ApplicationState::from_json("not json").is_err());
        assert!(ApplicationState::from_json(r#"{"sessions": 5}"#).is_err());
        let empty = ApplicationState::from_json("{}").unwrap();
        assert!(empty.sessions.is_empty());
    }
}
