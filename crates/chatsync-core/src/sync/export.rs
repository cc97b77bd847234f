//! Transcript export
//!
//! Turns each session into a portable question/answer transcript. A user
//! message followed (skipping non-assistant turns) by an assistant reply
//! yields one QA record; a question that never got an answer is dropped.
//! Sessions without any QA record produce no file.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ApplicationState, Feedback, Role, Session};

/// Characters that are illegal in file names on common platforms
const ILLEGAL_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Feedback as written to transcripts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFeedback {
    Like,
    Dislike,
    None,
}

impl From<Option<Feedback>> for ExportFeedback {
    fn from(feedback: Option<Feedback>) -> Self {
        match feedback {
            Some(Feedback::Up) => ExportFeedback::Like,
            Some(Feedback::Down) => ExportFeedback::Dislike,
            None => ExportFeedback::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportedAnswer {
    pub content: String,
    pub feedback: ExportFeedback,
    pub comment: String,
}

/// One question/answer pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportedQa {
    pub question: String,
    pub answer: ExportedAnswer,
}

/// Transcript document for one session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub user_name: String,
    pub model: String,
    pub qa: Vec<ExportedQa>,
}

/// A transcript ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub session_id: String,
    pub file_name: String,
    pub export: SessionExport,
}

impl ExportFile {
    /// Pretty-printed JSON contents
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.export)
    }
}

/// Extract QA records from a session's messages
pub fn transcript(session: &Session) -> Vec<ExportedQa> {
    let mut qa = Vec::new();
    let mut pending_question = String::new();

    for message in &session.messages {
        match message.role {
            Role::User => {
                pending_question = message.text_content().trim().to_string();
            }
            Role::Assistant if !pending_question.is_empty() => {
                qa.push(ExportedQa {
                    question: std::mem::take(&mut pending_question),
                    answer: ExportedAnswer {
                        content: message.text_content().trim().to_string(),
                        feedback: message.feedback.into(),
                        comment: message.comment.clone().unwrap_or_default(),
                    },
                });
            }
            Role::Assistant | Role::System => {}
        }
    }

    qa
}

/// Build one transcript per session that has at least one QA record
///
/// An empty result means there was nothing to export.
pub fn build_exports(state: &ApplicationState, user_name: &str, at: DateTime<Utc>) -> Vec<ExportFile> {
    let timestamp = sanitize_timestamp(at);
    let mut used_names: HashSet<String> = HashSet::new();
    let mut files = Vec::new();

    for session in &state.sessions {
        let qa = transcript(session);
        if qa.is_empty() {
            continue;
        }

        let file_name = unique_file_name(session, &timestamp, &mut used_names);

        files.push(ExportFile {
            session_id: session.id.clone(),
            file_name,
            export: SessionExport {
                user_name: user_name.trim().to_string(),
                model: session.model_config.model.clone(),
                qa,
            },
        });
    }

    files
}

/// Pick a name not yet in `used`, then claim it
///
/// Sessions sharing a topic get their id appended, then a counter if that
/// name is also taken.
fn unique_file_name(session: &Session, timestamp: &str, used: &mut HashSet<String>) -> String {
    let base = base_name(session);
    let id = sanitize_topic(&session.id);
    let mut candidate = format!("Session-{}-{}.json", base, timestamp);
    let mut attempt = 1;
    while used.contains(&candidate) {
        candidate = if attempt == 1 {
            format!("Session-{}-{}-{}.json", base, id, timestamp)
        } else {
            format!("Session-{}-{}-{}-{}.json", base, id, attempt, timestamp)
        };
        attempt += 1;
    }
    used.insert(candidate.clone());
    candidate
}

/// `Session-<sanitizedTopicOrId>-<timestamp>.json`
pub fn export_file_name(session: &Session, timestamp: &str) -> String {
    format!("Session-{}-{}.json", base_name(session), timestamp)
}

fn base_name(session: &Session) -> String {
    let topic = sanitize_topic(&session.topic);
    if topic.is_empty() {
        sanitize_topic(&session.id)
    } else {
        topic
    }
}

/// Replace runs of illegal path characters with `-` and trim
pub fn sanitize_topic(topic: &str) -> String {
    replace_illegal(topic, '-').trim().to_string()
}

/// Export timestamp with illegal path characters replaced by `_`
pub fn sanitize_timestamp(at: DateTime<Utc>) -> String {
    replace_illegal(&at.format("%Y-%m-%d %H:%M:%S").to_string(), '_')
}

fn replace_illegal(input: &str, replacement: char) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_run = false;
    for c in input.chars() {
        if ILLEGAL_FILENAME_CHARS.contains(&c) || c.is_control() {
            if !in_run {
                out.push(replacement);
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Message, ModelConfig};
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn session(id: &str, topic: &str, messages: Vec<Message>) -> Session {
        Session {
            id: id.to_string(),
            topic: topic.to_string(),
            messages,
            model_config: ModelConfig::new("gpt-4o"),
            last_update: 0,
        }
    }

    fn user(id: &str, text: &str) -> Message {
        Message::with_id(id, Role::User, text, at(0))
    }

    fn assistant(id: &str, text: &str) -> Message {
        Message::with_id(id, Role::Assistant, text, at(0))
    }

    #[test]
    fn test_single_qa_with_feedback() {
        let mut answer = assistant("m2", "A1");
        answer.feedback = Some(Feedback::Up);
        let s = session("s1", "T", vec![user("m1", "Q1"), answer]);

        let qa = transcript(&s);
        assert_eq!(
            qa,
            vec![ExportedQa {
                question: "Q1".to_string(),
                answer: ExportedAnswer {
                    content: "A1".to_string(),
                    feedback: ExportFeedback::Like,
                    comment: String::new(),
                },
            }]
        );
    }

    #[test]
    fn test_unanswered_question_dropped() {
        let s = session("s1", "T", vec![user("m1", "Q1")]);
        assert!(transcript(&s).is_empty());

        let state = ApplicationState {
            sessions: vec![s],
            ..Default::default()
        };
        assert!(build_exports(&state, "me", at(0)).is_empty());
    }

    #[test]
    fn test_latest_question_pairs_with_answer() {
        let mut disliked = assistant("m5", "A");
        disliked.feedback = Some(Feedback::Down);
        disliked.comment = Some("wrong".to_string());
        let s = session(
            "s1",
            "T",
            vec![
                user("m1", "first"),
                user("m2", "  second  "),
                Message::with_id("m3", Role::System, "sys", at(0)),
                disliked,
                assistant("m6", "orphan answer"),
            ],
        );

        let qa = transcript(&s);
        assert_eq!(qa.len(), 1);
        assert_eq!(qa[0].question, "second");
        assert_eq!(qa[0].answer.feedback, ExportFeedback::Dislike);
        assert_eq!(qa[0].answer.comment, "wrong");
    }

    #[test]
    fn test_export_json_shape() {
        let s = session("s1", "T", vec![user("m1", "Q"), assistant("m2", "A")]);
        let state = ApplicationState {
            sessions: vec![s],
            ..Default::default()
        };
        let files = build_exports(&state, " alice ", at(0));
        let value: serde_json::Value =
            serde_json::from_str(&files[0].to_json().unwrap()).unwrap();

        assert_eq!(value["userName"], "alice");
        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["qa"][0]["answer"]["feedback"], "none");
        assert_eq!(value["qa"][0]["answer"]["comment"], "");
    }

    #[test]
    fn test_sanitize_topic() {
        assert_eq!(sanitize_topic("a/b:c*d"), "a-b-c-d");
        assert_eq!(sanitize_topic(r#"x\\//y?"<>|z"#), "x-y-z");
        assert_eq!(sanitize_topic("  ::  "), "-");
        assert_eq!(sanitize_topic("   "), "");
        assert!(!sanitize_topic("../../etc/passwd").contains('/'));
    }

    #[test]
    fn test_file_name_uses_topic_or_id() {
        let ts = sanitize_timestamp(at(0));
        assert_eq!(ts, "1970-01-01 00_00_00");

        let titled = session("s1", "a/b:c*d", vec![]);
        assert_eq!(
            export_file_name(&titled, &ts),
            "Session-a-b-c-d-1970-01-01 00_00_00.json"
        );

        let untitled = session("s2", "   ", vec![]);
        assert_eq!(
            export_file_name(&untitled, &ts),
            "Session-s2-1970-01-01 00_00_00.json"
        );
    }

    #[test]
    fn test_duplicate_topics_get_distinct_names() {
        let qa = vec![user("m1", "Q"), assistant("m2", "A")];
        let state = ApplicationState {
            sessions: vec![
                session("s1", "Same", qa.clone()),
                session("s2", "Same", qa),
            ],
            ..Default::default()
        };

        let files = build_exports(&state, "", at(0));
        assert_eq!(files.len(), 2);
        assert_ne!(files[0].file_name, files[1].file_name);
        assert!(files[1].file_name.contains("s2"));
    }

    #[test]
    fn test_fallback_name_collision_stays_unique() {
        // Topic "T-b" already holds the id-suffixed name for session "b"
        let qa = vec![user("m1", "Q"), assistant("m2", "A")];
        let state = ApplicationState {
            sessions: vec![
                session("a", "T-b", qa.clone()),
                session("x", "T", qa.clone()),
                session("b", "T", qa),
            ],
            ..Default::default()
        };

        let files = build_exports(&state, "", at(0));
        assert_eq!(files.len(), 3);
        let names: HashSet<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names.len(), 3);
        assert_eq!(files[0].file_name, export_file_name(&state.sessions[0], &sanitize_timestamp(at(0))));
    }
}
