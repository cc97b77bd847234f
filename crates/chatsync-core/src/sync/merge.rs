//! Snapshot merge
//!
//! Deterministic reconciliation of a local and a remote snapshot. Used both
//! by network sync and by file import.
//!
//! ## Rules
//!
//! - Sessions are unioned by id; sync never drops a session the other side
//!   doesn't know about.
//! - Sessions present on both sides have their messages unioned by id. For
//!   a message on both sides, `feedback` and `comment` come from the side
//!   whose session was touched more recently (latest message date, then
//!   `lastUpdate` for edits that add no message). The same side supplies
//!   `topic` and `modelConfig`. Ties go to remote.
//! - Messages are interleaved preserving each side's relative order; when
//!   both sides offer a different next message, the earlier `(date, id)`
//!   goes first.
//! - Config keys are unioned; shared keys follow [`ConfigPolicy`].
//! - Tombstones are unioned and applied according to [`DeletionPolicy`].
//! - Order: local order, then remote-only sessions in remote order. With
//!   `last_sync_time` set, sessions touched after it move to the front.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{ApplicationState, Message, Session};

/// Which side wins for config keys present on both sides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigPolicy {
    /// Most recently pushed settings win
    #[default]
    RemoteWins,
    LocalWins,
}

/// How session tombstones are applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// Tombstones are carried along but never remove a session
    #[default]
    Keep,
    /// Drop sessions whose tombstone is at or after their last activity
    PropagateTombstones,
}

/// Merge policy knobs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Epoch ms of the previous successful sync
    pub last_sync_time: Option<i64>,
    pub config_policy: ConfigPolicy,
    pub deletion_policy: DeletionPolicy,
}

/// Merge with default options
pub fn merge_default(local: &ApplicationState, remote: &ApplicationState) -> ApplicationState {
    merge(local, remote, &MergeOptions::default())
}

/// Reconcile `local` and `remote` into one snapshot
pub fn merge(
    local: &ApplicationState,
    remote: &ApplicationState,
    options: &MergeOptions,
) -> ApplicationState {
    let mut remote_by_id: HashMap<&str, &Session> = HashMap::new();
    for session in &remote.sessions {
        remote_by_id.entry(session.id.as_str()).or_insert(session);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut sessions = Vec::with_capacity(local.sessions.len() + remote.sessions.len());

    for session in &local.sessions {
        if !seen.insert(session.id.as_str()) {
            continue;
        }
        match remote_by_id.get(session.id.as_str()) {
            Some(theirs) => sessions.push(merge_session(session, theirs)),
            None => sessions.push(session.clone()),
        }
    }
    for session in &remote.sessions {
        if seen.insert(session.id.as_str()) {
            sessions.push(session.clone());
        }
    }

    let deleted_sessions = merge_tombstones(&local.deleted_sessions, &remote.deleted_sessions);
    if options.deletion_policy == DeletionPolicy::PropagateTombstones {
        sessions.retain(|s| match deleted_sessions.get(&s.id) {
            Some(&deleted_at) => s.last_activity() > deleted_at,
            None => true,
        });
    }

    if let Some(last_sync) = options.last_sync_time {
        let (touched, untouched): (Vec<Session>, Vec<Session>) = sessions
            .into_iter()
            .partition(|s| s.last_activity() > last_sync);
        sessions = touched;
        sessions.extend(untouched);
    }

    ApplicationState {
        sessions,
        config: merge_config(local, remote, options.config_policy),
        deleted_sessions,
    }
}

/// Merge two copies of the same session
fn merge_session(local: &Session, remote: &Session) -> Session {
    let remote_wins = remote.recency() >= local.recency();
    let winner = if remote_wins { remote } else { local };

    Session {
        id: local.id.clone(),
        topic: winner.topic.clone(),
        messages: merge_messages(&local.messages, &remote.messages, remote_wins),
        model_config: winner.model_config.clone(),
        last_update: local.last_update.max(remote.last_update),
    }
}

/// Union two message sequences, preserving each side's relative order
fn merge_messages(local: &[Message], remote: &[Message], remote_wins: bool) -> Vec<Message> {
    let mut local_by_id: HashMap<&str, &Message> = HashMap::new();
    for message in local {
        local_by_id.entry(message.id.as_str()).or_insert(message);
    }
    let mut remote_by_id: HashMap<&str, &Message> = HashMap::new();
    for message in remote {
        remote_by_id.entry(message.id.as_str()).or_insert(message);
    }

    let mut emitted: HashSet<&str> = HashSet::new();
    let mut merged = Vec::with_capacity(local.len().max(remote.len()));
    let (mut i, mut j) = (0, 0);

    loop {
        while i < local.len() && emitted.contains(local[i].id.as_str()) {
            i += 1;
        }
        while j < remote.len() && emitted.contains(remote[j].id.as_str()) {
            j += 1;
        }

        let next = match (local.get(i), remote.get(j)) {
            (None, None) => break,
            (Some(ours), None) => ours.id.as_str(),
            (None, Some(theirs)) => theirs.id.as_str(),
            (Some(ours), Some(theirs)) if ours.id == theirs.id => ours.id.as_str(),
            (Some(ours), Some(theirs)) => {
                let ours_only = !remote_by_id.contains_key(ours.id.as_str());
                let theirs_only = !local_by_id.contains_key(theirs.id.as_str());
                match (ours_only, theirs_only) {
                    (true, false) => ours.id.as_str(),
                    (false, true) => theirs.id.as_str(),
                    _ if order_key(ours) <= order_key(theirs) => ours.id.as_str(),
                    _ => theirs.id.as_str(),
                }
            }
        };

        emitted.insert(next);
        merged.push(resolve_message(
            local_by_id.get(next).copied(),
            remote_by_id.get(next).copied(),
            remote_wins,
        ));
    }

    merged
}

fn order_key(message: &Message) -> (i64, &str) {
    (message.date.timestamp_millis(), message.id.as_str())
}

/// Pick the mutable fields of a message present on one or both sides
fn resolve_message(local: Option<&Message>, remote: Option<&Message>, remote_wins: bool) -> Message {
    match (local, remote) {
        (Some(ours), Some(theirs)) => {
            let winner = if remote_wins { theirs } else { ours };
            let mut message = ours.clone();
            message.feedback = winner.feedback;
            message.comment = winner.comment.clone();
            message
        }
        (Some(only), None) | (None, Some(only)) => only.clone(),
        // Every emitted id comes from one of the two maps
        (None, None) => unreachable!("merged message id missing from both sides"),
    }
}

fn merge_config(
    local: &ApplicationState,
    remote: &ApplicationState,
    policy: ConfigPolicy,
) -> BTreeMap<String, serde_json::Value> {
    let mut config = local.config.clone();
    for (key, value) in &remote.config {
        match policy {
            ConfigPolicy::RemoteWins => {
                config.insert(key.clone(), value.clone());
            }
            ConfigPolicy::LocalWins => {
                config.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }
    config
}

fn merge_tombstones(
    local: &BTreeMap<String, i64>,
    remote: &BTreeMap<String, i64>,
) -> BTreeMap<String, i64> {
    let mut merged = local.clone();
    for (id, &at) in remote {
        merged
            .entry(id.clone())
            .and_modify(|existing| *existing = (*existing).max(at))
            .or_insert(at);
    }
    merged
}
