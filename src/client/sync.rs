//! Client-side view of session events.
//!
//! [`ClientSync`] sits between the manager's event stream and the views that
//! render sessions. It keeps its own per-session metadata, independent of the
//! manager's table: views come and go without touching backend sessions, and
//! backend sessions die without views having to be around.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::domain::{NO_SEQ, PromptInfo, Seq, SessionEvent, SessionState};
use crate::session::OutputChunk;

pub type SubscriptionId = u64;

/// What a subscriber receives for its session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Data { data: String, seq: Seq },
    Exit { exit_code: i32 },
    StateChange {
        new_state: SessionState,
        old_state: Option<SessionState>,
    },
    SessionInvalid,
    SessionDetected { conversation_id: String },
    Prompt(PromptInfo),
    /// A queued prompt, handed out once the session first waits for input
    QuickRunReady { prompt: String },
}

/// Per-session record kept while anything is subscribed.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSessionMeta {
    /// Highest seq delivered to subscribers
    pub last_seq: Seq,
    pub exit_code: Option<i32>,
    pub session_invalid: bool,
    pub state: Option<SessionState>,
    pub pending_prompt: Option<PromptInfo>,
    pub quick_run: Option<String>,
    pub conversation_id: Option<String>,
}

impl Default for ClientSessionMeta {
    fn default() -> Self {
        Self {
            last_seq: NO_SEQ,
            exit_code: None,
            session_invalid: false,
            state: None,
            pending_prompt: None,
            quick_run: None,
            conversation_id: None,
        }
    }
}

/// A live subscription. Dropping the receiver ends it on the next delivery.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub session_id: String,
    pub receiver: UnboundedReceiver<SessionUpdate>,
}

#[derive(Debug, Default)]
pub struct ClientSync {
    meta: HashMap<String, ClientSessionMeta>,
    subscribers: HashMap<String, HashMap<SubscriptionId, UnboundedSender<SessionUpdate>>>,
    pending_prompts: HashSet<String>,
    next_subscription: SubscriptionId,
}

impl ClientSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a session, creating its metadata record if needed.
    pub fn subscribe(&mut self, session_id: &str) -> Subscription {
        self.meta.entry(session_id.to_string()).or_default();

        self.next_subscription += 1;
        let id = self.next_subscription;
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .entry(session_id.to_string())
            .or_default()
            .insert(id, tx);

        Subscription {
            id,
            session_id: session_id.to_string(),
            receiver: rx,
        }
    }

    /// Returns `false` if the subscription was not found.
    pub fn unsubscribe(&mut self, session_id: &str, subscription: SubscriptionId) -> bool {
        let Some(subs) = self.subscribers.get_mut(session_id) else {
            return false;
        };
        let removed = subs.remove(&subscription).is_some();
        if subs.is_empty() {
            self.subscribers.remove(session_id);
        }
        removed
    }

    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.subscribers.get(session_id).map_or(0, HashMap::len)
    }

    pub fn metadata(&self, session_id: &str) -> Option<&ClientSessionMeta> {
        self.meta.get(session_id)
    }

    /// Apply one manager event.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Data {
                session_id,
                data,
                seq,
            } => self.handle_data(&session_id, data, seq),
            SessionEvent::Exit {
                session_id,
                exit_code,
            } => {
                self.clear_prompt(&session_id);
                if let Some(meta) = self.meta.get_mut(&session_id) {
                    meta.exit_code = Some(exit_code);
                }
                self.fan_out(&session_id, SessionUpdate::Exit { exit_code });
            }
            SessionEvent::StateChange {
                session_id,
                new_state,
                old_state,
            } => self.handle_state_change(&session_id, new_state, old_state),
            SessionEvent::SessionInvalid { session_id } => {
                if let Some(meta) = self.meta.get_mut(&session_id) {
                    meta.session_invalid = true;
                }
                self.fan_out(&session_id, SessionUpdate::SessionInvalid);
            }
            SessionEvent::SessionDetected {
                session_id,
                conversation_id,
            } => {
                if let Some(meta) = self.meta.get_mut(&session_id) {
                    meta.conversation_id = Some(conversation_id.clone());
                }
                self.fan_out(&session_id, SessionUpdate::SessionDetected { conversation_id });
            }
            SessionEvent::Prompt { session_id, prompt } => {
                self.pending_prompts.insert(session_id.clone());
                if let Some(meta) = self.meta.get_mut(&session_id) {
                    meta.pending_prompt = Some(prompt.clone());
                }
                self.fan_out(&session_id, SessionUpdate::Prompt(prompt));
            }
        }
    }

    /// Feed chunks from a buffer replay through the same ordering filter as
    /// live data, so a replay racing the live stream delivers each seq once.
    pub fn replay(&mut self, session_id: &str, chunks: Vec<OutputChunk>) {
        for chunk in chunks {
            self.handle_data(session_id, chunk.data, chunk.seq);
        }
    }

    fn handle_data(&mut self, session_id: &str, data: String, seq: Seq) {
        // Nothing subscribed yet
        let Some(meta) = self.meta.get_mut(session_id) else {
            return;
        };
        if seq <= meta.last_seq {
            tracing::trace!(session_id, seq, last_seq = meta.last_seq, "dropping stale chunk");
            return;
        }
        meta.last_seq = seq;
        self.fan_out(session_id, SessionUpdate::Data { data, seq });
    }

    fn handle_state_change(
        &mut self,
        session_id: &str,
        new_state: SessionState,
        old_state: Option<SessionState>,
    ) {
        if old_state.is_some_and(|s| s.is_awaiting_input()) && !new_state.is_awaiting_input() {
            self.clear_prompt(session_id);
        }

        let mut quick_run = None;
        if let Some(meta) = self.meta.get_mut(session_id) {
            meta.state = Some(new_state);
            if new_state.is_awaiting_input() {
                quick_run = meta.quick_run.take();
            }
        }

        self.fan_out(
            session_id,
            SessionUpdate::StateChange {
                new_state,
                old_state,
            },
        );
        if let Some(prompt) = quick_run {
            self.fan_out(session_id, SessionUpdate::QuickRunReady { prompt });
        }
    }

    /// Queue a prompt to run once the session first waits for input.
    ///
    /// Delivered right away if the session is already waiting.
    pub fn set_quick_run(&mut self, session_id: &str, prompt: impl Into<String>) {
        let prompt = prompt.into();
        let meta = self.meta.entry(session_id.to_string()).or_default();
        if meta.state.is_some_and(|s| s.is_awaiting_input()) {
            self.fan_out(session_id, SessionUpdate::QuickRunReady { prompt });
        } else {
            meta.quick_run = Some(prompt);
        }
    }

    /// Sessions with an unanswered prompt, sorted.
    pub fn pending_prompts(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.pending_prompts.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn has_pending_prompt(&self, session_id: &str) -> bool {
        self.pending_prompts.contains(session_id)
    }

    pub fn clear_prompt(&mut self, session_id: &str) {
        self.pending_prompts.remove(session_id);
        if let Some(meta) = self.meta.get_mut(session_id) {
            meta.pending_prompt = None;
        }
    }

    /// Forget a session's metadata before restarting it from scratch.
    ///
    /// Subscribers stay registered, but data is dropped until the next
    /// `subscribe` creates a fresh record.
    pub fn reset(&mut self, session_id: &str) {
        self.meta.remove(session_id);
        self.pending_prompts.remove(session_id);
    }

    /// Forget everything about a session that will never be shown again.
    pub fn cleanup(&mut self, session_id: &str) {
        self.reset(session_id);
        self.subscribers.remove(session_id);
    }

    fn fan_out(&mut self, session_id: &str, update: SessionUpdate) {
        let Some(subs) = self.subscribers.get_mut(session_id) else {
            return;
        };
        subs.retain(|_, tx| tx.send(update.clone()).is_ok());
        if subs.is_empty() {
            self.subscribers.remove(session_id);
        }
    }
}

/// Pump manager events into a shared [`ClientSync`] until the channel closes.
pub async fn forward_events(
    mut events: UnboundedReceiver<SessionEvent>,
    sync: Arc<Mutex<ClientSync>>,
) {
    while let Some(event) = events.recv().await {
        tracing::trace!(session_id = event.session_id(), kind = event.kind(), "client event");
        sync.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handle_event(event);
    }
}
