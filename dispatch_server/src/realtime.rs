//! The real-time gateway.
//!
//! Clients hold a server-sent-events stream open on `GET /api/events`. Each stream is a session. On connection the
//! session joins the caller's role channel (`user:{id}`, `owner:{id}` or `delivery:{id}`), and may then subscribe to
//! the `order:{id}` channels of orders the caller is party to.
//!
//! The engine's realtime hook hands every [`RealtimeEvent`] to [`RealtimeHub::publish`], which writes an SSE frame to
//! every session listening on the event's channel. Frames are never awaited: a session whose buffer is full misses the
//! frame, and a session whose stream has been dropped is pruned.
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use bytes::Bytes;
use dispatch_engine::{
    db_types::{Role, UserId},
    events::{Channel, RealtimeEvent},
};
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde_json::Value;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};

use crate::data_objects::SessionOpened;

pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
const SESSION_BUFFER_SIZE: usize = 64;

/// The role channel a client joins when it connects.
pub fn role_channel(user_id: UserId, role: Role) -> Channel {
    match role {
        Role::Customer => Channel::Customer(user_id),
        Role::Owner => Channel::Owner(user_id),
        Role::Courier => Channel::Courier(user_id),
    }
}

/// Formats one SSE frame.
pub fn sse_frame(event: &str, data: &Value) -> Bytes {
    Bytes::from(format!("event: {event}\ndata: {data}\n\n"))
}

struct Session {
    user_id: UserId,
    channels: HashSet<Channel>,
    sender: mpsc::Sender<Bytes>,
}

#[derive(Default)]
struct HubState {
    sessions: HashMap<String, Session>,
}

#[derive(Clone, Default)]
pub struct RealtimeHub {
    state: Arc<Mutex<HubState>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        // The session map stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Opens a session for the caller and joins it to their role channel. The returned receiver yields SSE frames,
    /// starting with a `session` frame carrying the session id.
    pub fn connect(&self, user_id: UserId, role: Role) -> (String, mpsc::Receiver<Bytes>) {
        let (sender, receiver) = mpsc::channel(SESSION_BUFFER_SIZE);
        let session_id = thread_rng().sample_iter(&Alphanumeric).take(24).map(char::from).collect::<String>();
        let channel = role_channel(user_id, role);
        let hello = SessionOpened { session_id: session_id.clone(), channels: vec![channel.to_string()] };
        let hello = serde_json::to_value(hello).unwrap_or(Value::Null);
        let _ = sender.try_send(sse_frame("session", &hello));
        let session = Session { user_id, channels: HashSet::from([channel]), sender };
        self.state().sessions.insert(session_id.clone(), session);
        debug!("📡️ Session {session_id} opened for {role} #{user_id} on {channel}");
        (session_id, receiver)
    }

    /// Joins `channel`. Fails with `false` if the session does not exist or belongs to someone else.
    pub fn subscribe(&self, session_id: &str, user_id: UserId, channel: Channel) -> bool {
        let mut state = self.state();
        match state.sessions.get_mut(session_id) {
            Some(session) if session.user_id == user_id => {
                session.channels.insert(channel);
                debug!("📡️ Session {session_id} joined {channel}");
                true
            },
            _ => false,
        }
    }

    pub fn unsubscribe(&self, session_id: &str, user_id: UserId, channel: Channel) -> bool {
        let mut state = self.state();
        match state.sessions.get_mut(session_id) {
            Some(session) if session.user_id == user_id => {
                session.channels.remove(&channel);
                debug!("📡️ Session {session_id} left {channel}");
                true
            },
            _ => false,
        }
    }

    /// Writes the event to every session on its channel. Returns the number of sessions it was delivered to.
    pub fn publish(&self, event: &RealtimeEvent) -> usize {
        let frame = sse_frame(event.event_name(), &event.message.to_json());
        let mut state = self.state();
        let mut delivered = 0;
        let mut dropped = Vec::new();
        for (id, session) in state.sessions.iter().filter(|(_, s)| s.channels.contains(&event.channel)) {
            match session.sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => warn!("📡️ Session {id} is not keeping up. Dropped {}", event.event_name()),
                Err(TrySendError::Closed(_)) => dropped.push(id.clone()),
            }
        }
        for id in dropped {
            state.sessions.remove(&id);
            debug!("📡️ Session {id} pruned");
        }
        trace!("📡️ {} on {} delivered to {delivered} sessions", event.event_name(), event.channel);
        delivered
    }

    /// Sends an SSE comment to every session and prunes the ones that have gone away.
    pub fn keep_alive(&self) {
        let mut state = self.state();
        let before = state.sessions.len();
        state.sessions.retain(|_, s| {
            !matches!(s.sender.try_send(Bytes::from_static(b": keep-alive\n\n")), Err(TrySendError::Closed(_)))
        });
        let pruned = before - state.sessions.len();
        if pruned > 0 {
            debug!("📡️ Pruned {pruned} closed sessions");
        }
    }

    pub fn session_count(&self) -> usize {
        self.state().sessions.len()
    }

    /// Starts the keep-alive ticker. Do not await the returned JoinHandle, as it will run indefinitely.
    pub fn start_keep_alive(&self, interval: Duration) -> JoinHandle<()> {
        let hub = self.clone();
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            loop {
                timer.tick().await;
                hub.keep_alive();
            }
        })
    }
}
