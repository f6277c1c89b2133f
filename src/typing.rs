//! Typing indicators.
//!
//! `LocalTyping` debounces the current user's keystrokes into start/stop
//! transitions. `TypingTracker` keeps the set of other users currently typing
//! in a room, each entry expiring on its own if no stop event arrives.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::models::UserId;

/// Idle time after the last keystroke before the local user counts as stopped.
pub const TYPING_IDLE: Duration = Duration::from_secs(3);
/// Lifetime of a remote typing flag that is never explicitly cleared.
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub struct LocalTyping {
    last_keystroke: Option<Instant>,
}

impl LocalTyping {
    /// Records a keystroke. Returns `true` only on the idle -> typing edge.
    pub fn keystroke(&mut self, now: Instant) -> bool {
        let started = self.last_keystroke.is_none();
        self.last_keystroke = Some(now);
        started
    }

    /// Returns `true` when the idle timer fires and typing should stop.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.last_keystroke {
            Some(at) if now.saturating_duration_since(at) >= TYPING_IDLE => {
                self.last_keystroke = None;
                true
            }
            _ => false,
        }
    }

    /// Clears typing on send or blur. Returns `true` if a stop must be emitted.
    pub fn stop(&mut self) -> bool {
        self.last_keystroke.take().is_some()
    }

    pub fn is_typing(&self) -> bool {
        self.last_keystroke.is_some()
    }
}

#[derive(Debug)]
pub struct TypingTracker {
    timeout: Duration,
    typing: HashMap<UserId, Instant>,
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new(TYPING_TIMEOUT)
    }
}

impl TypingTracker {
    pub fn new(timeout: Duration) -> Self {
        TypingTracker {
            timeout,
            typing: HashMap::new(),
        }
    }

    /// Applies a typing event. Last event wins. Returns whether the visible
    /// set changed.
    pub fn set(&mut self, user_id: &str, is_typing: bool, now: Instant) -> bool {
        if is_typing {
            self.typing
                .insert(user_id.to_string(), now + self.timeout)
                .is_none()
        } else {
            self.typing.remove(user_id).is_some()
        }
    }

    pub fn clear(&mut self, user_id: &str) -> bool {
        self.typing.remove(user_id).is_some()
    }

    /// Drops expired entries and returns the users that were dropped.
    pub fn expire(&mut self, now: Instant) -> Vec<UserId> {
        let mut expired = Vec::new();
        self.typing.retain(|user, deadline| {
            if *deadline <= now {
                expired.push(user.clone());
                false
            } else {
                true
            }
        });
        expired.sort();
        expired
    }

    pub fn users(&self) -> Vec<UserId> {
        let mut users: Vec<_> = self.typing.keys().cloned().collect();
        users.sort();
        users
    }

    pub fn is_typing(&self, user_id: &str) -> bool {
        self.typing.contains_key(user_id)
    }

    pub fn is_empty(&self) -> bool {
        self.typing.is_empty()
    }
}
