//! Push event intake.
//!
//! The mug tends to fire the same event several times in a burst. Events are
//! debounced per code and turned into a set of attributes to re-read on the
//! next queued refresh.

use crate::domain::attributes::{Attribute, AttributeSet};
use crate::infrastructure::bluetooth::protocol::PushEvent;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// What the engine should do about one incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// Same code seen within the debounce window
    Debounced,
    /// Attribute added to the refresh queue
    Queued(Attribute),
    /// Charger state is known from the event alone; battery is also queued
    ChargerChanged { on_base: bool },
    AuthInfoMissing,
    Unknown(u8),
}

#[derive(Debug)]
pub struct EventDebouncer {
    window: Duration,
    latest: HashMap<u8, Instant>,
    queued: AttributeSet,
}

impl EventDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            latest: HashMap::new(),
            queued: AttributeSet::new(),
        }
    }

    /// Record `code` at `now` unless it was already accepted within the window.
    ///
    /// The timestamp only moves when an event is accepted, so a steady stream
    /// faster than the window lets one event through per window.
    pub fn accept(&mut self, code: u8, now: Instant) -> bool {
        if let Some(last) = self.latest.get(&code) {
            if now.saturating_duration_since(*last) < self.window {
                return false;
            }
        }
        self.latest.insert(code, now);
        true
    }

    pub fn handle_push(&mut self, code: u8, now: Instant) -> EventAction {
        if !self.accept(code, now) {
            return EventAction::Debounced;
        }
        let Some(event) = PushEvent::from_code(code) else {
            return EventAction::Unknown(code);
        };
        if let Some(attribute) = event.affected_attribute() {
            self.queued.insert(attribute);
        }
        match event {
            PushEvent::ChargerConnected => EventAction::ChargerChanged { on_base: true },
            PushEvent::ChargerDisconnected => EventAction::ChargerChanged { on_base: false },
            PushEvent::AuthInfoNotFound => EventAction::AuthInfoMissing,
            other => match other.affected_attribute() {
                Some(attribute) => EventAction::Queued(attribute),
                None => EventAction::Unknown(code),
            },
        }
    }

    pub fn has_queued(&self) -> bool {
        !self.queued.is_empty()
    }

    /// Drain the queue. Events arriving afterwards start a fresh one.
    pub fn take_queued(&mut self) -> AttributeSet {
        std::mem::take(&mut self.queued)
    }
}
