// SPDX-FileCopyrightText: The midi-shortmsg authors
// SPDX-License-Identifier: MPL-2.0

//! Tracking of held keys

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{InputHandler, MessageType, ShortMessage, TimeStamp};

pub const NUM_KEYS: usize = 128;

const HELD_KEY: char = 'H';
const RELEASED_KEY: char = '|';

/// The keys that are currently held down on one port.
///
/// Tracks all channels together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardState {
    held: [bool; NUM_KEYS],
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self {
            held: [false; NUM_KEYS],
        }
    }
}

impl KeyboardState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the message changed the state of a key.
    ///
    /// A note-on with velocity 0 releases the key.
    pub fn update(&mut self, message: ShortMessage) -> bool {
        let held = match message.kind().message_type() {
            Some(MessageType::NoteOn) => message.data2 > 0,
            Some(MessageType::NoteOff) => false,
            _ => return false,
        };
        let Some(key) = self.held.get_mut(usize::from(message.data1)) else {
            log::debug!("Ignoring key {key} out of range", key = message.data1);
            return false;
        };
        let changed = *key != held;
        *key = held;
        changed
    }

    #[must_use]
    pub fn is_held(&self, key: u8) -> bool {
        self.held.get(usize::from(key)).copied().unwrap_or(false)
    }

    pub fn held_keys(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX)
            .zip(self.held.iter())
            .filter_map(|(key, held)| held.then_some(key))
    }

    pub fn release_all(&mut self) {
        self.held = [false; NUM_KEYS];
    }

    /// One character per key, `H` if held and `|` if released.
    #[must_use]
    pub fn render(&self) -> String {
        self.held
            .iter()
            .map(|held| if *held { HELD_KEY } else { RELEASED_KEY })
            .collect()
    }
}

impl InputHandler for KeyboardState {
    fn on_message(&mut self, message: ShortMessage, ts: TimeStamp) {
        if self.update(message) {
            log::debug!("{ts} ms: {keys}", keys = self.render());
        }
    }
}

/// A [`KeyboardState`] that is updated on the driver thread
/// and read on any other thread.
#[derive(Debug, Clone, Default)]
pub struct SharedKeyboardState(Arc<Mutex<KeyboardState>>);

impl SharedKeyboardState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, KeyboardState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InputHandler for SharedKeyboardState {
    fn on_message(&mut self, message: ShortMessage, ts: TimeStamp) {
        self.lock().on_message(message, ts);
    }
}
