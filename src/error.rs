// SPDX-FileCopyrightText: The midi-shortmsg authors
// SPDX-License-Identifier: MPL-2.0

use std::borrow::Cow;

use derive_more::{Display, From};
use thiserror::Error;

use crate::Direction;

/// Numeric result code reported by the driver.
///
/// The well-known values follow the multimedia system result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From)]
pub struct NativeErrorCode(u32);

impl NativeErrorCode {
    pub const ERROR: Self = Self(1);
    pub const BAD_DEVICE_ID: Self = Self(2);
    pub const NOT_ENABLED: Self = Self(3);
    pub const ALLOCATED: Self = Self(4);
    pub const INVALID_HANDLE: Self = Self(5);
    pub const NO_DRIVER: Self = Self(6);
    pub const NO_MEMORY: Self = Self(7);
    pub const NOT_SUPPORTED: Self = Self(8);
    pub const BAD_ERROR_NUMBER: Self = Self(9);
    pub const INVALID_FLAG: Self = Self(10);
    pub const INVALID_PARAM: Self = Self(11);
    pub const HANDLE_BUSY: Self = Self(12);

    pub const MIDI_UNPREPARED: Self = Self(64);
    pub const MIDI_STILL_PLAYING: Self = Self(65);
    pub const MIDI_NO_MAP: Self = Self(66);
    pub const MIDI_NOT_READY: Self = Self(67);
    pub const MIDI_NO_DEVICE: Self = Self(68);
    pub const MIDI_INVALID_SETUP: Self = Self(69);
    pub const MIDI_BAD_OPEN_MODE: Self = Self(70);
    pub const MIDI_DONT_CONTINUE: Self = Self(71);

    #[must_use]
    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Resolves the code to a human-readable text.
    ///
    /// Input and output ports share most of the texts, only the
    /// MIDI-specific codes are worded per direction.
    #[must_use]
    pub fn describe(self, direction: Direction) -> Cow<'static, str> {
        let text = match (self, direction) {
            (Self::ERROR, _) => "unspecified error",
            (Self::BAD_DEVICE_ID, _) => "device ID out of range",
            (Self::NOT_ENABLED, _) => "driver failed enable",
            (Self::ALLOCATED, _) => "device already allocated",
            (Self::INVALID_HANDLE, _) => "device handle is invalid",
            (Self::NO_DRIVER, _) => "no device driver present",
            (Self::NO_MEMORY, _) => "memory allocation error",
            (Self::NOT_SUPPORTED, _) => "function isn't supported",
            (Self::BAD_ERROR_NUMBER, _) => "error value out of range",
            (Self::INVALID_FLAG, _) => "invalid flag passed",
            (Self::INVALID_PARAM, _) => "invalid parameter passed",
            (Self::HANDLE_BUSY, _) => "handle being used simultaneously on another thread",
            (Self::MIDI_UNPREPARED, _) => "header not prepared",
            (Self::MIDI_STILL_PLAYING, Direction::Input) => "still recording",
            (Self::MIDI_STILL_PLAYING, Direction::Output) => "still playing",
            (Self::MIDI_NO_MAP, _) => "no configured instruments",
            (Self::MIDI_NOT_READY, _) => "hardware is still busy",
            (Self::MIDI_NO_DEVICE, _) => "port no longer connected",
            (Self::MIDI_INVALID_SETUP, _) => "invalid MIF",
            (Self::MIDI_BAD_OPEN_MODE, _) => "operation unsupported with open mode",
            (Self::MIDI_DONT_CONTINUE, Direction::Input) => "thru device is eating a message",
            (Self::MIDI_DONT_CONTINUE, Direction::Output) => "thru device cannot continue",
            (Self(code), _) => return format!("unknown error {code}").into(),
        };
        text.into()
    }
}

#[derive(Debug, Error)]
pub enum PortError {
    #[error("failed to open device: error {0}")]
    DeviceOpen(NativeErrorCode),
    #[error("failed to send message: error {0}")]
    Send(NativeErrorCode),
    #[error("failed to query device capabilities: error {0}")]
    CapabilityQuery(NativeErrorCode),
    #[error("failed to start or stop listening: error {0}")]
    Listen(NativeErrorCode),
}

impl PortError {
    #[must_use]
    pub const fn native_code(&self) -> NativeErrorCode {
        match self {
            Self::DeviceOpen(code)
            | Self::Send(code)
            | Self::CapabilityQuery(code)
            | Self::Listen(code) => *code,
        }
    }
}

pub type PortResult<T> = std::result::Result<T, PortError>;
