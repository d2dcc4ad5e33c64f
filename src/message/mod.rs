// SPDX-FileCopyrightText: The midi-shortmsg authors
// SPDX-License-Identifier: MPL-2.0

//! MIDI short messages
//!
//! A short message is a channel-voice (or system) event that fits into
//! 4 bytes: the status byte, up to two data bytes, and one reserved byte
//! that is always zero. Drivers exchange it as a single 32-bit word with
//! the status byte in the least significant position.

use derive_more::{Display, From};
use strum::{EnumCount, EnumIter, FromRepr, IntoStaticStr};
use thiserror::Error;


const STATUS_TYPE_MASK: u8 = 0xf0;
const STATUS_CHANNEL_MASK: u8 = 0x0f;

const CC_ALL_NOTES_OFF: u8 = 0x7b;

const KEY_MIDDLE_C: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("invalid channel {0} (expected 0..=15)")]
    InvalidChannel(u8),
    #[error("invalid message length {0} (expected 1..=4 bytes)")]
    InvalidLength(usize),
}

/// Message type encoded in the high nibble of the status byte.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    FromRepr,
    EnumIter,
    EnumCount,
    IntoStaticStr,
    strum::Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum MessageType {
    NoteOff = 0x80,
    NoteOn = 0x90,
    Aftertouch = 0xa0,
    ControlChange = 0xb0,
    ProgramChange = 0xc0,
    PitchBend = 0xe0,
    System = 0xf0,
}

impl MessageType {
    /// The high nibble as found in the status byte.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Symbolic name, e.g. `NOTE_ON`.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// One of the 16 logical channels of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub struct Channel(u8);

impl Channel {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(STATUS_CHANNEL_MASK);

    pub const fn new(value: u8) -> Result<Self, MessageError> {
        if value > Self::MAX.0 {
            return Err(MessageError::InvalidChannel(value));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// All channels in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN.0..=Self::MAX.0).map(Self)
    }
}

impl TryFrom<u8> for Channel {
    type Error = MessageError;

    fn try_from(from: u8) -> Result<Self, Self::Error> {
        Self::new(from)
    }
}

impl From<Channel> for u8 {
    fn from(from: Channel) -> Self {
        from.0
    }
}

/// Classification of the high nibble of a status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Recognized(MessageType),
    /// Valid on the wire but not one of the known types,
    /// e.g. `0xD0` (channel pressure) or a running-status data byte.
    Unrecognized(u8),
}

impl MessageKind {
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        let code = code & STATUS_TYPE_MASK;
        MessageType::from_repr(code).map_or(Self::Unrecognized(code), Self::Recognized)
    }

    /// The high nibble, still in its upper position.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Recognized(message_type) => message_type.code(),
            Self::Unrecognized(code) => code,
        }
    }

    #[must_use]
    pub const fn message_type(self) -> Option<MessageType> {
        match self {
            Self::Recognized(message_type) => Some(message_type),
            Self::Unrecognized(_) => None,
        }
    }
}

/// Decoded status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
    pub kind: MessageKind,
    pub channel: Channel,
}

impl Status {
    #[must_use]
    pub fn decode(status: u8) -> Self {
        Self {
            kind: MessageKind::from_code(status),
            channel: Channel(status & STATUS_CHANNEL_MASK),
        }
    }

    #[must_use]
    pub const fn encode(self) -> u8 {
        self.kind.code() | self.channel.0
    }
}

#[must_use]
pub fn decode_status(message: ShortMessage) -> Status {
    Status::decode(message.status)
}

/// Packs the 4 bytes of a short message into a driver word.
///
/// Byte 0 ends up in the least significant position.
#[must_use]
pub const fn pack(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}

/// Inverse of [`pack`].
#[must_use]
pub const fn unpack(word: u32) -> [u8; 4] {
    word.to_le_bytes()
}

/// A MIDI short message.
///
/// Data bytes are not restricted to 7 bits, values are passed through
/// as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShortMessage {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
    pub reserved: u8,
}

impl ShortMessage {
    /// Silences all sounding notes on channel 0.
    pub const ALL_NOTES_OFF: Self = Self::with_status(
        MessageType::ControlChange.code(),
        CC_ALL_NOTES_OFF,
        0,
    );

    #[must_use]
    pub const fn with_status(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            status,
            data1,
            data2,
            reserved: 0,
        }
    }

    pub const fn new(
        message_type: MessageType,
        channel: u8,
        data1: u8,
        data2: u8,
    ) -> Result<Self, MessageError> {
        let channel = match Channel::new(channel) {
            Ok(channel) => channel,
            Err(err) => return Err(err),
        };
        Ok(Self::with_channel(message_type, channel, data1, data2))
    }

    #[must_use]
    pub const fn with_channel(
        message_type: MessageType,
        channel: Channel,
        data1: u8,
        data2: u8,
    ) -> Self {
        Self::with_status(message_type.code() | channel.0, data1, data2)
    }

    pub const fn note_on(channel: u8, key: u8, velocity: u8) -> Result<Self, MessageError> {
        Self::new(MessageType::NoteOn, channel, key, velocity)
    }

    pub const fn note_off(channel: u8, key: u8, velocity: u8) -> Result<Self, MessageError> {
        Self::new(MessageType::NoteOff, channel, key, velocity)
    }

    pub const fn aftertouch(channel: u8, key: u8, pressure: u8) -> Result<Self, MessageError> {
        Self::new(MessageType::Aftertouch, channel, key, pressure)
    }

    pub const fn control_change(
        channel: u8,
        controller: u8,
        value: u8,
    ) -> Result<Self, MessageError> {
        Self::new(MessageType::ControlChange, channel, controller, value)
    }

    pub const fn program_change(channel: u8, program: u8) -> Result<Self, MessageError> {
        Self::new(MessageType::ProgramChange, channel, program, 0)
    }

    /// 14-bit pitch bend, center = `0x2000`.
    ///
    /// Bits above the lower 14 are discarded.
    pub const fn pitch_bend(channel: u8, value: u16) -> Result<Self, MessageError> {
        let lsb = (value & 0x7f) as u8;
        let msb = ((value >> 7) & 0x7f) as u8;
        Self::new(MessageType::PitchBend, channel, lsb, msb)
    }

    pub const fn all_notes_off(channel: u8) -> Result<Self, MessageError> {
        Self::control_change(channel, CC_ALL_NOTES_OFF, 0)
    }

    /// Middle C at full velocity on channel 0.
    #[must_use]
    pub const fn middle_c() -> Self {
        Self::with_status(MessageType::NoteOn.code(), KEY_MIDDLE_C, 0x7f)
    }

    #[must_use]
    pub const fn from_word(word: u32) -> Self {
        let [status, data1, data2, reserved] = unpack(word);
        Self {
            status,
            data1,
            data2,
            reserved,
        }
    }

    #[must_use]
    pub const fn to_word(self) -> u32 {
        pack(self.to_bytes())
    }

    #[must_use]
    pub const fn to_bytes(self) -> [u8; 4] {
        let Self {
            status,
            data1,
            data2,
            reserved,
        } = self;
        [status, data1, data2, reserved]
    }

    #[must_use]
    pub fn decode_status(self) -> Status {
        Status::decode(self.status)
    }

    #[must_use]
    pub fn kind(self) -> MessageKind {
        MessageKind::from_code(self.status)
    }

    #[must_use]
    pub const fn channel(self) -> Channel {
        Channel(self.status & STATUS_CHANNEL_MASK)
    }

    /// Number of bytes that are transmitted on a byte-stream transport.
    #[must_use]
    pub const fn wire_len(self) -> usize {
        match self.status {
            0x80..=0xbf | 0xe0..=0xef | 0xf2 => 3,
            // Data bytes without a status byte (running status) are
            // forwarded as a pair.
            0x00..=0x7f | 0xc0..=0xdf | 0xf1 | 0xf3 => 2,
            _ => 1,
        }
    }

    /// The leading [`Self::wire_len()`] bytes.
    #[must_use]
    pub const fn to_wire(self) -> WireBytes {
        WireBytes {
            bytes: self.to_bytes(),
            len: self.wire_len(),
        }
    }
}

impl From<u32> for ShortMessage {
    fn from(from: u32) -> Self {
        Self::from_word(from)
    }
}

impl From<ShortMessage> for u32 {
    fn from(from: ShortMessage) -> Self {
        from.to_word()
    }
}

impl From<[u8; 4]> for ShortMessage {
    fn from(from: [u8; 4]) -> Self {
        Self::from_word(pack(from))
    }
}

/// Accepts the 1 to 4 bytes of a message as received from a byte-stream
/// transport. Missing bytes are zero.
impl TryFrom<&[u8]> for ShortMessage {
    type Error = MessageError;

    fn try_from(from: &[u8]) -> Result<Self, Self::Error> {
        if from.is_empty() || from.len() > 4 {
            return Err(MessageError::InvalidLength(from.len()));
        }
        let mut bytes = [0; 4];
        bytes[..from.len()].copy_from_slice(from);
        Ok(bytes.into())
    }
}

/// Bytes of a [`ShortMessage`] as transmitted on a byte-stream transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireBytes {
    bytes: [u8; 4],
    len: usize,
}

impl std::ops::Deref for WireBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes[..self.len]
    }
}

/// Driver time stamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Display, From)]
pub struct TimeStamp(u32);

impl TimeStamp {
    #[must_use]
    pub const fn from_millis(millis: u32) -> Self {
        Self(millis)
    }

    /// Saturates at [`u32::MAX`] milliseconds.
    #[must_use]
    pub fn from_micros(micros: u64) -> Self {
        Self(u32::try_from(micros / 1000).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub const fn as_millis(self) -> u32 {
        self.0
    }
}

/// A message together with the time it has been received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedShortMessage {
    pub message: ShortMessage,
    pub ts: TimeStamp,
}
