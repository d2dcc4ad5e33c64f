// SPDX-FileCopyrightText: The midi-shortmsg authors
// SPDX-License-Identifier: MPL-2.0

//! Seam between the sessions and the driver of the multimedia subsystem

use std::{borrow::Cow, fmt};

use strum::{EnumCount, EnumIter, IntoStaticStr};

use crate::{NativeErrorCode, ShortMessage, TimeStamp, TimedShortMessage};

#[cfg(feature = "midir")]
pub mod midir;

#[cfg(test)]
pub(crate) mod fake;

/// Direction of a port, seen from the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, IntoStaticStr)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// 0-based index of a port within its [`Direction`].
pub type DeviceIndex = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    pub direction: Direction,
    pub index: DeviceIndex,
    pub name: Cow<'static, str>,
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            direction,
            index,
            name,
        } = self;
        write!(f, "{direction} Dev {index} - {name}", direction = direction.name())
    }
}

/// Lists the available ports.
pub trait DeviceDirectory {
    #[must_use]
    fn device_count(&self, direction: Direction) -> usize;

    /// Display name of the port or `None` if the index is out of range
    /// or the driver is unable to provide the name.
    #[must_use]
    fn device_name(&self, direction: Direction, index: DeviceIndex) -> Option<String>;

    #[must_use]
    fn ports(&self, direction: Direction) -> Vec<PortDescriptor> {
        (0..self.device_count(direction))
            .map(|index| PortDescriptor {
                direction,
                index,
                name: self
                    .device_name(direction, index)
                    .map_or(Cow::Borrowed("<unknown>"), Cow::Owned),
            })
            .collect()
    }
}

/// Summary of all ports, grouped by direction.
///
/// ```text
/// Found 1 input devices
/// Input Dev 0 - Keyboard
///
/// Found 0 output devices
/// ```
#[must_use]
pub fn describe_devices<D>(directory: &D) -> String
where
    D: DeviceDirectory + ?Sized,
{
    let mut summary = String::new();
    for (direction, label) in [(Direction::Input, "input"), (Direction::Output, "output")] {
        if direction == Direction::Output {
            summary.push('\n');
        }
        let ports = directory.ports(direction);
        summary.push_str(&format!("Found {count} {label} devices\n", count = ports.len()));
        for port in ports {
            summary.push_str(&format!("{port}\n"));
        }
    }
    summary
}

/// Kinds of raw driver callbacks.
///
/// The values follow the multimedia callback message codes.
pub mod event_kind {
    pub const INPUT_OPEN: u32 = 0x3c1;
    pub const INPUT_CLOSE: u32 = 0x3c2;
    pub const INPUT_DATA: u32 = 0x3c3;
    pub const INPUT_LONG_DATA: u32 = 0x3c4;
    pub const INPUT_ERROR: u32 = 0x3c5;
    pub const INPUT_LONG_ERROR: u32 = 0x3c6;
    pub const OUTPUT_OPEN: u32 = 0x3c7;
    pub const OUTPUT_CLOSE: u32 = 0x3c8;
    pub const OUTPUT_DONE: u32 = 0x3c9;
}

/// Untyped event as delivered by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    /// One of the [`event_kind`] codes or anything else.
    pub kind: u32,
    /// The packed message word for data and error events.
    pub param1: u32,
    /// The time stamp in milliseconds for data and error events.
    pub param2: u32,
}

impl RawEvent {
    #[must_use]
    pub const fn new(kind: u32) -> Self {
        Self {
            kind,
            param1: 0,
            param2: 0,
        }
    }

    #[must_use]
    pub const fn with_message(kind: u32, message: ShortMessage, ts: TimeStamp) -> Self {
        Self {
            kind,
            param1: message.to_word(),
            param2: ts.as_millis(),
        }
    }
}

/// Typed input event, resolved once per [`RawEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Opened,
    Closed,
    Message { message: ShortMessage, ts: TimeStamp },
    Error { message: ShortMessage, ts: TimeStamp },
}

impl InputEvent {
    /// Returns `None` for unknown kinds.
    #[must_use]
    pub const fn from_raw(raw: RawEvent) -> Option<Self> {
        let RawEvent {
            kind,
            param1,
            param2,
        } = raw;
        let message = ShortMessage::from_word(param1);
        let ts = TimeStamp::from_millis(param2);
        let event = match kind {
            event_kind::INPUT_OPEN => Self::Opened,
            event_kind::INPUT_CLOSE => Self::Closed,
            event_kind::INPUT_DATA | event_kind::INPUT_LONG_DATA => Self::Message { message, ts },
            event_kind::INPUT_ERROR | event_kind::INPUT_LONG_ERROR => Self::Error { message, ts },
            _ => return None,
        };
        Some(event)
    }

    /// The received message of data and error events.
    #[must_use]
    pub const fn timed_message(&self) -> Option<TimedShortMessage> {
        match *self {
            Self::Message { message, ts } | Self::Error { message, ts } => {
                Some(TimedShortMessage { message, ts })
            }
            Self::Opened | Self::Closed => None,
        }
    }
}

/// Typed output acknowledgement, resolved once per [`RawEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    Opened,
    Closed,
    Done,
}

impl OutputEvent {
    /// Returns `None` for unknown kinds.
    #[must_use]
    pub const fn from_raw(raw: RawEvent) -> Option<Self> {
        let event = match raw.kind {
            event_kind::OUTPUT_OPEN => Self::Opened,
            event_kind::OUTPUT_CLOSE => Self::Closed,
            event_kind::OUTPUT_DONE => Self::Done,
            _ => return None,
        };
        Some(event)
    }
}

/// Callback registered with the driver when opening a port.
///
/// Invoked from a thread owned by the driver.
pub type DriverCallback = Box<dyn FnMut(RawEvent) + Send + 'static>;

/// Capabilities of an output port, queried when opening it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputCapabilities {
    pub name: String,
    /// Number of voices of an internal synthesizer, 0 for ports.
    pub voices: u16,
    /// Maximum polyphony of an internal synthesizer, 0 for ports.
    pub notes: u16,
    /// One bit per channel the device responds to.
    pub channel_mask: u16,
}

/// An open input port.
///
/// Dropping the driver without calling [`InputDriver::close()`] must
/// release the port as well.
pub trait InputDriver {
    fn start(&mut self) -> Result<(), NativeErrorCode>;

    fn stop(&mut self) -> Result<(), NativeErrorCode>;

    /// Discards any pending input.
    fn reset(&mut self) -> Result<(), NativeErrorCode>;

    fn close(self) -> Result<(), NativeErrorCode>
    where
        Self: Sized;
}

/// An open output port.
pub trait OutputDriver {
    /// Returns when the driver has accepted the word, not when it has
    /// been transmitted.
    fn send_short(&mut self, word: u32) -> Result<(), NativeErrorCode>;

    /// Silences all channels and aborts any pending output.
    fn reset(&mut self) -> Result<(), NativeErrorCode>;

    fn close(self) -> Result<(), NativeErrorCode>
    where
        Self: Sized;
}

/// Opens ports of the multimedia subsystem.
pub trait MidiBackend: DeviceDirectory {
    type Input: InputDriver;
    type Output: OutputDriver;

    fn open_input(
        &self,
        index: DeviceIndex,
        callback: DriverCallback,
    ) -> Result<Self::Input, NativeErrorCode>;

    fn open_output(
        &self,
        index: DeviceIndex,
        callback: DriverCallback,
    ) -> Result<Self::Output, NativeErrorCode>;

    fn output_capabilities(
        &self,
        index: DeviceIndex,
    ) -> Result<OutputCapabilities, NativeErrorCode>;

    /// Human-readable text for a result code.
    #[must_use]
    fn error_text(&self, direction: Direction, code: NativeErrorCode) -> Cow<'static, str> {
        code.describe(direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_input_events() {
        let message = ShortMessage::middle_c();
        let ts = TimeStamp::from_millis(7);
        assert_eq!(
            Some(InputEvent::Opened),
            InputEvent::from_raw(RawEvent::new(event_kind::INPUT_OPEN))
        );
        assert_eq!(
            Some(InputEvent::Closed),
            InputEvent::from_raw(RawEvent::new(event_kind::INPUT_CLOSE))
        );
        for kind in [event_kind::INPUT_DATA, event_kind::INPUT_LONG_DATA] {
            assert_eq!(
                Some(InputEvent::Message { message, ts }),
                InputEvent::from_raw(RawEvent::with_message(kind, message, ts))
            );
        }
        for kind in [event_kind::INPUT_ERROR, event_kind::INPUT_LONG_ERROR] {
            assert_eq!(
                Some(InputEvent::Error { message, ts }),
                InputEvent::from_raw(RawEvent::with_message(kind, message, ts))
            );
        }
        assert_eq!(
            None,
            InputEvent::from_raw(RawEvent::new(event_kind::OUTPUT_DONE))
        );
    }

    #[test]
    fn timed_message_of_input_events() {
        let message = ShortMessage::middle_c();
        let ts = TimeStamp::from_millis(3);
        assert_eq!(
            Some(TimedShortMessage { message, ts }),
            InputEvent::Error { message, ts }.timed_message()
        );
        assert_eq!(None, InputEvent::Opened.timed_message());
    }

    #[test]
    fn resolve_output_events() {
        assert_eq!(
            Some(OutputEvent::Done),
            OutputEvent::from_raw(RawEvent::new(event_kind::OUTPUT_DONE))
        );
        assert_eq!(
            None,
            OutputEvent::from_raw(RawEvent::new(event_kind::INPUT_DATA))
        );
    }

    #[test]
    fn describe_devices_lists_both_directions() {
        let directory = fake::FakeBackend::new(["Keyboard", "Pads"], ["Synth"]);
        assert_eq!(
            "Found 2 input devices\nInput Dev 0 - Keyboard\nInput Dev 1 - Pads\n\n\
             Found 1 output devices\nOutput Dev 0 - Synth\n",
            describe_devices(&directory)
        );
    }
}
