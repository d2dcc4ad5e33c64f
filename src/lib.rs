// SPDX-FileCopyrightText: The midi-shortmsg authors
// SPDX-License-Identifier: MPL-2.0

#![allow(rustdoc::invalid_rust_codeblocks)]
#![doc = include_str!("../README.md")]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(unreachable_pub)]
#![warn(unsafe_code)]
#![warn(clippy::pedantic)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(rustdoc::broken_intra_doc_links)]
// Repetitions of module/type names occur frequently when using many
// modules for keeping the size of the source files handy. Often
// types have the same name as their parent module.
#![allow(clippy::module_name_repetitions)]
// Repeating the type name in `..Default::default()` expressions
// is not needed since the context is obvious.
#![allow(clippy::default_trait_access)]

pub mod backend;
pub use self::backend::{
    describe_devices, event_kind, DeviceDirectory, DeviceIndex, Direction, DriverCallback,
    InputDriver, InputEvent, MidiBackend, OutputCapabilities, OutputDriver, OutputEvent,
    PortDescriptor, RawEvent,
};

mod diagnostic;
pub use self::diagnostic::{BoxedDiagnosticSink, DiagnosticSink, LogSink, WriteSink};

mod error;
pub use self::error::{NativeErrorCode, PortError, PortResult};

mod format;
pub use self::format::{format, format_error, format_received, format_sending};

pub mod keyboard;
pub use self::keyboard::{KeyboardState, SharedKeyboardState};

pub mod message;
pub use self::message::{
    decode_status, pack, unpack, Channel, MessageError, MessageKind, MessageType, ShortMessage,
    Status, TimeStamp, TimedShortMessage, WireBytes,
};

mod session;
pub use self::session::{
    input::{InputHandler, InputSession, LogInputHandler},
    output::{LogOutputHandler, OutputHandler, OutputSession},
};
