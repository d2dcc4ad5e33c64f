// SPDX-FileCopyrightText: The midi-shortmsg authors
// SPDX-License-Identifier: MPL-2.0

//! Human-readable rendering of short messages

use std::fmt;

use crate::{MessageKind, ShortMessage, TimeStamp};

const INVALID_TYPE_NAME: &str = "invalid";

fn type_name(kind: MessageKind) -> &'static str {
    kind.message_type()
        .map_or(INVALID_TYPE_NAME, crate::MessageType::name)
}

fn write_message(f: &mut fmt::Formatter<'_>, message: ShortMessage) -> fmt::Result {
    let status = message.decode_status();
    write!(
        f,
        "Ch{channel} {type_name}; K{key} V{velocity}",
        channel = status.channel,
        type_name = type_name(status.kind),
        key = message.data1,
        velocity = message.data2,
    )
}

/// `Ch<channel> <TYPE_NAME>; K<data1> V<data2>`
#[must_use]
pub fn format(message: ShortMessage) -> String {
    message.to_string()
}

/// `T<ts>ms - <message>`
#[must_use]
pub fn format_received(ts: TimeStamp, message: ShortMessage) -> String {
    format!("T{ts}ms - {message}")
}

/// `T<ts>ERR - <message>`
#[must_use]
pub fn format_error(ts: TimeStamp, message: ShortMessage) -> String {
    format!("T{ts}ERR - {message}")
}

/// `Sending - <message>`
#[must_use]
pub fn format_sending(message: ShortMessage) -> String {
    format!("Sending - {message}")
}

impl fmt::Display for ShortMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_message(f, *self)
    }
}
