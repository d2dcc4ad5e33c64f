// SPDX-FileCopyrightText: The midi-shortmsg authors
// SPDX-License-Identifier: MPL-2.0

//! Portable backend driven by [`midir`]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

use midir::{
    ConnectError, ConnectErrorKind, Ignore, InitError, MidiInput, MidiInputConnection,
    MidiInputPort, MidiOutput, MidiOutputConnection, MidiOutputPort, SendError,
};

use super::{
    event_kind, DeviceDirectory, DeviceIndex, Direction, DriverCallback, InputDriver, MidiBackend,
    OutputCapabilities, OutputDriver, RawEvent,
};
use crate::{Channel, MessageType, NativeErrorCode, ShortMessage, TimeStamp};

const ALL_CHANNELS_MASK: u16 = 0xffff;

type SharedCallback = Arc<Mutex<DriverCallback>>;

fn notify(callback: &SharedCallback, event: RawEvent) {
    let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
    callback(event);
}

fn connect_error_code<T>(err: &ConnectError<T>) -> NativeErrorCode {
    match err.kind() {
        ConnectErrorKind::InvalidPort => NativeErrorCode::MIDI_NO_DEVICE,
        ConnectErrorKind::Other(_) => NativeErrorCode::ERROR,
    }
}

fn send_error_code(err: &SendError) -> NativeErrorCode {
    match err {
        SendError::InvalidData(_) => NativeErrorCode::INVALID_PARAM,
        SendError::Other(_) => NativeErrorCode::ERROR,
    }
}

struct InputContext {
    index: DeviceIndex,
    callback: SharedCallback,
    listening: Arc<AtomicBool>,
}

// Adapter for the midir callback closure
fn handle_input(micros: u64, input: &[u8], context: &mut InputContext) {
    let ts = TimeStamp::from_micros(micros);
    if !context.listening.load(Ordering::Acquire) {
        log::trace!(
            "Discarding MIDI input from device {index}: {ts} {input:x?}",
            index = context.index
        );
        return;
    }
    let event = match ShortMessage::try_from(input) {
        Ok(message) => RawEvent::with_message(event_kind::INPUT_DATA, message, ts),
        Err(err) => {
            // System exclusive: only the leading bytes fit into the word
            let Some(leading) = input.first_chunk::<4>() else {
                log::warn!("Unhandled MIDI input {ts} {input:x?}: {err}");
                return;
            };
            log::debug!(
                "Received {len} bytes of long MIDI input {ts}",
                len = input.len()
            );
            RawEvent::with_message(
                event_kind::INPUT_LONG_DATA,
                ShortMessage::from(*leading),
                ts,
            )
        }
    };
    notify(&context.callback, event);
}

// One "all notes off" message per channel
fn all_notes_off_messages() -> impl Iterator<Item = ShortMessage> {
    Channel::all().map(|channel| {
        ShortMessage::with_channel(
            MessageType::ControlChange,
            channel,
            ShortMessage::ALL_NOTES_OFF.data1,
            0,
        )
    })
}

/// Input port opened by [`MidirBackend`].
#[allow(missing_debug_implementations)]
pub struct MidirInput {
    connection: Option<MidiInputConnection<InputContext>>,
    callback: SharedCallback,
    listening: Arc<AtomicBool>,
}

impl MidirInput {
    fn close_connection(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        self.listening.store(false, Ordering::Release);
        drop(connection.close());
        notify(&self.callback, RawEvent::new(event_kind::INPUT_CLOSE));
    }
}

impl InputDriver for MidirInput {
    fn start(&mut self) -> Result<(), NativeErrorCode> {
        if self.connection.is_none() {
            return Err(NativeErrorCode::INVALID_HANDLE);
        }
        self.listening.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), NativeErrorCode> {
        if self.connection.is_none() {
            return Err(NativeErrorCode::INVALID_HANDLE);
        }
        self.listening.store(false, Ordering::Release);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), NativeErrorCode> {
        // Messages are not buffered.
        Ok(())
    }

    fn close(mut self) -> Result<(), NativeErrorCode> {
        self.close_connection();
        Ok(())
    }
}

impl Drop for MidirInput {
    fn drop(&mut self) {
        self.close_connection();
    }
}

/// Output port opened by [`MidirBackend`].
#[allow(missing_debug_implementations)]
pub struct MidirOutput {
    connection: Option<MidiOutputConnection>,
    callback: SharedCallback,
}

impl MidirOutput {
    fn close_connection(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        drop(connection.close());
        notify(&self.callback, RawEvent::new(event_kind::OUTPUT_CLOSE));
    }
}

impl OutputDriver for MidirOutput {
    fn send_short(&mut self, word: u32) -> Result<(), NativeErrorCode> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(NativeErrorCode::INVALID_HANDLE)?;
        let message = ShortMessage::from_word(word);
        connection.send(&message.to_wire()).map_err(|err| {
            log::warn!("Failed to send MIDI output {message}: {err}");
            send_error_code(&err)
        })
    }

    /// Sends "all notes off" on every channel.
    fn reset(&mut self) -> Result<(), NativeErrorCode> {
        let mut result = Ok(());
        for message in all_notes_off_messages() {
            if let Err(code) = self.send_short(message.to_word()) {
                result = Err(code);
            }
        }
        result
    }

    fn close(mut self) -> Result<(), NativeErrorCode> {
        self.close_connection();
        Ok(())
    }
}

impl Drop for MidirOutput {
    fn drop(&mut self) {
        self.close_connection();
    }
}

/// Enumerates and opens ports through [`midir`].
///
/// Each opened port gets its own client connection.
#[allow(missing_debug_implementations)]
pub struct MidirBackend {
    client_name: String,
    input: MidiInput,
    output: MidiOutput,
}

impl MidirBackend {
    pub fn new(client_name: impl Into<String>) -> Result<Self, InitError> {
        let client_name = client_name.into();
        let mut input = MidiInput::new(&format!("{client_name} input port watcher"))?;
        input.ignore(Ignore::None);
        let output = MidiOutput::new(&format!("{client_name} output port watcher"))?;
        Ok(Self {
            client_name,
            input,
            output,
        })
    }

    fn input_port(&self, index: DeviceIndex) -> Option<MidiInputPort> {
        self.input.ports().into_iter().nth(index)
    }

    fn output_port(&self, index: DeviceIndex) -> Option<MidiOutputPort> {
        self.output.ports().into_iter().nth(index)
    }
}

impl DeviceDirectory for MidirBackend {
    fn device_count(&self, direction: Direction) -> usize {
        match direction {
            Direction::Input => self.input.port_count(),
            Direction::Output => self.output.port_count(),
        }
    }

    fn device_name(&self, direction: Direction, index: DeviceIndex) -> Option<String> {
        match direction {
            Direction::Input => {
                let port = self.input_port(index)?;
                self.input.port_name(&port).ok()
            }
            Direction::Output => {
                let port = self.output_port(index)?;
                self.output.port_name(&port).ok()
            }
        }
    }
}

impl MidiBackend for MidirBackend {
    type Input = MidirInput;
    type Output = MidirOutput;

    fn open_input(
        &self,
        index: DeviceIndex,
        callback: DriverCallback,
    ) -> Result<Self::Input, NativeErrorCode> {
        let port = self
            .input_port(index)
            .ok_or(NativeErrorCode::BAD_DEVICE_ID)?;
        let mut input = MidiInput::new(&self.client_name).map_err(|err| {
            log::warn!("Failed to create MIDI input client: {err}");
            NativeErrorCode::NO_DRIVER
        })?;
        input.ignore(Ignore::None);
        let callback = Arc::new(Mutex::new(callback));
        let listening = Arc::new(AtomicBool::new(false));
        let context = InputContext {
            index,
            callback: Arc::clone(&callback),
            listening: Arc::clone(&listening),
        };
        let connection = input
            .connect(&port, &self.client_name, handle_input, context)
            .map_err(|err| {
                log::warn!("Failed to connect MIDI input port {index}: {err}");
                connect_error_code(&err)
            })?;
        notify(&callback, RawEvent::new(event_kind::INPUT_OPEN));
        Ok(MidirInput {
            connection: Some(connection),
            callback,
            listening,
        })
    }

    fn open_output(
        &self,
        index: DeviceIndex,
        callback: DriverCallback,
    ) -> Result<Self::Output, NativeErrorCode> {
        let port = self
            .output_port(index)
            .ok_or(NativeErrorCode::BAD_DEVICE_ID)?;
        let output = MidiOutput::new(&self.client_name).map_err(|err| {
            log::warn!("Failed to create MIDI output client: {err}");
            NativeErrorCode::NO_DRIVER
        })?;
        let connection = output.connect(&port, &self.client_name).map_err(|err| {
            log::warn!("Failed to connect MIDI output port {index}: {err}");
            connect_error_code(&err)
        })?;
        let callback = Arc::new(Mutex::new(callback));
        notify(&callback, RawEvent::new(event_kind::OUTPUT_OPEN));
        Ok(MidirOutput {
            connection: Some(connection),
            callback,
        })
    }

    fn output_capabilities(
        &self,
        index: DeviceIndex,
    ) -> Result<OutputCapabilities, NativeErrorCode> {
        let port = self
            .output_port(index)
            .ok_or(NativeErrorCode::BAD_DEVICE_ID)?;
        let name = self.output.port_name(&port).map_err(|err| {
            log::warn!("Failed to query name of MIDI output port {index}: {err}");
            NativeErrorCode::MIDI_NO_DEVICE
        })?;
        Ok(OutputCapabilities {
            name,
            channel_mask: ALL_CHANNELS_MASK,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_context(listening: bool) -> (InputContext, Arc<Mutex<Vec<RawEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&events);
        let callback: DriverCallback = Box::new(move |event| {
            recorded.lock().unwrap().push(event);
        });
        let context = InputContext {
            index: 0,
            callback: Arc::new(Mutex::new(callback)),
            listening: Arc::new(AtomicBool::new(listening)),
        };
        (context, events)
    }

    #[test]
    fn forward_short_input_while_listening() {
        let (mut context, events) = new_context(true);
        handle_input(2_000, &[0x90, 0x3c, 0x7f], &mut context);
        assert_eq!(
            vec![RawEvent::with_message(
                event_kind::INPUT_DATA,
                ShortMessage::middle_c(),
                TimeStamp::from_millis(2),
            )],
            *events.lock().unwrap()
        );
    }

    #[test]
    fn discard_input_while_not_listening() {
        let (mut context, events) = new_context(false);
        handle_input(2_000, &[0x90, 0x3c, 0x7f], &mut context);
        assert!(events.lock().unwrap().is_empty());
        context.listening.store(true, Ordering::Release);
        handle_input(3_000, &[0x80, 0x3c, 0x00], &mut context);
        assert_eq!(1, events.lock().unwrap().len());
    }

    #[test]
    fn forward_system_exclusive_input_as_long_data() {
        let (mut context, events) = new_context(true);
        handle_input(2_000, &[0xf0, 0x7e, 0x7f, 0x06, 0x01, 0xf7], &mut context);
        let events = events.lock().unwrap();
        assert_eq!(1, events.len());
        let event = events[0];
        assert_eq!(event_kind::INPUT_LONG_DATA, event.kind);
        assert_eq!(2, event.param2);
        let message = ShortMessage::from_word(event.param1);
        assert_eq!(Some(MessageType::System), message.kind().message_type());
        assert_eq!([0xf0, 0x7e, 0x7f, 0x06], message.to_bytes());
    }

    #[test]
    fn all_notes_off_on_every_channel() {
        let messages = all_notes_off_messages().collect::<Vec<_>>();
        assert_eq!(16, messages.len());
        for (channel, message) in Channel::all().zip(messages) {
            assert_eq!(channel, message.channel());
            assert_eq!(
                Some(MessageType::ControlChange),
                message.kind().message_type()
            );
            assert_eq!(ShortMessage::ALL_NOTES_OFF.data1, message.data1);
            assert_eq!(0, message.data2);
        }
    }
}
