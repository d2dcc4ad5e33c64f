// SPDX-FileCopyrightText: The midi-shortmsg authors
// SPDX-License-Identifier: MPL-2.0

use crate::{
    format_sending, BoxedDiagnosticSink, Channel, DeviceIndex, DiagnosticSink, Direction,
    DriverCallback, LogSink, MessageType, MidiBackend, NativeErrorCode, OutputCapabilities,
    OutputDriver, OutputEvent, PortError, PortResult, ShortMessage,
};


/// Receives the acknowledgements of an output port.
///
/// Invoked on a thread owned by the driver. The default implementations
/// only log the events.
pub trait OutputHandler: Send {
    fn on_open(&mut self) {
        log::debug!("Output device opened");
    }

    fn on_close(&mut self) {
        log::debug!("Output device closed");
    }

    fn on_done(&mut self) {
        log::debug!("Output done");
    }
}

/// Handler that only logs all acknowledgements.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOutputHandler;

impl OutputHandler for LogOutputHandler {}

fn new_driver_callback<H>(index: DeviceIndex, mut handler: H) -> DriverCallback
where
    H: OutputHandler + 'static,
{
    Box::new(move |raw| {
        log::trace!("Received event from output device {index}: {raw:x?}");
        match OutputEvent::from_raw(raw) {
            Some(OutputEvent::Opened) => handler.on_open(),
            Some(OutputEvent::Closed) => handler.on_close(),
            Some(OutputEvent::Done) => handler.on_done(),
            None => {
                log::debug!(
                    "Ignoring unknown event kind {kind:#x} from output device {index}",
                    kind = raw.kind
                );
            }
        }
    })
}

/// An open output port.
///
/// The port is closed when the session is dropped.
#[allow(missing_debug_implementations)]
pub struct OutputSession<B>
where
    B: MidiBackend,
{
    index: DeviceIndex,
    driver: Option<B::Output>,
    capabilities: Option<OutputCapabilities>,
    debug: bool,
    sink: BoxedDiagnosticSink,
}

impl<B> OutputSession<B>
where
    B: MidiBackend,
{
    /// Opens the output port with the given index.
    pub fn open(backend: &B, index: DeviceIndex) -> PortResult<Self> {
        Self::open_with_handler(backend, index, LogOutputHandler)
    }

    /// Opens the output port and queries its capabilities.
    ///
    /// Fails as a whole if the capabilities are not available, the
    /// port is closed again in this case.
    pub fn open_with_handler<H>(backend: &B, index: DeviceIndex, handler: H) -> PortResult<Self>
    where
        H: OutputHandler + 'static,
    {
        let device_count = backend.device_count(Direction::Output);
        if index >= device_count {
            log::warn!("Output device index {index} out of range (count = {device_count})");
            return Err(PortError::DeviceOpen(NativeErrorCode::BAD_DEVICE_ID));
        }
        let callback = new_driver_callback(index, handler);
        let mut driver = backend.open_output(index, callback).map_err(|code| {
            log::warn!(
                "Failed to open output device {index}: {text}",
                text = backend.error_text(Direction::Output, code)
            );
            PortError::DeviceOpen(code)
        })?;
        let capabilities = match backend.output_capabilities(index) {
            Ok(capabilities) => capabilities,
            Err(code) => {
                log::warn!(
                    "Failed to query capabilities of output device {index}: {text}",
                    text = backend.error_text(Direction::Output, code)
                );
                if let Err(code) = driver.reset() {
                    log::warn!("Failed to reset output device {index}: error {code}");
                }
                if let Err(code) = driver.close() {
                    log::warn!("Failed to close output device {index}: error {code}");
                }
                return Err(PortError::CapabilityQuery(code));
            }
        };
        log::debug!("Opened output device {index}: {capabilities:?}");
        Ok(Self {
            index,
            driver: Some(driver),
            capabilities: Some(capabilities),
            debug: false,
            sink: Box::new(LogSink),
        })
    }

    #[must_use]
    pub const fn index(&self) -> DeviceIndex {
        self.index
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.driver.is_some()
    }

    /// The capabilities queried when opening the port.
    ///
    /// `None` after the session has been closed.
    #[must_use]
    pub const fn capabilities(&self) -> Option<&OutputCapabilities> {
        self.capabilities.as_ref()
    }

    #[must_use]
    pub const fn is_debug(&self) -> bool {
        self.debug
    }

    /// Echo sent messages to the diagnostic sink.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Replaces the default [`LogSink`].
    pub fn set_diagnostic_sink(&mut self, sink: impl DiagnosticSink + 'static) {
        self.sink = Box::new(sink);
    }

    /// `Output MIDI device [<index>]` followed by the port name.
    #[must_use]
    pub fn identify(&self) -> String {
        let index = self.index;
        match &self.capabilities {
            Some(capabilities) => {
                format!(
                    "Output MIDI device [{index}]\t{name}",
                    name = capabilities.name
                )
            }
            None => format!("Output MIDI device [{index}]"),
        }
    }

    /// Hands the message over to the driver.
    ///
    /// In debug mode the message is echoed before the send is attempted,
    /// i.e. even if sending fails afterwards.
    pub fn send(&mut self, message: ShortMessage) -> PortResult<()> {
        if self.debug {
            self.sink.write_line(&format_sending(message));
        }
        let index = self.index;
        let driver = self
            .driver
            .as_mut()
            .ok_or(PortError::Send(NativeErrorCode::INVALID_HANDLE))?;
        log::trace!("Sending message to output device {index}: {message}");
        driver.send_short(message.to_word()).map_err(|code| {
            log::warn!("Failed to send message {message} to output device {index}: error {code}");
            PortError::Send(code)
        })
    }

    /// Plays middle C at full velocity on channel 0.
    ///
    /// No note-off message follows.
    pub fn beep(&mut self) -> PortResult<()> {
        self.send(ShortMessage::middle_c())
    }

    pub fn send_all_notes_off(&mut self, channel: Channel) -> PortResult<()> {
        self.send(ShortMessage::with_channel(
            MessageType::ControlChange,
            channel,
            ShortMessage::ALL_NOTES_OFF.data1,
            0,
        ))
    }

    /// Resets and closes the port.
    ///
    /// Failures are only logged. Closing an already closed session
    /// has no effect.
    pub fn close(&mut self) {
        let Some(mut driver) = self.driver.take() else {
            return;
        };
        let index = self.index;
        if let Err(code) = driver.reset() {
            log::warn!("Failed to reset output device {index}: error {code}");
        }
        if let Err(code) = driver.close() {
            log::warn!("Failed to close output device {index}: error {code}");
        }
        self.capabilities = None;
        log::debug!("Closed output device {index}");
    }
}

impl<B> Drop for OutputSession<B>
where
    B: MidiBackend,
{
    fn drop(&mut self) {
        self.close();
    }
}
