// SPDX-FileCopyrightText: The midi-shortmsg authors
// SPDX-License-Identifier: MPL-2.0

use std::{
    ops::{Deref, DerefMut},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, Weak,
    },
};

use super::lock;
use crate::{
    format_error, format_received, BoxedDiagnosticSink, DeviceIndex, DiagnosticSink, Direction,
    DriverCallback, InputDriver, InputEvent, LogSink, MidiBackend, NativeErrorCode, PortError,
    PortResult, RawEvent, ShortMessage, TimeStamp,
};


/// Receives the events of an input port.
///
/// All methods are invoked on a thread owned by the driver, one at a time.
/// The default implementations only log the events.
pub trait InputHandler: Send {
    fn on_open(&mut self) {
        log::info!("Input device opened");
    }

    fn on_close(&mut self) {
        log::info!("Input device closed");
    }

    fn on_message(&mut self, message: ShortMessage, ts: TimeStamp) {
        log::debug!("Received message: {ts} ms {message}");
    }

    fn on_error(&mut self, message: ShortMessage, ts: TimeStamp) {
        log::warn!("Received invalid message: {ts} ms {message}");
    }
}

impl<D> InputHandler for D
where
    D: DerefMut + Send,
    <D as Deref>::Target: InputHandler,
{
    fn on_open(&mut self) {
        self.deref_mut().on_open();
    }

    fn on_close(&mut self) {
        self.deref_mut().on_close();
    }

    fn on_message(&mut self, message: ShortMessage, ts: TimeStamp) {
        self.deref_mut().on_message(message, ts);
    }

    fn on_error(&mut self, message: ShortMessage, ts: TimeStamp) {
        self.deref_mut().on_error(message, ts);
    }
}

/// Handler that only logs all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogInputHandler;

impl InputHandler for LogInputHandler {}

struct Dispatcher<H> {
    handler: H,
    sink: BoxedDiagnosticSink,
}

struct Shared<H> {
    debug: AtomicBool,
    dispatcher: Mutex<Dispatcher<H>>,
}

impl<H> Shared<H>
where
    H: InputHandler,
{
    fn new(handler: H) -> Self {
        Self {
            debug: AtomicBool::new(false),
            dispatcher: Mutex::new(Dispatcher {
                handler,
                sink: Box::new(LogSink),
            }),
        }
    }

    fn dispatch(&self, index: DeviceIndex, raw: RawEvent) {
        log::trace!("Received event from input device {index}: {raw:x?}");
        let Some(event) = InputEvent::from_raw(raw) else {
            log::debug!(
                "Ignoring unknown event kind {kind:#x} from input device {index}",
                kind = raw.kind
            );
            return;
        };
        let debug = self.debug.load(Ordering::Relaxed);
        let mut dispatcher = lock(&self.dispatcher);
        let Dispatcher { handler, sink } = &mut *dispatcher;
        match event {
            InputEvent::Opened => handler.on_open(),
            InputEvent::Closed => handler.on_close(),
            InputEvent::Message { message, ts } => {
                if debug {
                    sink.write_line(&format_received(ts, message));
                }
                handler.on_message(message, ts);
            }
            InputEvent::Error { message, ts } => {
                if debug {
                    sink.write_line(&format_error(ts, message));
                }
                handler.on_error(message, ts);
            }
        }
    }
}

// Adapter for the driver callback.
//
// Only holds a weak reference, the driver might invoke the callback
// while or even after the session is dropped.
fn new_driver_callback<H>(index: DeviceIndex, shared: Weak<Shared<H>>) -> DriverCallback
where
    H: InputHandler + 'static,
{
    Box::new(move |raw| {
        let Some(shared) = shared.upgrade() else {
            log::debug!("Dropping event from input device {index}: {raw:x?}");
            return;
        };
        shared.dispatch(index, raw);
    })
}

/// An open input port.
///
/// Received messages are dispatched to the [`InputHandler`] after
/// [`start_listening()`](Self::start_listening) has been invoked.
/// The port is closed when the session is dropped.
#[allow(missing_debug_implementations)]
pub struct InputSession<B, H>
where
    B: MidiBackend,
{
    index: DeviceIndex,
    name: Option<String>,
    driver: Option<B::Input>,
    shared: Arc<Shared<H>>,
}

impl<B, H> InputSession<B, H>
where
    B: MidiBackend,
    H: InputHandler + 'static,
{
    /// Opens the input port with the given index.
    ///
    /// On failure the handler is dropped and nothing remains open.
    pub fn open(backend: &B, index: DeviceIndex, handler: H) -> PortResult<Self> {
        let device_count = backend.device_count(Direction::Input);
        if index >= device_count {
            log::warn!("Input device index {index} out of range (count = {device_count})");
            return Err(PortError::DeviceOpen(NativeErrorCode::BAD_DEVICE_ID));
        }
        let shared = Arc::new(Shared::new(handler));
        let callback = new_driver_callback(index, Arc::downgrade(&shared));
        let driver = backend.open_input(index, callback).map_err(|code| {
            log::warn!(
                "Failed to open input device {index}: {text}",
                text = backend.error_text(Direction::Input, code)
            );
            PortError::DeviceOpen(code)
        })?;
        let name = backend.device_name(Direction::Input, index);
        log::debug!("Opened input device {index}: {name:?}");
        Ok(Self {
            index,
            name,
            driver: Some(driver),
            shared,
        })
    }
}

impl<B, H> InputSession<B, H>
where
    B: MidiBackend,
{
    #[must_use]
    pub const fn index(&self) -> DeviceIndex {
        self.index
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.driver.is_some()
    }

    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.shared.debug.load(Ordering::Relaxed)
    }

    /// Echo received messages to the diagnostic sink.
    pub fn set_debug(&self, debug: bool) {
        self.shared.debug.store(debug, Ordering::Relaxed);
    }

    /// Replaces the default [`LogSink`].
    pub fn set_diagnostic_sink(&self, sink: impl DiagnosticSink + 'static) {
        lock(&self.shared.dispatcher).sink = Box::new(sink);
    }

    /// Access the handler from the current thread.
    ///
    /// Blocks while the driver thread is dispatching an event.
    pub fn with_handler<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut lock(&self.shared.dispatcher).handler)
    }

    /// `Input MIDI device [<index>]` followed by the port name, if known.
    #[must_use]
    pub fn identify(&self) -> String {
        let Self { index, name, .. } = self;
        match name {
            Some(name) => format!("Input MIDI device [{index}]\t{name}"),
            None => format!("Input MIDI device [{index}]"),
        }
    }

    /// Starts the delivery of received messages.
    ///
    /// Repeated invocations are passed through to the driver.
    pub fn start_listening(&mut self) -> PortResult<()> {
        let index = self.index;
        let driver = self
            .driver
            .as_mut()
            .ok_or(PortError::Listen(NativeErrorCode::INVALID_HANDLE))?;
        driver.start().map_err(|code| {
            log::warn!("Failed to start listening on input device {index}: error {code}");
            PortError::Listen(code)
        })?;
        log::debug!("Started listening on input device {index}");
        Ok(())
    }

    /// Stops the delivery of received messages.
    ///
    /// Events that are already in flight might still be dispatched.
    pub fn stop_listening(&mut self) -> PortResult<()> {
        let index = self.index;
        let driver = self
            .driver
            .as_mut()
            .ok_or(PortError::Listen(NativeErrorCode::INVALID_HANDLE))?;
        driver.stop().map_err(|code| {
            log::warn!("Failed to stop listening on input device {index}: error {code}");
            PortError::Listen(code)
        })?;
        log::debug!("Stopped listening on input device {index}");
        Ok(())
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
            log::warn!("Failed to reset input device {index}: error {code}");
        }
        if let Err(code) = driver.close() {
            log::warn!("Failed to close input device {index}: error {code}");
        }
        log::debug!("Closed input device {index}");
    }
}

impl<B, H> Drop for InputSession<B, H>
where
    B: MidiBackend,
{
    fn drop(&mut self) {
        self.close();
    }
}
