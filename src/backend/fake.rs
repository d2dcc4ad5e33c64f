// SPDX-FileCopyrightText: The midi-shortmsg authors
// SPDX-License-Identifier: MPL-2.0

//! In-memory driver for testing sessions without hardware

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use super::{
    event_kind, DeviceDirectory, DeviceIndex, Direction, DriverCallback, InputDriver, MidiBackend,
    OutputCapabilities, OutputDriver, RawEvent,
};
use crate::NativeErrorCode;

type SharedCallback = Arc<Mutex<DriverCallback>>;

#[derive(Default)]
pub(crate) struct FakeState {
    next_handle: usize,
    open_inputs: HashMap<usize, (DeviceIndex, SharedCallback)>,
    open_outputs: HashMap<usize, (DeviceIndex, SharedCallback)>,
    listening: HashMap<usize, bool>,
    pub(crate) open_calls: usize,
    pub(crate) close_calls: usize,
    pub(crate) reset_calls: usize,
    pub(crate) start_calls: usize,
    pub(crate) stop_calls: usize,
    pub(crate) sent_words: Vec<u32>,
    pub(crate) fail_open: Option<NativeErrorCode>,
    pub(crate) fail_capabilities: Option<NativeErrorCode>,
    pub(crate) fail_send: Option<NativeErrorCode>,
    pub(crate) fail_start: Option<NativeErrorCode>,
    pub(crate) fail_close: Option<NativeErrorCode>,
}

impl FakeState {
    pub(crate) fn open_handles(&self) -> usize {
        self.open_inputs.len() + self.open_outputs.len()
    }
}

#[derive(Clone)]
pub(crate) struct FakeBackend {
    input_names: Vec<String>,
    output_names: Vec<String>,
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub(crate) fn new<'a>(
        input_names: impl IntoIterator<Item = &'a str>,
        output_names: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            input_names: input_names.into_iter().map(ToOwned::to_owned).collect(),
            output_names: output_names.into_iter().map(ToOwned::to_owned).collect(),
            state: Default::default(),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers an event to all open inputs of the given device.
    ///
    /// Data and error events are only delivered while listening.
    /// Returns the number of callbacks that have been invoked.
    pub(crate) fn emit_input(&self, index: DeviceIndex, event: RawEvent) -> usize {
        let callbacks = {
            let state = self.state();
            state
                .open_inputs
                .iter()
                .filter(|(handle, (device_index, _))| {
                    *device_index == index
                        && (matches!(
                            event.kind,
                            event_kind::INPUT_OPEN | event_kind::INPUT_CLOSE
                        ) || state.listening.get(handle).copied().unwrap_or(false))
                })
                .map(|(_, (_, callback))| Arc::clone(callback))
                .collect::<Vec<_>>()
        };
        for callback in &callbacks {
            let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
            callback(event);
        }
        callbacks.len()
    }

    fn register(
        &self,
        direction: Direction,
        index: DeviceIndex,
        callback: DriverCallback,
    ) -> Result<(usize, SharedCallback), NativeErrorCode> {
        let mut state = self.state();
        state.open_calls += 1;
        if index >= self.device_count(direction) {
            return Err(NativeErrorCode::BAD_DEVICE_ID);
        }
        if let Some(code) = state.fail_open {
            return Err(code);
        }
        let handle = state.next_handle;
        state.next_handle += 1;
        let callback = Arc::new(Mutex::new(callback));
        let entry = (index, Arc::clone(&callback));
        match direction {
            Direction::Input => {
                state.open_inputs.insert(handle, entry);
                state.listening.insert(handle, false);
            }
            Direction::Output => {
                state.open_outputs.insert(handle, entry);
            }
        }
        Ok((handle, callback))
    }

    /// Returns `true` if the handle was still open.
    fn release(&self, handle: usize) -> bool {
        let mut state = self.state();
        state.listening.remove(&handle);
        let released = state.open_inputs.remove(&handle).is_some()
            || state.open_outputs.remove(&handle).is_some();
        if released {
            state.close_calls += 1;
        }
        released
    }
}

fn notify(callback: &SharedCallback, kind: u32) {
    let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
    callback(RawEvent::new(kind));
}

impl DeviceDirectory for FakeBackend {
    fn device_count(&self, direction: Direction) -> usize {
        match direction {
            Direction::Input => self.input_names.len(),
            Direction::Output => self.output_names.len(),
        }
    }

    fn device_name(&self, direction: Direction, index: DeviceIndex) -> Option<String> {
        match direction {
            Direction::Input => self.input_names.get(index),
            Direction::Output => self.output_names.get(index),
        }
        .cloned()
    }
}

pub(crate) struct FakeInput {
    backend: FakeBackend,
    handle: usize,
    callback: SharedCallback,
    closed: bool,
}

impl FakeInput {
    fn close_handle(&mut self) -> Result<(), NativeErrorCode> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        if self.backend.release(self.handle) {
            notify(&self.callback, event_kind::INPUT_CLOSE);
        }
        self.backend.state().fail_close.map_or(Ok(()), Err)
    }
}

impl InputDriver for FakeInput {
    fn start(&mut self) -> Result<(), NativeErrorCode> {
        let mut state = self.backend.state();
        state.start_calls += 1;
        if let Some(code) = state.fail_start {
            return Err(code);
        }
        state.listening.insert(self.handle, true);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), NativeErrorCode> {
        let mut state = self.backend.state();
        state.stop_calls += 1;
        state.listening.insert(self.handle, false);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), NativeErrorCode> {
        self.backend.state().reset_calls += 1;
        Ok(())
    }

    fn close(mut self) -> Result<(), NativeErrorCode> {
        self.close_handle()
    }
}

impl Drop for FakeInput {
    fn drop(&mut self) {
        let _ = self.close_handle();
    }
}

pub(crate) struct FakeOutput {
    backend: FakeBackend,
    handle: usize,
    callback: SharedCallback,
    closed: bool,
}

impl FakeOutput {
    fn close_handle(&mut self) -> Result<(), NativeErrorCode> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        if self.backend.release(self.handle) {
            notify(&self.callback, event_kind::OUTPUT_CLOSE);
        }
        self.backend.state().fail_close.map_or(Ok(()), Err)
    }
}

impl OutputDriver for FakeOutput {
    fn send_short(&mut self, word: u32) -> Result<(), NativeErrorCode> {
        let mut state = self.backend.state();
        if let Some(code) = state.fail_send {
            return Err(code);
        }
        state.sent_words.push(word);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), NativeErrorCode> {
        self.backend.state().reset_calls += 1;
        Ok(())
    }

    fn close(mut self) -> Result<(), NativeErrorCode> {
        self.close_handle()
    }
}

impl Drop for FakeOutput {
    fn drop(&mut self) {
        let _ = self.close_handle();
    }
}

impl MidiBackend for FakeBackend {
    type Input = FakeInput;
    type Output = FakeOutput;

    fn open_input(
        &self,
        index: DeviceIndex,
        callback: DriverCallback,
    ) -> Result<Self::Input, NativeErrorCode> {
        let (handle, callback) = self.register(Direction::Input, index, callback)?;
        notify(&callback, event_kind::INPUT_OPEN);
        Ok(FakeInput {
            backend: self.clone(),
            handle,
            callback,
            closed: false,
        })
    }

    fn open_output(
        &self,
        index: DeviceIndex,
        callback: DriverCallback,
    ) -> Result<Self::Output, NativeErrorCode> {
        let (handle, callback) = self.register(Direction::Output, index, callback)?;
        notify(&callback, event_kind::OUTPUT_OPEN);
        Ok(FakeOutput {
            backend: self.clone(),
            handle,
            callback,
            closed: false,
        })
    }

    fn output_capabilities(
        &self,
        index: DeviceIndex,
    ) -> Result<OutputCapabilities, NativeErrorCode> {
        if let Some(code) = self.state().fail_capabilities {
            return Err(code);
        }
        let name = self
            .device_name(Direction::Output, index)
            .ok_or(NativeErrorCode::BAD_DEVICE_ID)?;
        Ok(OutputCapabilities {
            name,
            channel_mask: 0xffff,
            ..Default::default()
        })
    }
}
