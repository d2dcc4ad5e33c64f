// SPDX-FileCopyrightText: The midi-shortmsg authors
// SPDX-License-Identifier: MPL-2.0

//! Sessions own exactly one open port each

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod input;
pub mod output;

// A handler that panicked on the driver thread must not render the
// session unusable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
