// SPDX-FileCopyrightText: The midi-shortmsg authors
// SPDX-License-Identifier: MPL-2.0

//! Sinks for the diagnostic echo of sessions in debug mode

use std::io;

/// Receives one formatted line per echoed message.
///
/// Input sessions write into the sink from the driver thread.
pub trait DiagnosticSink: Send {
    fn write_line(&mut self, line: &str);
}

impl<F> DiagnosticSink for F
where
    F: FnMut(&str) + Send,
{
    fn write_line(&mut self, line: &str) {
        self(line);
    }
}

/// Forwards lines to the [`log`] facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn write_line(&mut self, line: &str) {
        log::info!("{line}");
    }
}

/// Writes lines into an [`io::Write`] stream, e.g. [`io::Stdout`].
#[derive(Debug)]
pub struct WriteSink<W> {
    writer: W,
}

impl<W> WriteSink<W> {
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriteSink<io::Stdout> {
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W> DiagnosticSink for WriteSink<W>
where
    W: io::Write + Send,
{
    fn write_line(&mut self, line: &str) {
        if let Err(err) = writeln!(self.writer, "{line}") {
            log::warn!("Failed to write diagnostic line: {err}");
        }
    }
}

pub type BoxedDiagnosticSink = Box<dyn DiagnosticSink + 'static>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_sink_terminates_lines() {
        let mut sink = WriteSink::new(Vec::new());
        sink.write_line("T1ms - Ch0 NOTE_ON; K60 V127");
        sink.write_line("second");
        let written = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!("T1ms - Ch0 NOTE_ON; K60 V127\nsecond\n", written);
    }

    #[test]
    fn closures_are_sinks() {
        let mut lines = Vec::new();
        {
            let mut sink = |line: &str| lines.push(line.to_owned());
            sink.write_line("line");
        }
        assert_eq!(vec!["line".to_owned()], lines);
    }
}
