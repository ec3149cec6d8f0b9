//! Log sinks
//!
//! A sink receives every event the [`Logger`](super::Logger) lets through.

use colored::Colorize;
use std::cell::RefCell;
use std::io::{self, Write};
use std::iter;
use std::sync::mpsc::{self, Receiver, Sender};
use std::vec;

/// Severity of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Warn,
    Error,
    Success,
    Debug,
}

/// One chunk of log output, already indented for its depth
///
/// `text` carries its own line terminator when the logging call ended the
/// line; partial writes arrive without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub level: Level,
    pub depth: usize,
    pub text: String,
    /// Whether this is the header line a task prints on entry
    pub header: bool,
}

/// Destination for log events
pub trait LogSink: Send {
    fn emit(&mut self, event: &LogEvent) -> io::Result<()>;
}

/// Writes events to any `io::Write`, optionally colored
pub struct WriterSink<W: Write + Send> {
    writer: W,
    color: bool,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W, color: bool) -> Self {
        WriterSink { writer, color }
    }

    /// Consume the sink, returning the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterSink<io::Stderr> {
    pub fn stderr(color: bool) -> Self {
        WriterSink::new(io::stderr(), color)
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn emit(&mut self, event: &LogEvent) -> io::Result<()> {
        if self.color {
            write!(self.writer, "{}", paint(event))?;
        } else {
            self.writer.write_all(event.text.as_bytes())?;
        }
        self.writer.flush()
    }
}

fn paint(event: &LogEvent) -> String {
    let text = event.text.as_str();
    if event.header {
        return text.bold().to_string();
    }
    match event.level {
        Level::Info => text.to_string(),
        Level::Warn => text.yellow().to_string(),
        Level::Error => text.red().to_string(),
        Level::Success => text.green().to_string(),
        Level::Debug => text.dimmed().to_string(),
    }
}

/// Forwards events into a [`LogStream`]
pub struct ChannelSink {
    sender: Sender<LogEvent>,
}

impl LogSink for ChannelSink {
    fn emit(&mut self, event: &LogEvent) -> io::Result<()> {
        // A dropped stream only means nobody is listening anymore
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}

/// Live handle over the log events of a run
///
/// Events arrive in execution order. Every event taken off the channel is
/// kept, so the output of a run can be read any number of times. Blocking
/// reads wait until the producing logger is dropped.
pub struct LogStream {
    receiver: Receiver<LogEvent>,
    received: RefCell<Vec<LogEvent>>,
}

impl LogStream {
    /// Create a connected sink and stream pair
    pub fn channel() -> (ChannelSink, LogStream) {
        let (sender, receiver) = mpsc::channel();
        let stream = LogStream {
            receiver,
            received: RefCell::new(Vec::new()),
        };
        (ChannelSink { sender }, stream)
    }

    /// Block until the next event, or `None` once the logger is gone
    pub fn recv(&self) -> Option<LogEvent> {
        let event = self.receiver.recv().ok()?;
        self.received.borrow_mut().push(event.clone());
        Some(event)
    }

    /// Every event received so far, without blocking
    pub fn events(&self) -> Vec<LogEvent> {
        let mut received = self.received.borrow_mut();
        received.extend(self.receiver.try_iter());
        received.clone()
    }

    /// Concatenated text of every event received so far
    pub fn text(&self) -> String {
        self.events().into_iter().map(|e| e.text).collect()
    }

    /// Blocking iterator over events not yet received
    pub fn iter(&self) -> impl Iterator<Item = LogEvent> + '_ {
        iter::from_fn(move || self.recv())
    }
}

impl IntoIterator for LogStream {
    type Item = LogEvent;
    type IntoIter = iter::Chain<vec::IntoIter<LogEvent>, mpsc::IntoIter<LogEvent>>;

    /// Every event of the run from the first, blocking for the rest
    fn into_iter(self) -> Self::IntoIter {
        self.received
            .into_inner()
            .into_iter()
            .chain(self.receiver)
    }
}
