//! Depth-aware logger
//!
//! Every message is tagged with the nesting depth of the task that produced
//! it and indented with `depth - 1` indent units. The root task runs at depth 1.

use crate::config::Settings;
use crate::runner::options::stringify;
use crate::ui::sink::{Level, LogEvent, LogSink, LogStream, WriterSink};
use serde_yaml::Value;

/// Values accepted by logging calls
pub trait LogMessage {
    fn to_log_text(&self) -> String;
}

impl LogMessage for str {
    fn to_log_text(&self) -> String {
        self.to_string()
    }
}

impl LogMessage for String {
    fn to_log_text(&self) -> String {
        self.clone()
    }
}

impl LogMessage for Value {
    fn to_log_text(&self) -> String {
        stringify(self)
    }
}

impl LogMessage for Option<&Value> {
    fn to_log_text(&self) -> String {
        match self {
            Some(value) => stringify(value),
            None => "undefined".to_string(),
        }
    }
}

impl<T: LogMessage + ?Sized> LogMessage for &T {
    fn to_log_text(&self) -> String {
        (**self).to_log_text()
    }
}

macro_rules! display_log_message {
    ($($ty:ty)*) => {
        $(
            impl LogMessage for $ty {
                fn to_log_text(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

display_log_message! { bool i32 i64 u32 u64 usize f64 }

/// Streaming, depth-aware log writer
pub struct Logger {
    verbosity: i32,
    debug: bool,
    indent: String,
    sinks: Vec<Box<dyn LogSink>>,
    at_line_start: bool,
    muted: usize,
}

impl Logger {
    /// Create a logger with unlimited verbosity, no debug output and no sinks
    pub fn new() -> Self {
        Logger {
            verbosity: -1,
            debug: false,
            indent: "  ".to_string(),
            sinks: Vec::new(),
            at_line_start: true,
            muted: 0,
        }
    }

    /// Create a logger from engine settings
    ///
    /// With `echo` enabled, output is mirrored to stderr.
    pub fn from_settings(settings: &Settings) -> Self {
        let logger = Logger::new()
            .with_verbosity(settings.verbosity)
            .with_debug(settings.debug)
            .with_indent(settings.indent.clone());

        if settings.echo {
            logger.with_sink(WriterSink::stderr(settings.color))
        } else {
            logger
        }
    }

    /// Set the maximum depth that produces output (`-1` unlimited, `0` silent)
    pub fn with_verbosity(mut self, verbosity: i32) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Show debug messages
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the indent unit
    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    /// Add a sink
    pub fn with_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn add_sink(&mut self, sink: impl LogSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    /// Attach a live stream receiving every event from now on
    pub fn stream(&mut self) -> LogStream {
        let (sink, stream) = LogStream::channel();
        self.add_sink(sink);
        stream
    }

    pub fn verbosity(&self) -> i32 {
        self.verbosity
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    /// Whether a message at this level and depth would be emitted
    pub fn is_enabled(&self, level: Level, depth: usize) -> bool {
        if self.muted > 0 || self.verbosity == 0 {
            return false;
        }
        if self.verbosity > 0 && depth > self.verbosity as usize {
            return false;
        }
        level != Level::Debug || self.debug
    }

    /// Suppress all output until the matching [`Logger::unmute`]
    pub fn mute(&mut self) {
        self.muted += 1;
    }

    pub fn unmute(&mut self) {
        self.muted = self.muted.saturating_sub(1);
    }

    pub fn is_muted(&self) -> bool {
        self.muted > 0
    }

    /// Indentation prefix for a depth
    pub fn indent_for(&self, depth: usize) -> String {
        self.indent.repeat(depth.saturating_sub(1))
    }

    /// Write a message without ending the line
    pub fn write(&mut self, level: Level, depth: usize, message: impl LogMessage) {
        if !self.is_enabled(level, depth) {
            return;
        }
        let text = self.render(depth, &message.to_log_text());
        self.emit(level, depth, text, false);
    }

    /// Write a message and end the line
    pub fn writeln(&mut self, level: Level, depth: usize, message: impl LogMessage) {
        if !self.is_enabled(level, depth) {
            return;
        }
        let mut text = message.to_log_text();
        text.push('\n');
        let text = self.render(depth, &text);
        self.emit(level, depth, text, false);
    }

    /// Write the header line of a task entering at `depth`
    pub fn header(&mut self, depth: usize, description: &str) {
        if !self.is_enabled(Level::Info, depth) {
            return;
        }
        let mut text = String::new();
        if !self.at_line_start {
            text.push('\n');
            self.at_line_start = true;
        }
        text.push_str(&self.render(depth, &format!("{}\n", description)));
        self.emit(Level::Info, depth, text, true);
    }

    /// End a line left open by a partial write
    pub fn break_line(&mut self, depth: usize) {
        if self.at_line_start || self.is_muted() {
            return;
        }
        self.at_line_start = true;
        self.emit(Level::Info, depth, "\n".to_string(), false);
    }

    /// Borrow a handle that logs at a fixed depth
    pub fn at(&mut self, depth: usize) -> TaskLog<'_> {
        TaskLog {
            logger: self,
            depth,
        }
    }

    // Line breaks inside the text re-arm indentation; a write that does not
    // end its line leaves the next write unindented.
    fn render(&mut self, depth: usize, text: &str) -> String {
        let indent = self.indent_for(depth);
        let mut out = String::with_capacity(text.len() + indent.len());

        for (i, segment) in text.split('\n').enumerate() {
            if i > 0 {
                out.push('\n');
                self.at_line_start = true;
            }
            if segment.is_empty() {
                continue;
            }
            if self.at_line_start {
                out.push_str(&indent);
                self.at_line_start = false;
            }
            out.push_str(segment);
        }

        out
    }

    fn emit(&mut self, level: Level, depth: usize, text: String, header: bool) {
        if text.is_empty() {
            return;
        }
        let event = LogEvent {
            level,
            depth,
            text,
            header,
        };
        for sink in &mut self.sinks {
            if let Err(e) = sink.emit(&event) {
                tracing::warn!("Failed to write log output: {}", e);
            }
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Logger handle bound to one task depth
pub struct TaskLog<'a> {
    logger: &'a mut Logger,
    depth: usize,
}

macro_rules! level_methods {
    ($($name:ident, $name_ln:ident => $level:expr;)*) => {
        $(
            pub fn $name(&mut self, message: impl LogMessage) {
                self.logger.write($level, self.depth, message);
            }

            pub fn $name_ln(&mut self, message: impl LogMessage) {
                self.logger.writeln($level, self.depth, message);
            }
        )*
    };
}

impl TaskLog<'_> {
    level_methods! {
        info, infoln => Level::Info;
        warn, warnln => Level::Warn;
        error, errorln => Level::Error;
        success, successln => Level::Success;
        debug, debugln => Level::Debug;
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger() -> (Logger, LogStream) {
        let mut logger = Logger::new();
        let stream = logger.stream();
        (logger, stream)
    }

    #[test]
    fn test_indentation_by_depth() {
        let (mut logger, stream) = logger();
        logger.at(1).infoln("root");
        logger.at(2).infoln("hello");
        logger.at(3).warnln("deep");

        assert_eq!(stream.text(), "root\n  hello\n    deep\n");
    }

    #[test]
    fn test_custom_indent_unit() {
        let mut logger = Logger::new().with_indent("\t");
        let stream = logger.stream();
        logger.at(3).infoln("x");
        assert_eq!(stream.text(), "\t\tx\n");
    }

    #[test]
    fn test_partial_lines_are_not_reindented() {
        let (mut logger, stream) = logger();
        logger.at(2).info("copying");
        logger.at(2).info("...");
        logger.at(2).successln(" done");
        logger.at(2).infoln("next");

        assert_eq!(stream.text(), "  copying... done\n  next\n");
    }

    #[test]
    fn test_multiline_messages() {
        let (mut logger, stream) = logger();
        logger.at(2).infoln("first\nsecond\n\nfourth");
        assert_eq!(stream.text(), "  first\n  second\n\n  fourth\n");
    }

    #[test]
    fn test_header_breaks_open_line() {
        let (mut logger, stream) = logger();
        logger.at(1).info("working");
        logger.header(2, "Child task");

        let events = stream.events();
        assert_eq!(events.len(), 2);
        assert!(events[1].header);
        assert_eq!(events[1].text, "\n  Child task\n");
    }

    #[test]
    fn test_break_line() {
        let (mut logger, stream) = logger();
        logger.break_line(1);
        logger.at(2).info("copying");
        logger.break_line(2);
        logger.break_line(2);
        logger.at(1).errorln("failed");
        assert_eq!(stream.text(), "  copying\nfailed\n");
    }

    #[test]
    fn test_verbosity_caps_depth() {
        let mut logger = Logger::new().with_verbosity(2);
        let stream = logger.stream();
        logger.at(1).infoln("one");
        logger.at(2).infoln("two");
        logger.at(3).infoln("three");
        assert_eq!(stream.text(), "one\n  two\n");

        let mut silent = Logger::new().with_verbosity(0);
        let stream = silent.stream();
        silent.at(1).errorln("nothing");
        assert_eq!(stream.text(), "");
    }

    #[test]
    fn test_debug_gate() {
        let (mut logger, stream) = logger();
        logger.at(1).debugln("hidden");
        assert_eq!(stream.text(), "");

        let mut logger = Logger::new().with_debug(true);
        let stream = logger.stream();
        logger.at(1).debugln("shown");
        let events = stream.events();
        assert_eq!(events[0].level, Level::Debug);
        assert_eq!(events[0].text, "shown\n");
    }

    #[test]
    fn test_mute() {
        let (mut logger, stream) = logger();
        logger.mute();
        logger.mute();
        logger.at(1).infoln("a");
        logger.unmute();
        logger.at(1).infoln("b");
        logger.unmute();
        logger.at(1).infoln("c");
        assert_eq!(stream.text(), "c\n");
    }

    #[test]
    fn test_non_string_messages() {
        let (mut logger, stream) = logger();
        let mut log = logger.at(1);
        log.infoln(Value::from(vec!["a", "b"]));
        log.infoln(Value::Null);
        log.infoln(None::<&Value>);
        log.infoln(42);
        log.infoln(false);
        assert_eq!(stream.text(), "a,b\nnull\nundefined\n42\nfalse\n");
    }
}
