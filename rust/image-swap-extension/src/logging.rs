//! Routes `tracing` output to the browser console.
//!
//! Each event is formatted by `tracing-subscriber`'s `fmt` layer into a
//! [LineWriter], which hands the finished line to a [LogSink] when it is
//! dropped. The default sink is the devtools console, where each level maps
//! onto the matching `console` method so the browser's own level filter
//! keeps working.

use std::io;

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

/// Somewhere finished log lines go.
pub trait LogSink: Clone {
    /// Emit one formatted line.
    fn write_line(&self, level: Level, line: &str);
}

/// The devtools console. Off the web it falls back to standard error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Console;

impl LogSink for Console {
    #[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
    fn write_line(&self, level: Level, line: &str) {
        let line = wasm_bindgen::JsValue::from_str(line);
        match level {
            Level::ERROR => web_sys::console::error_1(&line),
            Level::WARN => web_sys::console::warn_1(&line),
            Level::INFO => web_sys::console::info_1(&line),
            _ => web_sys::console::debug_1(&line),
        }
    }

    #[cfg(not(all(target_arch = "wasm32", target_os = "unknown")))]
    fn write_line(&self, _level: Level, line: &str) {
        eprintln!("{line}");
    }
}

/// Buffers one formatted event and emits it on drop.
pub struct LineWriter<S: LogSink> {
    sink: S,
    level: Level,
    buffer: Vec<u8>,
}

impl<S: LogSink> io::Write for LineWriter<S> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: LogSink> Drop for LineWriter<S> {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buffer);
        self.sink.write_line(self.level, line.trim_end());
    }
}

/// A [MakeWriter] producing one [LineWriter] per event.
#[derive(Debug, Clone, Default)]
pub struct ConsoleWriter<S = Console> {
    sink: S,
}

impl<S: LogSink> ConsoleWriter<S> {
    /// Write to `sink`.
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

impl<'a, S: LogSink + 'a> MakeWriter<'a> for ConsoleWriter<S> {
    type Writer = LineWriter<S>;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter {
            sink: self.sink.clone(),
            level: Level::INFO,
            buffer: Vec::new(),
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        LineWriter {
            sink: self.sink.clone(),
            level: *meta.level(),
            buffer: Vec::new(),
        }
    }
}

/// The most verbose level that is logged: `DEBUG` with the `debug` feature,
/// `INFO` otherwise.
pub fn max_level() -> Level {
    if cfg!(feature = "debug") {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Install the console subscriber as the global default. Later calls are
/// no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_writer(ConsoleWriter::<Console>::default())
        .with_ansi(false)
        .without_time()
        .with_max_level(max_level())
        .try_init();
}
