// src/utils/logger.rs

use env_logger::Env;
use log::Level;
use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Console logging through env_logger. `RUST_LOG` overrides the default.
pub fn init_console(verbose: bool) {
  let default = if verbose { "debug" } else { "warn" };
  let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default))
    .format_timestamp(None)
    .try_init();
}

/// Append-only event sink, one `LEVEL:component:operation:message` line per
/// event. Every record is also forwarded to the `log` facade.
///
/// Opened once by the caller and passed down explicitly; flushed by
/// `finish` or on drop.
pub struct EventLog {
  writer: Option<Box<dyn Write>>,
}

impl EventLog {
  pub fn open(path: &Path) -> io::Result<Self> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Self::to_writer(BufWriter::new(file)))
  }

  pub fn to_writer(writer: impl Write + 'static) -> Self {
    Self {
      writer: Some(Box::new(writer)),
    }
  }

  /// Forwards to the `log` facade only
  pub fn disabled() -> Self {
    Self { writer: None }
  }

  pub fn record(&mut self, level: Level, component: &str, operation: &str, message: impl Display) {
    let message = message.to_string().replace('\n', " ");
    log::log!(target: component, level, "{}: {}", operation, message);

    if let Some(w) = self.writer.as_mut() {
      let line = format!("{}:{}:{}:{}", level, component, operation, message);
      if let Err(e) = writeln!(w, "{}", line) {
        log::error!("event log write failed, disabling file sink: {}", e);
        self.writer = None;
      }
    }
  }

  pub fn debug(&mut self, component: &str, operation: &str, message: impl Display) {
    self.record(Level::Debug, component, operation, message);
  }

  pub fn info(&mut self, component: &str, operation: &str, message: impl Display) {
    self.record(Level::Info, component, operation, message);
  }

  pub fn warn(&mut self, component: &str, operation: &str, message: impl Display) {
    self.record(Level::Warn, component, operation, message);
  }

  pub fn error(&mut self, component: &str, operation: &str, message: impl Display) {
    self.record(Level::Error, component, operation, message);
  }

  pub fn flush(&mut self) -> io::Result<()> {
    match self.writer.as_mut() {
      Some(w) => w.flush(),
      None => Ok(()),
    }
  }

  pub fn finish(mut self) -> io::Result<()> {
    self.flush()
  }
}

impl Drop for EventLog {
  fn drop(&mut self) {
    let _ = self.flush();
  }
}
