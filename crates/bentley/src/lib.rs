//! Console logging for the reasoning tools.
//!
//! Library code logs through the [`info!`], [`warn!`], [`error!`] and [`verbose!`]
//! macros, which forward to `tracing`. Binaries call [`init`] once to install a
//! subscriber that renders every event with a short colored level prefix and the
//! path of the spans it happened in:
//!
//! ```text
//! [info]  request/retrieve: 5 reference chains above threshold
//! [warn]  request/generate: attempt 1/3 failed: service unavailable
//! ```
//!
//! Everything goes to stderr so stdout stays clean for results.

use std::fmt::{self, Write as _};

use chrono::Local;
use colored::*;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

pub use tracing;

const DEFAULT_FILTER: &str =
  "reasoning=info,reasoning_server=info,lance=error,lance_datafusion=error,datafusion=error,warn";
const VERBOSE_FILTER: &str =
  "reasoning=debug,reasoning_server=debug,info,lance=warn,lance_datafusion=warn,datafusion=warn";

/// Install the global subscriber. `RUST_LOG` wins over the built-in filters.
///
/// Calling this twice is harmless; the second call leaves the first subscriber
/// in place.
pub fn init(verbose: bool) {
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }));

  let layer = tracing_subscriber::fmt::layer()
    .with_writer(std::io::stderr)
    .event_format(PrefixFormat::new(verbose));

  let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}

/// Colored, fixed-width level prefix, e.g. `[info] `.
pub fn format_prefix(level: &Level) -> String {
  let (label, color) = match *level {
    Level::ERROR => ("error", Color::Red),
    Level::WARN => ("warn", Color::Yellow),
    Level::INFO => ("info", Color::Blue),
    Level::DEBUG => ("verb", Color::Cyan),
    Level::TRACE => ("trace", Color::Magenta),
  };
  format!("[{}]{:<width$}", label.color(color).bold(), "", width = 7 - label.len() - 2)
}

/// Event formatter used by [`init`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixFormat {
  timestamps: bool,
}

impl PrefixFormat {
  pub fn new(timestamps: bool) -> Self {
    Self { timestamps }
  }

  fn prefix(&self, level: &Level) -> String {
    let mut prefix = format_prefix(level);
    if self.timestamps {
      let _ = write!(prefix, " [{}]", Local::now().format("%H:%M:%S").to_string().cyan());
    }
    prefix
  }
}

impl<S, N> FormatEvent<S, N> for PrefixFormat
where
  S: Subscriber + for<'a> LookupSpan<'a>,
  N: for<'a> FormatFields<'a> + 'static,
{
  fn format_event(
    &self,
    ctx: &FmtContext<'_, S, N>,
    mut writer: Writer<'_>,
    event: &Event<'_>,
  ) -> fmt::Result {
    let mut message = String::new();
    ctx.format_fields(Writer::new(&mut message), event)?;

    let prefix = self.prefix(event.metadata().level());
    let scope = span_path(ctx);

    for line in message.lines() {
      match &scope {
        Some(path) => writeln!(writer, "{prefix} {path}: {line}")?,
        None => writeln!(writer, "{prefix} {line}")?,
      }
    }
    Ok(())
  }
}

fn span_path<S, N>(ctx: &FmtContext<'_, S, N>) -> Option<String>
where
  S: Subscriber + for<'a> LookupSpan<'a>,
  N: for<'a> FormatFields<'a> + 'static,
{
  let scope = ctx.event_scope()?;
  let names: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
  if names.is_empty() {
    None
  } else {
    Some(names.join("/"))
  }
}

/// Print a user-facing message to stderr line by line.
pub fn log(message: &str) {
  for line in message.lines() {
    eprintln!("{line}");
  }
}

/// Something finished and the user should know.
pub fn success(message: &str) {
  let prefix = format!("[{}] ", "sccs".green().bold());
  for line in message.lines() {
    log(&format!("{prefix}{line}"));
  }
}

/// A request ended in a failure outcome the user has to act on.
pub fn fail(message: &str) {
  let prefix = format!("[{}] ", "fail".bright_red().bold());
  for line in message.lines() {
    log(&format!("{prefix}{line}"));
  }
}

/// Create a banner line of the specified length and character
pub fn banner_line(length: usize, char: char) -> String {
  char.to_string().repeat(length)
}

/// Bannered heading, used before long results.
pub fn announce(message: &str) {
  let banner = banner_line(60, '=');
  log(&banner.blue().bold().to_string());
  log(&message.blue().bold().to_string());
  log(&banner.blue().bold().to_string());
}

#[macro_export]
macro_rules! info {
  ($($arg:tt)+) => {
    $crate::tracing::info!($($arg)+) // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! warn {
  ($($arg:tt)+) => {
    $crate::tracing::warn!($($arg)+) // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! error {
  ($($arg:tt)+) => {
    $crate::tracing::error!($($arg)+) // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! verbose {
  ($($arg:tt)+) => {
    $crate::tracing::debug!($($arg)+) // LCOV_EXCL_LINE
  };
}
