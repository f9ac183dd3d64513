//! Severity-filtered publish/subscribe logging.
//!
//! A [`Logger`] owns a threshold and a set of [`LogSink`] subscribers. Every client and
//! connection accepts an injected `Arc<Logger>` and falls back to [`Logger::global`], the
//! process-wide instance. Dispatch is synchronous and best-effort: errors returned by a sink, and
//! panics raised inside one, are discarded so logging never destabilizes the caller.

// std
use std::{
	panic::{self, AssertUnwindSafe},
	sync::{
		LazyLock,
		atomic::{AtomicU64, Ordering},
	},
};
// self
use crate::{
	_prelude::*,
	error::{BoxError, RequestError},
};

static GLOBAL: LazyLock<Arc<Logger>> = LazyLock::new(|| Arc::new(Logger::new()));

/// Error type sinks may return; it is always discarded.
pub type SinkError = BoxError;

/// Importance of a log entry. Lower values are more severe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
	/// A fatal, crashing condition.
	Fatal = 0,
	/// An error.
	Error = 10,
	/// A warning.
	#[default]
	Warning = 20,
	/// Informational output.
	Information = 30,
	/// Debug output.
	Debug = 40,
}
impl LogLevel {
	/// Returns `true` when `self` is at least as severe as `threshold`.
	pub fn passes(self, threshold: Self) -> bool {
		self <= threshold
	}

	/// Returns a stable label suitable for output.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Fatal => "fatal",
			Self::Error => "error",
			Self::Warning => "warning",
			Self::Information => "information",
			Self::Debug => "debug",
		}
	}
}
impl Display for LogLevel {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// A single emitted log record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
	/// Severity of the entry.
	pub level: LogLevel,
	/// Message text.
	pub message: String,
}
impl LogEntry {
	/// Creates a new entry.
	pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
		Self { level, message: message.into() }
	}
}

/// Subscriber capability: receives log entries.
pub trait LogSink
where
	Self: Send + Sync,
{
	/// Handles one entry. Returned errors are discarded by the logger.
	fn receive(&self, entry: &LogEntry) -> Result<(), SinkError>;
}
impl<F> LogSink for F
where
	F: Fn(&LogEntry) + Send + Sync,
{
	fn receive(&self, entry: &LogEntry) -> Result<(), SinkError> {
		self(entry);

		Ok(())
	}
}

/// Handle returned by [`Logger::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Severity-filtered dispatcher for [`LogSink`] subscribers.
pub struct Logger {
	threshold: RwLock<LogLevel>,
	next_id: AtomicU64,
	sinks: RwLock<Vec<(SubscriptionId, Arc<dyn LogSink>)>>,
}
impl Logger {
	/// Creates a logger with the default [`LogLevel::Warning`] threshold and no subscribers.
	pub fn new() -> Self {
		Self {
			threshold: RwLock::new(LogLevel::default()),
			next_id: AtomicU64::new(0),
			sinks: RwLock::new(Vec::new()),
		}
	}

	/// Returns the process-wide logger.
	pub fn global() -> Arc<Self> {
		GLOBAL.clone()
	}

	/// Returns the current threshold.
	pub fn threshold(&self) -> LogLevel {
		*self.threshold.read()
	}

	/// Replaces the threshold; entries less severe than `level` are dropped.
	pub fn set_threshold(&self, level: LogLevel) {
		*self.threshold.write() = level;
	}

	/// Registers a subscriber.
	pub fn subscribe(&self, sink: impl 'static + LogSink) -> SubscriptionId {
		self.subscribe_arc(Arc::new(sink))
	}

	/// Registers a shared subscriber.
	pub fn subscribe_arc(&self, sink: Arc<dyn LogSink>) -> SubscriptionId {
		let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

		self.sinks.write().push((id, sink));

		id
	}

	/// Removes a subscriber, returning `false` if it was not registered.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut sinks = self.sinks.write();
		let before = sinks.len();

		sinks.retain(|(existing, _)| *existing != id);

		sinks.len() != before
	}

	/// Number of registered subscribers.
	pub fn subscriber_count(&self) -> usize {
		self.sinks.read().len()
	}

	/// Dispatches `message` to every subscriber when `level` passes the threshold.
	pub fn log(&self, level: LogLevel, message: impl Into<String>) {
		if !level.passes(self.threshold()) {
			return;
		}

		// Snapshot so sinks may (un)subscribe from inside `receive`.
		let sinks = self.sinks.read().iter().map(|(_, sink)| sink.clone()).collect::<Vec<_>>();

		if sinks.is_empty() {
			return;
		}

		let entry = LogEntry::new(level, message);

		for sink in sinks {
			let _ = panic::catch_unwind(AssertUnwindSafe(|| sink.receive(&entry)));
		}
	}

	/// Logs `message` at [`LogLevel::Information`].
	pub fn info(&self, message: impl Into<String>) {
		self.log(LogLevel::Information, message);
	}

	/// Logs an error at [`LogLevel::Error`].
	///
	/// Crate errors are rendered with their `describe` form; anything else with `Display`.
	pub fn log_error(&self, error: &(dyn StdError + 'static)) {
		let message = if let Some(err) = error.downcast_ref::<Error>() {
			err.describe()
		} else if let Some(err) = error.downcast_ref::<RequestError>() {
			err.describe()
		} else {
			error.to_string()
		};

		self.log(LogLevel::Error, message);
	}
}
impl Default for Logger {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for Logger {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Logger")
			.field("threshold", &self.threshold())
			.field("subscribers", &self.subscriber_count())
			.finish()
	}
}

/// Sink that re-emits entries as `tracing` events under the `livestream_rest` target.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;
#[cfg(feature = "tracing")]
impl LogSink for TracingSink {
	fn receive(&self, entry: &LogEntry) -> Result<(), SinkError> {
		let message = entry.message.as_str();

		match entry.level {
			LogLevel::Fatal | LogLevel::Error =>
				tracing::error!(target: "livestream_rest", severity = entry.level.as_str(), "{message}"),
			LogLevel::Warning => tracing::warn!(target: "livestream_rest", "{message}"),
			LogLevel::Information => tracing::info!(target: "livestream_rest", "{message}"),
			LogLevel::Debug => tracing::debug!(target: "livestream_rest", "{message}"),
		}

		Ok(())
	}
}
