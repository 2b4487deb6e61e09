//! The progress sink collaborator (C9): a thread-safe event receiver the
//! core hands coarse-grained progress to without knowing whether anyone
//! is watching. Mirrors the shape of `other_examples/...dedupe.rs.rs`'s
//! progress bar plumbing, generalized into a trait so library code never
//! depends on a concrete terminal widget.

use indicatif::{ProgressBar, ProgressStyle};

/// Implemented by whatever is watching a long-running operation (the CLI,
/// a test harness, nothing at all). Every method takes `&self` rather
/// than `&mut self` so a sink can be shared across the parallel workers
/// the Indexer and Planner use for file I/O.
pub trait ProgressSink: Sync {
    fn set_length(&self, total: u64);
    fn inc(&self, delta: u64);
    fn set_message(&self, message: &str);
    fn finish(&self, message: &str);
}

/// Used by tests and by any caller that doesn't want terminal output.
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn set_length(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _message: &str) {}
    fn finish(&self, _message: &str) {}
}

/// The CLI's real sink: a single `indicatif::ProgressBar` driving a
/// terminal spinner/bar. `ProgressBar` is already internally synchronized
/// (it wraps its state in a `Mutex`), so this is `Sync` for free.
pub struct CliProgressSink {
    bar: ProgressBar,
}

impl CliProgressSink {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }
}

impl Default for CliProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for CliProgressSink {
    fn set_length(&self, total: u64) {
        self.bar.set_length(total);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_accepts_every_call_without_panicking() {
        let sink = NoOpProgressSink;
        sink.set_length(10);
        sink.inc(3);
        sink.set_message("scanning");
        sink.finish("done");
    }
}
