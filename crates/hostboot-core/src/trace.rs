//! Trace sink contract
//!
//! The bootstrapper reports progress through `write(message, verbose)`.
//! Writing never fails observably to the caller.

/// Destination for bootstrapper trace lines
pub trait TraceSink {
    /// Record one trace line. `verbose` lines are only of interest when
    /// tracing is explicitly enabled.
    fn write(&self, message: &str, verbose: bool);
}

/// Forwards trace lines to `tracing` events (`debug` for verbose lines).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn write(&self, message: &str, verbose: bool) {
        if verbose {
            tracing::debug!(target: "hostboot", "{}", message);
        } else {
            tracing::info!(target: "hostboot", "{}", message);
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn write(&self, _message: &str, _verbose: bool) {}
}

impl<T: TraceSink + ?Sized> TraceSink for &T {
    fn write(&self, message: &str, verbose: bool) {
        (**self).write(message, verbose)
    }
}
