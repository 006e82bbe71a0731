//! Built-in sinks for JALKI
//!
//! Sinks record descriptors at a destination. The tracker submits each
//! record exactly once; anything smarter - retries, buffering, fan-out -
//! belongs in a sink implementation or a wrapper like [`RetrySink`].

pub mod memory;
pub mod retry;
pub mod stdout;

// Re-export the AuditSink trait from jalki-core - the canonical source;
// external sink crates depend on jalki-core directly.
pub use jalki_core::AuditSink;

pub use memory::MemorySink;
pub use retry::{BackoffConfig, RetrySink};
pub use stdout::StdoutSink;
