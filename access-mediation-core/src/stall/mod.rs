//! The stall engine: rendezvous entries, the sharded table that holds them,
//! and the blocking `stall()` entry point built on top of both.

pub mod engine;
pub mod entry;
pub mod table;

pub use engine::{stall, InterruptSource, NeverInterrupted, StallResult};
pub use entry::{StallEntry, WaitOutcome};
pub use table::{DequeueCursor, StallTable};
