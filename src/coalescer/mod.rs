//! Rate-shaping coalescer for change notifications.
//!
//! Turns a bursty stream of "something changed" events into a bounded
//! stream of refresh signals for a push-style consumer.
//!
//! # Architecture
//!
//! ```text
//! ChangeSource ──► Worker ──────────────► Signals ──► consumer
//!                    │ dirty flag
//!                    ├─ heartbeat tick (every period, always sends)
//!                    └─ debounce tick  (every 500ms, sends if dirty)
//! ```

mod error;
mod signals;
mod source;
mod stats;
mod worker;

pub use error::CoalesceError;
pub use signals::{Signal, Signals};
pub use source::ChangeSource;
pub use stats::{CoalescerStats, StatsSnapshot};
pub use worker::{Coalescer, CoalescerBuilder, DEFAULT_DEBOUNCE, Termination};
