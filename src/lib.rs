pub mod cli;
pub mod coalescer;
pub mod config;
pub mod logging;

pub use coalescer::{
    ChangeSource, CoalesceError, Coalescer, CoalescerBuilder, DEFAULT_DEBOUNCE, Signal, Signals,
    StatsSnapshot, Termination,
};
pub use config::Settings;
