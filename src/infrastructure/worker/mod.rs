//! Worker Layer - Background Task Processing
//!
//! 防抖定时器、单飞保护和自动保存调度器

mod autosave;
mod debounce;
mod in_flight;

pub use autosave::{
    AutosaveConfig, AutosaveScheduler, SaveOutcome, SaveState, SaveStatus, SkipReason,
    MAX_INTERVAL, MIN_INTERVAL,
};
pub use debounce::DebounceTimer;
pub use in_flight::{InFlight, InFlightGuard};
