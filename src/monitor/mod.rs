// src/monitor/mod.rs
mod registry;
mod scheduler;

pub use registry::TargetRegistry;
pub use scheduler::{
    CycleReport, Scheduler, SchedulerError, DEFAULT_CHECK_INTERVAL, MIN_CHECK_INTERVAL,
};
