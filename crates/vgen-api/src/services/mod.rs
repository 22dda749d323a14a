//! Background services.

pub mod stalled_job_sweeper;

pub use stalled_job_sweeper::{StalledJobSweeper, SweepReport};
