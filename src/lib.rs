//! wtt: a work time tracker that attributes elapsed wall-clock time per git
//! branch and calendar day.
//!
//! A background process samples the current branch on an interval and
//! accumulates durations into a durable JSON ledger shared by every tracked
//! project on the host. PID marker files tie each project to its tracker.

pub mod config;
pub mod daemon;
pub mod error;
pub mod git;
pub mod ledger;
pub mod process;
pub mod registry;
pub mod selector;
pub mod tracker;
pub mod view;

pub use config::{Config, RenderMode};
pub use error::{Result, WttError};
pub use ledger::{LedgerStore, TimeLedger};
pub use registry::ProcessRegistry;
pub use selector::{ProcessSelector, TrackedProcess};
pub use tracker::TrackingLoop;
