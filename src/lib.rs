//! Ownership lessons: an exclusive-ownership handle with pluggable
//! deleters, and the small lessons built on top of it (copy vs. move,
//! forwarding, scoped cleanup, shared conversion, finding empty pointers).

pub mod config;
pub mod dataset;
pub mod deleter;
pub mod error;
pub mod forwarding;
pub mod gadget;
pub mod guard;
pub mod handle;
pub mod lessons;
pub mod vacancy;

pub use config::RunnerConfig;
pub use deleter::{CountingDeleter, DefaultDelete, Deleter};
pub use error::{HandleError, Result};
pub use handle::ExclusiveHandle;
pub use lessons::{catalog, run_all, run_lesson, Lesson, Transcript};
pub use vacancy::{find_empty, Vacant};
