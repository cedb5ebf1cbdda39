//! State module for tracking crawl progress
//!
//! This module provides state management for tasks and hosts during a crawl run.
//!
//! # Components
//!
//! - `TaskState`: Lifecycle of an individual crawl task (discovered, enqueued, dequeued, terminal)
//! - `SkipReason`: Why a task was skipped rather than fetched
//! - `HostState`: Per-host state for rate limiting and request counting

mod host_state;
mod task_state;

// Re-export main types
pub use host_state::HostState;
pub use task_state::{SkipReason, TaskState};
