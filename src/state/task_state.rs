/// Task state definitions for tracking crawl progress
///
/// This module defines every state a crawl task can be in and the legal
/// transitions between them.
use serde::Serialize;
use std::fmt;

/// Why a task ended without being fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The URL was already visited during this run
    Duplicate,

    /// The task is deeper than the configured maximum depth
    DepthExceeded,

    /// robots.txt disallows the URL for our user agent
    Disallowed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::DepthExceeded => "depth_exceeded",
            Self::Disallowed => "disallowed",
        }
    }
}

/// Represents the current state of a task in the crawl process
///
/// ```text
/// Discovered -> Enqueued -> Dequeued -> {Completed, Failed, Skipped(_)}
/// Discovered -> Skipped(_)              (rejected by the frontier)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    // ===== Active States =====
    /// Task was created from a seed or an extracted link
    Discovered,

    /// Task is waiting in the frontier queue
    Enqueued,

    /// Task was handed to a worker
    Dequeued,

    // ===== Terminal States =====
    /// Fetch and extraction succeeded
    Completed,

    /// Fetch or extraction failed
    Failed,

    /// Task was dropped without a fetch
    Skipped(SkipReason),
}

impl TaskState {
    /// Returns true if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped(_))
    }

    /// Returns true if this is an active state (task may still be processed)
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the transition `self -> next` is part of the lifecycle
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (Self::Discovered, Self::Enqueued)
                | (Self::Discovered, Self::Skipped(_))
                | (Self::Enqueued, Self::Dequeued)
                | (Self::Dequeued, Self::Completed)
                | (Self::Dequeued, Self::Failed)
                | (Self::Dequeued, Self::Skipped(_))
        )
    }

    /// Short label used in logs and output records
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Enqueued => "enqueued",
            Self::Dequeued => "dequeued",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped(reason) => reason.as_str(),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped(reason) => write!(f, "skipped({})", reason.as_str()),
            other => write!(f, "{}", other.as_str()),
        }
    }
}
