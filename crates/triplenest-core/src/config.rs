//! Execution configuration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What to do when a nested level fails to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Skip a nested level invocation whose query is rejected for its bound
    /// arguments, report it to the collector and continue with siblings.
    #[default]
    Lenient,
    /// Abort the run on the first execution error.
    Strict,
}

/// How pivot ordering of each level's rows is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PivotOrder {
    /// Assume rows are grouped by pivot value; only the previous value is kept.
    #[default]
    Contiguous,
    /// Remember closed pivot values of each active level and fail when one
    /// reappears. Memory grows with the number of distinct pivot values.
    Verified,
}

/// Shared flag used to stop a running execution.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Configuration for a single nested query execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionConfig {
    /// Failure policy for nested levels.
    pub failure_policy: FailurePolicy,

    /// Pivot ordering check.
    pub pivot_order: PivotOrder,

    /// Checked before every level invocation and after every row.
    pub cancellation: Option<CancellationToken>,
}

impl ExecutionConfig {
    /// Create the default (lenient, unchecked ordering) configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration that aborts on the first execution error.
    pub fn strict() -> Self {
        Self {
            failure_policy: FailurePolicy::Strict,
            ..Default::default()
        }
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the pivot ordering check.
    pub fn with_pivot_order(mut self, order: PivotOrder) -> Self {
        self.pivot_order = order;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Check if the attached token (if any) was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}
