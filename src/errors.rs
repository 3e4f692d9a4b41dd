use thiserror::Error;

/// Typed error hierarchy for agentloom.
///
/// Use at module boundaries (provider calls, plan updates, delegation).
/// Internal/leaf functions can continue using `anyhow::Result`; the
/// `Internal` variant allows seamless conversion via the `?` operator.
///
/// Only a few variants are fatal to a run: `IterationLimit`, `Provider`
/// (after retries) and `Cancelled`. Everything else is rendered into an
/// error tool result inside the loop so the model can recover.
#[derive(Debug, Error)]
pub enum LoomError {
    /// A completed plan item was retroactively mutated. The old plan is
    /// retained unchanged.
    #[error("Plan integrity violation: {0}")]
    PlanIntegrity(String),

    #[error("Invalid plan state: {0}")]
    InvalidPlanState(String),

    #[error("Delegation depth {depth} exceeds the configured maximum of {max}")]
    DepthExceeded { depth: usize, max: usize },

    #[error(
        "Planning required before delegation. Create a plan with write_todos first, \
         then delegate specific subtasks once the plan exists."
    )]
    NoPlan,

    /// The run exhausted its iteration budget. `partial` carries the last
    /// assistant text produced before the budget ran out, if any.
    #[error("Iteration limit of {iterations} reached without completion")]
    IterationLimit {
        iterations: usize,
        partial: Option<String>,
    },

    #[error("Provider error: {message}")]
    Provider { message: String, retryable: bool },

    #[error("Tool error: {tool}: {message}")]
    Tool { tool: String, message: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using [`LoomError`].
pub type LoomResult<T> = std::result::Result<T, LoomError>;

impl LoomError {
    /// Whether this error is retryable (transient provider failures).
    pub fn is_retryable(&self) -> bool {
        matches!(self, LoomError::Provider { retryable: true, .. })
    }

    /// Whether the error is recoverable by the model, i.e. representable as
    /// an error tool result rather than aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LoomError::PlanIntegrity(_)
                | LoomError::InvalidPlanState(_)
                | LoomError::DepthExceeded { .. }
                | LoomError::NoPlan
                | LoomError::Tool { .. }
        )
    }
}
