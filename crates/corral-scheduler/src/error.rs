//! Evaluation error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that end an evaluation.
///
/// None of these are retried here; the worker's caller decides whether to
/// retry the whole evaluation or fail it.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("state store error: {0}")]
    Storage(#[from] corral_state::StateError),

    #[error("evaluation {eval_id} exceeded its deadline of {timeout:?}")]
    DeadlineExceeded { eval_id: String, timeout: Duration },

    #[error("evaluation {eval_id} aborted: {reason}")]
    Aborted { eval_id: String, reason: String },
}

pub type EvalResult<T> = Result<T, EvalError>;
