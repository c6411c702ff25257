//! Result and error types for Esperar.

use thiserror::Error;

/// Result type for Esperar operations
pub type EsperarResult<T> = Result<T, EsperarError>;

/// Errors that can occur while resolving or synchronizing on elements.
///
/// Callers classify failures by variant, never by message text. The resolver
/// and condition engine surface these directly; only the retry executor is
/// allowed to suppress intermediate failures, and its terminal
/// [`EsperarError::RetryExhausted`] always wraps the last concrete cause.
#[derive(Debug, Error)]
pub enum EsperarError {
    /// No element matched the descriptor
    #[error("no element matched descriptor {descriptor}")]
    ElementNotFound {
        /// Diagnostic rendering of the descriptor that failed
        descriptor: String,
    },

    /// More than one element matched in strict mode with no position selector
    #[error("descriptor {descriptor} matched {count} elements in strict mode")]
    ElementAmbiguous {
        /// Number of elements matched
        count: usize,
        /// Diagnostic rendering of the descriptor that failed
        descriptor: String,
    },

    /// A parent descriptor in the chain matched more than one element
    #[error("parent descriptor {descriptor} matched {count} elements; scoping requires exactly one")]
    AmbiguousParent {
        /// Number of elements the parent matched
        count: usize,
        /// Diagnostic rendering of the parent descriptor
        descriptor: String,
    },

    /// The frame boundary selector did not resolve to a frame
    #[error("frame not found for selector {selector:?}")]
    FrameNotFound {
        /// Selector that failed to resolve to a frame
        selector: String,
    },

    /// A wait condition did not become true within its budget
    #[error("condition {condition:?} not satisfied after {elapsed_ms}ms")]
    ConditionTimeout {
        /// Name(s) of the condition(s) that timed out
        condition: String,
        /// Wall-clock time spent polling
        elapsed_ms: u64,
    },

    /// The retry executor exhausted its attempt or time budget
    #[error("retries exhausted after {attempts} attempt(s) in {elapsed_ms}ms: {source}")]
    RetryExhausted {
        /// Attempts made, including the first
        attempts: u32,
        /// Wall-clock time spent across all attempts
        elapsed_ms: u64,
        /// The last concrete error observed
        #[source]
        source: Box<EsperarError>,
    },

    /// An explicit position index exceeded the match count
    #[error("position index {index} out of range for {count} match(es)")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of elements matched
        count: usize,
    },

    /// The driver cannot serve the requested lookup strategy
    #[error("driver does not support strategy {strategy:?}")]
    UnsupportedStrategy {
        /// Name of the unsupported strategy
        strategy: String,
    },

    /// Driver-level failure (transport error, stale handle, invalidated session)
    #[error("driver error: {message}")]
    Driver {
        /// Error message from the driver
        message: String,
    },
}

impl EsperarError {
    /// True if the failure is transient enough that re-resolution may succeed.
    ///
    /// Stale handles and empty match sets fall in this bucket; structural
    /// failures (bad index, unsupported strategy, ambiguity) do not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ElementNotFound { .. } | Self::Driver { .. } | Self::ConditionTimeout { .. }
        )
    }
}
