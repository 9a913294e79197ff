/*! The error taxonomy for the rolling-quantile engine

# About
Every fallible entry point in this crate returns [Result<T, Error>]. The three
variants mirror the taxonomy in the module-level design: a misconfigured stage
or pipeline is always caught at construction ([Error::InvalidArgument]), a
non-finite sample offered to a running filter is always caught at the feed
boundary ([Error::InvalidInput]), and a heap invariant violation ([Error::Internal])
should never actually occur — if it does, it indicates a bug in this crate, not
in the caller.
*/

use thiserror::Error as ThisError;

/// Errors surfaced by the rolling-quantile engine.
///
/// See the [module-level documentation](crate::error) for more information.
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum Error {
    /// A stage or pipeline was constructed with an illegal parameter
    /// combination. Always surfaced at construction, never while feeding.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A non-finite (NaN or infinite) value was offered to `feed`. The value
    /// is rejected; the filter's internal state is unchanged.
    #[error("invalid input: {0} is not a finite value")]
    InvalidInput(f64),

    /// A heap invariant was found violated mid-operation. Unreachable under a
    /// correct implementation; signals a bug in this crate.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}
