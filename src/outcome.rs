//! Explicit results for optional collaborators.
//!
//! A collaborator (model client, browser, search backend) is resolved once
//! into a [`Capability`]; every call to it yields a [`CallOutcome`]. Callers
//! branch on these instead of catching failures.

/// A collaborator resolved at construction time.
#[derive(Debug, Clone)]
pub enum Capability<T> {
    Available(T),
    /// Not configured or failed to construct (e.g. missing credentials).
    Unavailable(String),
}

impl<T> Capability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }
}

/// Result of one call to a collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome<T> {
    /// The collaborator cannot serve this call at all.
    Unavailable(String),
    /// Transient failures exhausted the retry bound.
    TransientError { attempts: u32, message: String },
    Success(T),
}

impl<T> CallOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallOutcome<U> {
        match self {
            CallOutcome::Success(value) => CallOutcome::Success(f(value)),
            CallOutcome::Unavailable(reason) => CallOutcome::Unavailable(reason),
            CallOutcome::TransientError { attempts, message } => {
                CallOutcome::TransientError { attempts, message }
            }
        }
    }

    pub fn success(self) -> Option<T> {
        match self {
            CallOutcome::Success(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> std::fmt::Display for CallOutcome<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallOutcome::Success(_) => write!(f, "success"),
            CallOutcome::Unavailable(reason) => write!(f, "unavailable: {}", reason),
            CallOutcome::TransientError { attempts, message } => {
                write!(f, "failed after {} attempts: {}", attempts, message)
            }
        }
    }
}
