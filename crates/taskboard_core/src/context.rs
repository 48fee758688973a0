//! Explicit per-request write context.
//!
//! # Responsibility
//! - Carry the acting user and request correlation id into every write.
//! - Carry a cooperative cancellation signal with an optional deadline.
//!
//! # Invariants
//! - No ambient/global "current user"; callers pass `WriteContext` explicitly.
//! - Once cancelled (flag or elapsed deadline) a signal never resets.

use crate::config::CoreConfig;
use crate::model::member::UserId;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a write stopped before committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancelled {
    /// Caller flipped the shared flag.
    Requested,
    /// The deadline elapsed.
    DeadlineExceeded,
}

impl Display for Cancelled {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => write!(f, "write cancelled by caller"),
            Self::DeadlineExceeded => write!(f, "write deadline exceeded"),
        }
    }
}

impl Error for Cancelled {}

/// Cloneable cancellation handle shared between caller and write path.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationSignal {
    /// Signal that only cancels when `cancel()` is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that additionally expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Requests cancellation for every clone of this signal.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.check().is_err()
    }

    /// Returns `Err` once the flag is set or the deadline has passed.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.flag.load(Ordering::Acquire) {
            return Err(Cancelled::Requested);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Cancelled::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

/// Request-scoped inputs shared by every write operation.
#[derive(Debug, Clone)]
pub struct WriteContext {
    /// Authenticated user performing the write.
    pub actor_id: UserId,
    /// Optional correlation id echoed in logs.
    pub request_id: Option<String>,
    pub cancel: CancellationSignal,
}

impl WriteContext {
    /// Context without deadline or correlation id.
    pub fn new(actor_id: UserId) -> Self {
        Self {
            actor_id,
            request_id: None,
            cancel: CancellationSignal::new(),
        }
    }

    /// Context whose deadline follows `write_timeout_ms` from config.
    pub fn from_config(actor_id: UserId, config: &CoreConfig) -> Self {
        let cancel = match config.write_timeout_ms {
            Some(ms) => CancellationSignal::with_timeout(Duration::from_millis(ms)),
            None => CancellationSignal::new(),
        };
        Self {
            actor_id,
            request_id: None,
            cancel,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Correlation id for log lines, `-` when absent.
    pub fn request_label(&self) -> &str {
        self.request_id.as_deref().unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::{CancellationSignal, Cancelled};
    use std::time::Duration;

    #[test]
    fn cancel_is_visible_through_clones() {
        let signal = CancellationSignal::new();
        let clone = signal.clone();
        assert!(clone.check().is_ok());
        signal.cancel();
        assert_eq!(clone.check(), Err(Cancelled::Requested));
    }

    #[test]
    fn zero_timeout_is_already_expired() {
        let signal = CancellationSignal::with_timeout(Duration::ZERO);
        assert_eq!(signal.check(), Err(Cancelled::DeadlineExceeded));
    }
}
