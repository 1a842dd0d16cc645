//! Connection-level failure detection.
//!
//! # Responsibilities
//! - Split failures into connection-level (blacklist + retry) and everything else
//! - Keep the original error intact for diagnostics
//!
//! # Design Decisions
//! - Placeholder connect failures are always connection-level
//! - io::Error kinds that mean "the peer is gone" are connection-level
//! - Message matching is case-insensitive and walks the whole `source()` chain
//! - Query/semantic errors never affect health state

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;

use crate::error::{BoxError, ConnectFailure, RouteError};

/// Messages drivers commonly report when the server is unreachable.
pub const DEFAULT_MATCHERS: &[&str] = &[
    "connection refused",
    "connection reset",
    "broken pipe",
    "timed out",
    "server closed the connection",
    "could not connect",
    "gone away",
    "lost connection",
    "no route to host",
];

/// Classification outcome. Both arms carry the original error.
#[derive(Debug)]
pub enum Verdict {
    /// Not a connection problem; surface unchanged.
    PassThrough(BoxError),
    /// The connection is unusable; blacklist and try elsewhere.
    ConnectionFailure(BoxError),
}

impl Verdict {
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Verdict::ConnectionFailure(_))
    }

    pub fn into_inner(self) -> BoxError {
        match self {
            Verdict::PassThrough(e) | Verdict::ConnectionFailure(e) => e,
        }
    }
}

type Predicate = Arc<dyn Fn(&(dyn StdError + 'static)) -> bool + Send + Sync>;

/// Decides whether a failure warrants blacklisting.
#[derive(Clone)]
pub struct ErrorClassifier {
    matchers: Vec<String>,
    predicate: Option<Predicate>,
}

impl ErrorClassifier {
    /// Classifier with the default matchers.
    pub fn new() -> Self {
        Self::with_matchers(DEFAULT_MATCHERS.iter().copied())
    }

    /// Classifier with exactly these matchers.
    pub fn with_matchers<I, S>(matchers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            matchers: matchers.into_iter().map(|m| m.as_ref().to_lowercase()).collect(),
            predicate: None,
        }
    }

    /// Default matchers plus the configured extras.
    pub fn from_config(extra: &[String]) -> Self {
        let mut classifier = Self::new();
        classifier.add_matchers(extra);
        classifier
    }

    pub fn add_matchers<I, S>(&mut self, matchers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.matchers.extend(
            matchers
                .into_iter()
                .map(|m| m.as_ref().to_lowercase())
                .filter(|m| !m.is_empty()),
        );
    }

    /// Install an extra predicate; an error is connection-level if it matches.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn classify(&self, error: BoxError) -> Verdict {
        if self.is_connection_error(&*error) {
            Verdict::ConnectionFailure(error)
        } else {
            Verdict::PassThrough(error)
        }
    }

    fn is_connection_error(&self, error: &(dyn StdError + 'static)) -> bool {
        let mut current = Some(error);
        while let Some(err) = current {
            // Errors coming back from a reentrant dispatch are already wrapped.
            match err.downcast_ref::<RouteError>() {
                Some(RouteError::Connection { .. }) => return true,
                Some(RouteError::Query(inner)) => {
                    current = Some(&**inner);
                    continue;
                }
                _ => {}
            }
            if self.matches_one(err) {
                return true;
            }
            current = err.source();
        }
        false
    }

    fn matches_one(&self, err: &(dyn StdError + 'static)) -> bool {
        if err.is::<ConnectFailure>() {
            return true;
        }
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if is_connection_kind(io_err.kind()) {
                return true;
            }
        }
        if let Some(predicate) = &self.predicate {
            if predicate(err) {
                return true;
            }
        }
        let message = err.to_string().to_lowercase();
        self.matchers.iter().any(|m| message.contains(m.as_str()))
    }
}

fn is_connection_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut
            | io::ErrorKind::UnexpectedEof
    )
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorClassifier")
            .field("matchers", &self.matchers)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}
