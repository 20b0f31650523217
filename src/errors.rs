//! Error types for replica-set bootstrap.
//!
//! Every failure coming back from an administrative call is classified
//! exactly once, where the call is made, into an [`AdminError`] carrying an
//! [`ErrorKind`].  Everything downstream matches on the kind instead of
//! re-inspecting codes.

use thiserror::Error;

/// Server code returned by `replSetGetStatus` before `replSetInitiate`.
pub const NOT_YET_INITIALIZED_CODE: i32 = 94;

/// Server code name paired with [`NOT_YET_INITIALIZED_CODE`].
pub const NOT_YET_INITIALIZED_NAME: &str = "NotYetInitialized";

/// Server codes raised while a node is unreachable, shutting down, or in
/// the middle of an election.
const TRANSIENT_CODES: &[i32] = &[
    6,     // HostUnreachable
    7,     // HostNotFound
    89,    // NetworkTimeout
    91,    // ShutdownInProgress
    189,   // PrimarySteppedDown
    9001,  // SocketException
    10107, // NotWritablePrimary
    11600, // InterruptedAtShutdown
    11602, // InterruptedDueToReplStateChange
    13435, // NotPrimaryNoSecondaryOk
    13436, // NotPrimaryOrSecondary
];

/// Process exit code for fatal failures.
pub const EXIT_FATAL: u8 = 1;

/// Process exit code for failures a restart is expected to clear (`EX_TEMPFAIL`).
pub const EXIT_TEMPFAIL: u8 = 75;

/// Process exit code for configuration errors (`EX_CONFIG`).
pub const EXIT_CONFIG: u8 = 78;

/// Classification of an administrative-call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The replica set has not been initiated yet. Expected on a fresh cluster.
    NotYetInitialized,
    /// Network trouble, shutdown, or an election in progress.
    Transient,
    /// Anything else.
    Fatal,
}

impl ErrorKind {
    /// Classify a server command failure by its code / code name pair.
    pub fn from_code(code: Option<i32>, code_name: Option<&str>) -> Self {
        if code == Some(NOT_YET_INITIALIZED_CODE) || code_name == Some(NOT_YET_INITIALIZED_NAME) {
            return ErrorKind::NotYetInitialized;
        }
        match code {
            Some(c) if TRANSIENT_CODES.contains(&c) => ErrorKind::Transient,
            _ => ErrorKind::Fatal,
        }
    }
}

/// A classified failure from the datastore's administrative surface.
///
/// Displays as the underlying server message, unmodified.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct AdminError {
    pub kind: ErrorKind,
    pub code: Option<i32>,
    pub code_name: Option<String>,
    pub message: String,
}

impl AdminError {
    /// Build an error from a server command failure, classifying it.
    pub fn command(code: i32, code_name: impl Into<String>, message: impl Into<String>) -> Self {
        let code_name = code_name.into();
        Self {
            kind: ErrorKind::from_code(Some(code), Some(&code_name)),
            code: Some(code),
            code_name: Some(code_name),
            message: message.into(),
        }
    }

    /// The canonical "replica set not yet initiated" failure.
    pub fn not_yet_initialized() -> Self {
        Self::command(
            NOT_YET_INITIALIZED_CODE,
            NOT_YET_INITIALIZED_NAME,
            "no replset config has been received",
        )
    }

    /// A connectivity failure with no server code attached.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            code: None,
            code_name: None,
            message: message.into(),
        }
    }

    /// A failure with no server code attached that must abort the run.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Fatal,
            code: None,
            code_name: None,
            message: message.into(),
        }
    }
}

impl From<mongodb::error::Error> for AdminError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind as DriverKind;

        match err.kind.as_ref() {
            DriverKind::Command(cmd) => {
                AdminError::command(cmd.code, cmd.code_name.clone(), cmd.message.clone())
            }
            DriverKind::Io(_)
            | DriverKind::ServerSelection { .. }
            | DriverKind::ConnectionPoolCleared { .. } => AdminError::transient(err.to_string()),
            _ => AdminError::fatal(err.to_string()),
        }
    }
}

/// Failure that aborts a bootstrap run.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// An administrative call failed (status, initiate, add-member, user-create).
    #[error("{0}")]
    Admin(#[from] AdminError),

    /// The retry policy ran out of attempts before a primary appeared.
    #[error("no primary after {attempts} attempts")]
    PrimaryWaitExhausted { attempts: u32 },
}

impl BootstrapError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            BootstrapError::Admin(e) if e.kind == ErrorKind::Transient => EXIT_TEMPFAIL,
            BootstrapError::Admin(_) => EXIT_FATAL,
            BootstrapError::PrimaryWaitExhausted { .. } => EXIT_TEMPFAIL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_yet_initialized_by_code_or_name() {
        assert_eq!(ErrorKind::from_code(Some(94), None), ErrorKind::NotYetInitialized);
        assert_eq!(
            ErrorKind::from_code(None, Some("NotYetInitialized")),
            ErrorKind::NotYetInitialized
        );
        assert_eq!(
            ErrorKind::from_code(Some(94), Some("NotYetInitialized")),
            ErrorKind::NotYetInitialized
        );
    }

    #[test]
    fn test_election_codes_are_transient() {
        assert_eq!(ErrorKind::from_code(Some(189), None), ErrorKind::Transient);
        assert_eq!(ErrorKind::from_code(Some(10107), None), ErrorKind::Transient);
        assert_eq!(ErrorKind::from_code(Some(11602), None), ErrorKind::Transient);
    }

    #[test]
    fn test_other_codes_are_fatal() {
        assert_eq!(ErrorKind::from_code(Some(13), Some("Unauthorized")), ErrorKind::Fatal);
        assert_eq!(ErrorKind::from_code(Some(23), Some("AlreadyInitialized")), ErrorKind::Fatal);
        assert_eq!(ErrorKind::from_code(None, None), ErrorKind::Fatal);
    }

    #[test]
    fn test_message_is_unmodified() {
        let err = AdminError::command(13, "Unauthorized", "command replSetGetStatus requires authentication");
        assert_eq!(err.to_string(), "command replSetGetStatus requires authentication");
        let err = BootstrapError::from(err);
        assert_eq!(err.to_string(), "command replSetGetStatus requires authentication");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BootstrapError::from(AdminError::fatal("boom")).exit_code(), EXIT_FATAL);
        assert_eq!(
            BootstrapError::from(AdminError::transient("connection refused")).exit_code(),
            EXIT_TEMPFAIL
        );
        assert_eq!(
            BootstrapError::PrimaryWaitExhausted { attempts: 3 }.exit_code(),
            EXIT_TEMPFAIL
        );
    }
}
