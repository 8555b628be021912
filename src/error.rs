//! Error types for the Tork worker
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Error context and chaining
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{TaskId, TaskState};

/// Result type alias for worker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Broker errors (3xx)
    InvalidDestination = 300,
    DestinationAlreadyBound = 301,
    BrokerUnavailable = 302,
    MailboxFull = 303,

    // Dispatch errors (4xx)
    InvalidStateTransition = 400,
    UnknownMessageKind = 401,
    MalformedMessage = 402,

    // Runtime errors (5xx)
    RuntimeFailed = 500,
    TaskStartFailed = 501,
    TaskStopFailed = 502,

    // Stats and scheduling errors (6xx)
    StatsFailed = 600,
    NoWorkersAvailable = 610,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            500..=599 => 50,
            600..=699 => 60,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the worker
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Broker Errors
    // ─────────────────────────────────────────────────────────────

    /// Empty destination name
    #[error("Invalid destination: mailbox name must not be empty")]
    InvalidDestination,

    /// A receiver is already registered for the mailbox
    #[error("Destination already bound: {destination}")]
    DestinationAlreadyBound { destination: String },

    /// Broker transport has been shut down
    #[error("Broker unavailable: transport is shut down")]
    BrokerUnavailable,

    /// Mailbox reached its capacity
    #[error("Mailbox {destination} is full ({capacity} pending messages)")]
    MailboxFull { destination: String, capacity: usize },

    // ─────────────────────────────────────────────────────────────
    // Dispatch Errors
    // ─────────────────────────────────────────────────────────────

    /// Task lifecycle transition not allowed from the current state
    #[error("Task {task_id} can't move from {from} to {to}")]
    InvalidStateTransition {
        task_id: TaskId,
        from: TaskState,
        to: TaskState,
    },

    /// Message tag not recognized at the decoding boundary
    #[error("Unknown message kind: {kind}")]
    UnknownMessageKind { kind: String },

    /// Message could not be decoded
    #[error("Malformed message: {message}")]
    MalformedMessage { message: String },

    // ─────────────────────────────────────────────────────────────
    // Runtime Errors
    // ─────────────────────────────────────────────────────────────

    /// Opaque failure reported by a runtime backend
    #[error("Runtime '{runtime}' error: {message}")]
    Runtime { runtime: String, message: String },

    /// Starting a task failed
    #[error("Failed to start task {task_id}: {source}")]
    TaskStart {
        task_id: TaskId,
        #[source]
        source: Box<Error>,
    },

    /// Stopping a task failed
    #[error("Failed to stop task {task_id}: {source}")]
    TaskStop {
        task_id: TaskId,
        #[source]
        source: Box<Error>,
    },

    // ─────────────────────────────────────────────────────────────
    // Stats & Scheduling Errors
    // ─────────────────────────────────────────────────────────────

    /// Host stats could not be sampled
    #[error("Stats error: {0}")]
    Stats(String),

    /// Scheduler has no mailbox to deliver to
    #[error("No workers available to schedule task {task_id}")]
    NoWorkersAvailable { task_id: TaskId },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::InvalidDestination => ErrorCode::InvalidDestination,
            Error::DestinationAlreadyBound { .. } => ErrorCode::DestinationAlreadyBound,
            Error::BrokerUnavailable => ErrorCode::BrokerUnavailable,
            Error::MailboxFull { .. } => ErrorCode::MailboxFull,

            Error::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
            Error::UnknownMessageKind { .. } => ErrorCode::UnknownMessageKind,
            Error::MalformedMessage { .. } => ErrorCode::MalformedMessage,

            Error::Runtime { .. } => ErrorCode::RuntimeFailed,
            Error::TaskStart { .. } => ErrorCode::TaskStartFailed,
            Error::TaskStop { .. } => ErrorCode::TaskStopFailed,

            Error::Stats(_) => ErrorCode::StatsFailed,
            Error::NoWorkersAvailable { .. } => ErrorCode::NoWorkersAvailable,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::MailboxFull { .. }
            | Error::Runtime { .. }
            | Error::Stats(_)
            | Error::Io(_)
            | Error::IoRead { .. }
            | Error::IoWrite { .. } => true,
            Error::TaskStart { source, .. } | Error::TaskStop { source, .. } => {
                source.is_retryable()
            }
            _ => false,
        }
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'tork config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'tork config validate' to see details."
            ),
            Error::ConfigValidation { .. } | Error::Config(_) => Some(
                "Review the configuration file and fix the invalid values."
            ),

            Error::DestinationAlreadyBound { .. } => Some(
                "Another receiver owns this mailbox. Give each worker a distinct name or leave 'worker.name' unset."
            ),
            Error::MailboxFull { .. } => Some(
                "The worker is not keeping up. Raise 'broker.mailbox_capacity' or add more workers."
            ),
            Error::BrokerUnavailable => Some(
                "The broker has shut down. Restart the worker process."
            ),

            Error::Runtime { .. } | Error::TaskStart { .. } | Error::TaskStop { .. } => Some(
                "Check that the container engine is installed and its daemon is running."
            ),

            Error::NoWorkersAvailable { .. } => Some(
                "Start at least one worker before submitting tasks."
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            self.code().as_str(),
            self
        );

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an opaque runtime error
    pub fn runtime(runtime: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Runtime {
            runtime: runtime.into(),
            message: message.into(),
        }
    }

    /// Create a malformed message error
    pub fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedMessage {
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
