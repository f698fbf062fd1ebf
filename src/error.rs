//! Error types for rmexport.
//!
//! Everything outside `main` reports failures through these enums; the
//! binary maps them to exit codes and the user-facing connectivity hint.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the device collaborator.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The HTTP request itself failed (device unreachable, connection
    /// reset, malformed body).
    #[error("device request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The device answered with a non-success status code.
    #[error("device returned HTTP {status} for {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// Writing the transferred representation to local disk failed.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures that end an export run.
///
/// Every variant except [`ExportError::Interrupted`] is terminal: it is
/// logged with the offending document and propagated to the binary, which
/// exits with status 1. Files written by earlier leaves are left in place.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Enumerating the device's file structure failed.
    #[error("could not reach the device: {0}")]
    Connectivity(#[from] DeviceError),

    /// A parent directory for an export target could not be created.
    #[error("failed to create directories {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// One of the two per-document transfers failed.
    #[error("failed to export '{name}' to {target}")]
    Transfer {
        name: String,
        target: PathBuf,
        #[source]
        source: DeviceError,
    },

    /// An exported file could not be stamped with the device timestamp.
    /// Unstamped files would be misclassified on every later run, so this
    /// is fatal rather than a warning.
    #[error("failed to change timestamp for exported file {path}")]
    TimestampSync {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The user asked the run to stop; the binary treats this as success.
    #[error("export cancelled")]
    Interrupted,

    /// Any other filesystem failure, such as reading an existing export's
    /// modification time.
    #[error(transparent)]
    Io(#[from] io::Error),
}
