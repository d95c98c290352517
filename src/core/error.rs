//! Error handling for codeswap.
//!
//! The error system is a single strongly-typed enum, [`CodeSwapError`],
//! covering the whole update lifecycle. Callers are expected to match on
//! variants: [`CodeSwapError::NoUpdateAvailable`] in particular is an
//! ordinary control-flow outcome of a successful check, not a fault.
//!
//! # Error categories
//!
//! - **Lifecycle**: [`NotInitialized`], [`AlreadyInProgress`],
//!   [`NothingPending`]
//! - **Server documents**: [`MalformedDeclaration`], [`NoUpdateAvailable`],
//!   [`TransportError`]
//! - **File sync**: [`CopyError`], [`DownloadError`]
//! - **Persistence**: [`StoreError`], [`IoError`], [`JsonError`]
//!
//! Failed phases always release their mutual-exclusion guard before the
//! error reaches the caller, so a failure never locks out a retry.
//!
//! [`NotInitialized`]: CodeSwapError::NotInitialized
//! [`AlreadyInProgress`]: CodeSwapError::AlreadyInProgress
//! [`NothingPending`]: CodeSwapError::NothingPending
//! [`MalformedDeclaration`]: CodeSwapError::MalformedDeclaration
//! [`NoUpdateAvailable`]: CodeSwapError::NoUpdateAvailable
//! [`TransportError`]: CodeSwapError::TransportError
//! [`CopyError`]: CodeSwapError::CopyError
//! [`DownloadError`]: CodeSwapError::DownloadError
//! [`StoreError`]: CodeSwapError::StoreError
//! [`IoError`]: CodeSwapError::IoError
//! [`JsonError`]: CodeSwapError::JsonError

use thiserror::Error;

use crate::update::Phase;

/// Convenience result alias used throughout the crate.
pub type Result<T, E = CodeSwapError> = std::result::Result<T, E>;

/// The error type for all codeswap operations.
#[derive(Error, Debug)]
pub enum CodeSwapError {
    /// A lifecycle operation was invoked before `initialize()`.
    ///
    /// `initialize()` loads the persisted update-state record and must be
    /// the first thing the application runs.
    #[error("initialize() needs to be run before looking for updates")]
    NotInitialized,

    /// A lifecycle phase was started while another phase is running.
    ///
    /// The three phases (check, download, install) are serialized against
    /// each other through a single guard; retry once the running phase
    /// settles.
    #[error("{phase} is already in progress")]
    AlreadyInProgress {
        /// The phase currently holding the guard.
        phase: Phase,
    },

    /// The update declaration fetched from the server is missing required
    /// fields (version, release, or content URL).
    #[error("malformed update declaration: {reason}")]
    MalformedDeclaration {
        /// Which required piece of the declaration was absent.
        reason: String,
    },

    /// The server's declared version and release identically match the
    /// currently installed bundle; there is nothing to fetch.
    #[error("no update available")]
    NoUpdateAvailable,

    /// A network fetch failed, or a fetched document was not parsable JSON.
    #[error("transport error fetching {url}: {reason}")]
    TransportError {
        /// URL of the failed request.
        url: String,
        /// Underlying failure description.
        reason: String,
    },

    /// Downloading a bundle file to local storage failed.
    ///
    /// Raised after the copy-fallback is already engaged, so this is fatal
    /// for the download phase.
    #[error("failed to download {url}: {reason}")]
    DownloadError {
        /// URL of the file that failed to download.
        url: String,
        /// Underlying failure description.
        reason: String,
    },

    /// Copying a file between local release folders failed.
    ///
    /// Inside the sync executor's copy phase this triggers the
    /// download-everything fallback rather than surfacing to the caller.
    #[error("failed to copy {path}: {reason}")]
    CopyError {
        /// Path of the file that failed to copy.
        path: String,
        /// Underlying failure description.
        reason: String,
    },

    /// `install()` was called but no downloaded update is awaiting
    /// installation.
    #[error("tried to install update, but no updates have been previously downloaded")]
    NothingPending,

    /// The durable key-value store failed to read or write a record.
    #[error("persisted store error for key '{key}': {reason}")]
    StoreError {
        /// Store key being accessed.
        key: String,
        /// Underlying failure description.
        reason: String,
    },

    /// IO error from the filesystem collaborator.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error while persisting state.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
