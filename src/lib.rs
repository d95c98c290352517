//! codeswap - hot code swap for Cordova-style webview applications.
//!
//! A client-side live-update manager: it checks a remote server for a newer
//! bundle of application assets, computes the minimal set of files that must
//! be fetched versus reused from prior installs, downloads them, and
//! atomically promotes the new bundle to active on next load, while
//! retaining a bounded history of prior bundles for rollback.
//!
//! # Update lifecycle
//!
//! ```text
//! 1. initialize        load persisted state, redirect to the active entry point
//! 2. look_for_updates  GET <base>/chcp.json, compare against installed bundle
//! 3. download          GET <content>/chcp.manifest, diff, copy + download files,
//!                      persist a resumable PendingInstallation
//! 4. install           promote the release, rotate backups, persist, restart
//! ```
//!
//! Each phase returns a value bound to its result ([`look_for_updates`]
//! resolves with a [`PendingDownload`], whose [`download`] resolves with a
//! [`PendingInstall`]), so a later phase can never run against data an
//! earlier phase did not produce. A process crash between download and
//! install is recovered by [`install_pending`], driven by the persisted
//! [`PendingInstallation`] marker.
//!
//! # Example
//!
//! ```rust,no_run
//! use codeswap::{InstanceOptions, StorageLayout, UpdateOptions, Updater};
//!
//! # async fn example() -> Result<(), codeswap::CodeSwapError> {
//! let layout = StorageLayout::for_app("my-app", "/opt/my-app")?;
//! let updater = Updater::new(layout);
//! updater.initialize(InstanceOptions::default()).await?;
//!
//! match updater.look_for_updates("https://updates.example.com/my-app", UpdateOptions::default()).await {
//!     Ok(pending) => {
//!         println!("update available: {}", pending.update_info().version);
//!         let install = pending.download().await?;
//!         install.install().await?;
//!     }
//!     Err(codeswap::CodeSwapError::NoUpdateAvailable) => {}
//!     Err(err) => return Err(err),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`update`] - the three-phase state machine and its public operations
//! - [`manifest`] - bundle manifests and the copy-versus-download diff
//! - [`config`] - the persisted update-state record and its store
//! - [`host`] - filesystem / transport / navigation collaborator traits
//! - [`core`] - the error taxonomy
//!
//! The engine owns sequencing, mutual exclusion, and persistence commit
//! points; all I/O primitives are behind the [`host`] traits, so embedders
//! can swap in their own webview plumbing and tests run against in-memory
//! fakes.
//!
//! [`look_for_updates`]: Updater::look_for_updates
//! [`download`]: PendingDownload::download
//! [`install_pending`]: Updater::install_pending
//! [`PendingInstallation`]: config::PendingInstallation

pub mod config;
pub mod constants;
pub mod core;
pub mod host;
pub mod manifest;
pub mod update;
pub mod utils;

pub use crate::core::{CodeSwapError, Result};
pub use crate::manifest::{Manifest, SyncPlan};
pub use crate::update::{
    DebugOptions, InitOutcome, InstallOutcome, InstanceOptions, PendingDownload, PendingInstall,
    Phase, StorageLayout, UpdateInfo, UpdateOptions, Updater,
};
