//! The update lifecycle engine.
//!
//! [`Updater`] owns the three-phase state machine:
//!
//! ```text
//! look_for_updates ──► PendingDownload ──► download ──► PendingInstall ──► install
//!      (check)             │                (sync)           │            (promote)
//!                          └ update_info()                   └ persisted as
//!                            for introspection                 PendingInstallation
//! ```
//!
//! Each phase hands the caller a value bound to the checked/downloaded
//! update, so the next phase cannot be invoked with stale or foreign data.
//! A download that completed before a crash leaves a `PendingInstallation`
//! in the persisted config; [`Updater::install_pending`] completes it after
//! restart.
//!
//! Phases are serialized through a single [`Phase`] guard: while one phase
//! runs, starting any phase fails with `AlreadyInProgress`. The guard is
//! released on success and failure alike, so a failed phase never locks out
//! a retry.

pub mod check;

mod backup;
mod sync;


use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::store::{ConfigStore, FileKeyValueStore, KeyValueStore};
use crate::config::{CcsConfig, PendingInstallation};
use crate::constants::{
    BUNDLE_WWW_DIR, DEFAULT_ENTRY_FILE, DEFAULT_USER_AGENT, UPDATE_DECLARATION_FILE,
};
use crate::core::{CodeSwapError, Result};
use crate::host::{FileOps, Headers, HeadlessRuntime, HttpTransport, LocalFileOps, Runtime, Transport};
use crate::manifest::{self, Manifest};
use crate::update::check::UpdateDeclaration;
use crate::update::sync::FileSync;
use crate::utils::url_join;

/// The lifecycle phase currently holding the mutual-exclusion guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No phase is running.
    Idle,
    /// A check for updates is running.
    Checking,
    /// A download is running.
    Downloading,
    /// An installation is running.
    Installing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Phase::Idle => "no phase",
            Phase::Checking => "a check for updates",
            Phase::Downloading => "a download",
            Phase::Installing => "an installation",
        };
        f.write_str(text)
    }
}

/// Immutable snapshot of one advertised update, carried through the
/// download phase. The downloading task operates on its own clone so the
/// live config is never aliased across an await point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateInfo {
    /// Advertised version identifier.
    pub version: String,
    /// Advertised release identifier; names the release folder locally and
    /// on the content server.
    pub release: String,
    /// Resolved base URL the release's manifest and files are fetched from.
    pub content_url: String,
    /// The server manifest, populated during the download phase.
    pub manifest: Option<Manifest>,
}

/// Debug-mode behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugOptions {
    /// Keep obsolete backups on disk and reload in place after install so
    /// attached debugger state survives the swap.
    pub preserve_breakpoints: bool,
}

/// Per-instance options, fixed at the first `initialize()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceOptions {
    /// How many prior bundles to retain for rollback. Clamped to ≥ 1.
    pub backup_count: usize,
    /// Debug-mode switches.
    pub debug: DebugOptions,
    /// The host embeds releases in an iframe: `initialize()` returns the
    /// entry point to the caller instead of navigating to it.
    pub iframe: bool,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            backup_count: 1,
            debug: DebugOptions::default(),
            iframe: false,
        }
    }
}

/// Per-request options for one check/download/install pass. Persisted
/// inside [`PendingInstallation`] so a resumed install uses the options
/// the download was started with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOptions {
    /// Headers passed through to the transport on every request.
    #[serde(default)]
    pub headers: Headers,
    /// Entry file loaded from the release folder after promotion.
    #[serde(default = "default_entry_file")]
    pub entry_file: String,
}

fn default_entry_file() -> String {
    DEFAULT_ENTRY_FILE.to_string()
}

impl Default for UpdateOptions {
    fn default() -> Self {
        let mut headers = Headers::new();
        headers.insert("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string());
        Self {
            headers,
            entry_file: default_entry_file(),
        }
    }
}

/// Where releases live and where the read-only application bundle is.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    data_dir: PathBuf,
    bundle_dir: PathBuf,
}

impl StorageLayout {
    /// `data_dir` is the host's writable data directory (release folders
    /// and the persisted config live here); `bundle_dir` is the read-only
    /// application bundle containing the factory `www/` content.
    pub fn new(data_dir: impl Into<PathBuf>, bundle_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            bundle_dir: bundle_dir.into(),
        }
    }

    /// Layout using the platform's per-user data directory for `app_name`.
    pub fn for_app(app_name: &str, bundle_dir: impl Into<PathBuf>) -> Result<Self> {
        let base = dirs::data_dir().ok_or_else(|| {
            CodeSwapError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no per-user data directory on this platform",
            ))
        })?;
        Ok(Self::new(base.join(app_name), bundle_dir))
    }

    /// The writable data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Folder one release's files are stored in.
    pub fn release_dir(&self, release: &str) -> PathBuf {
        self.data_dir.join(release)
    }

    /// The served content root inside the application bundle.
    pub fn bundle_www(&self) -> PathBuf {
        self.bundle_dir.join(BUNDLE_WWW_DIR)
    }

    /// Entry point for a release, as persisted in the config record.
    pub fn entry_point(&self, release: &str, entry_file: &str) -> String {
        self.release_dir(release).join(entry_file).to_string_lossy().into_owned()
    }
}

/// What `initialize()` (and a post-install restart) decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// No installed update overrides the bundled content; start normally.
    Ready,
    /// iframe mode: the caller loads this entry point itself.
    EntryPoint(String),
    /// The runtime was navigated to the active entry point.
    Redirected,
}

/// What happened after a successful installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Debug mode: the runtime was reloaded in place.
    Reloaded,
    /// Normal startup flow re-ran against the promoted entry point.
    Restarted(InitOutcome),
}

struct State {
    instance: Option<InstanceOptions>,
    phase: Phase,
    config: CcsConfig,
}

struct Inner {
    layout: StorageLayout,
    fs: Arc<dyn FileOps>,
    transport: Arc<dyn Transport>,
    runtime: Arc<dyn Runtime>,
    store: ConfigStore,
    state: Mutex<State>,
}

/// Builder for [`Updater`]; collaborators default to the local host
/// implementations.
pub struct UpdaterBuilder {
    layout: StorageLayout,
    fs: Option<Arc<dyn FileOps>>,
    transport: Option<Arc<dyn Transport>>,
    runtime: Option<Arc<dyn Runtime>>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl UpdaterBuilder {
    pub fn new(layout: StorageLayout) -> Self {
        Self {
            layout,
            fs: None,
            transport: None,
            runtime: None,
            store: None,
        }
    }

    /// Replace the filesystem collaborator.
    pub fn file_ops(mut self, fs: Arc<dyn FileOps>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Replace the HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the navigation runtime.
    pub fn runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Replace the durable key-value store.
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Updater {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(FileKeyValueStore::new(self.layout.data_dir())));
        Updater {
            inner: Arc::new(Inner {
                fs: self.fs.unwrap_or_else(|| Arc::new(LocalFileOps)),
                transport: self.transport.unwrap_or_else(|| Arc::new(HttpTransport::new())),
                runtime: self.runtime.unwrap_or_else(|| Arc::new(HeadlessRuntime)),
                store: ConfigStore::new(store),
                layout: self.layout,
                state: Mutex::new(State {
                    instance: None,
                    phase: Phase::Idle,
                    config: CcsConfig::default(),
                }),
            }),
        }
    }
}

/// The update state machine. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct Updater {
    inner: Arc<Inner>,
}

impl Updater {
    /// Updater over the default local-host collaborators.
    pub fn new(layout: StorageLayout) -> Self {
        Self::builder(layout).build()
    }

    pub fn builder(layout: StorageLayout) -> UpdaterBuilder {
        UpdaterBuilder::new(layout)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // The mutex is never held across an await, so a poisoned lock only
        // means a panic elsewhere; the state itself is still consistent.
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter_phase(&self, phase: Phase) -> Result<()> {
        let mut state = self.state();
        if state.instance.is_none() {
            return Err(CodeSwapError::NotInitialized);
        }
        if state.phase != Phase::Idle {
            return Err(CodeSwapError::AlreadyInProgress { phase: state.phase });
        }
        state.phase = phase;
        Ok(())
    }

    fn leave_phase(&self) {
        self.state().phase = Phase::Idle;
    }

    /// Load the persisted update state and switch to the last installed
    /// update, if any.
    ///
    /// Must be the first thing the application runs. The first call fixes
    /// the instance options and lets the runtime wire its debug startup;
    /// every call re-applies entry-point redirection: when the persisted
    /// config names an active entry point, the runtime is navigated there
    /// (or, in iframe mode, the entry point is handed back to the caller).
    pub async fn initialize(&self, options: InstanceOptions) -> Result<InitOutcome> {
        let first_call = self.state().instance.is_none();
        if first_call {
            let config = self.inner.store.load().await?;
            let mut state = self.state();
            if state.instance.is_none() {
                let mut options = options;
                options.backup_count = options.backup_count.max(1);
                self.inner.runtime.negotiate_debug_start(&options.debug);
                debug!(?options, "updater initialized");
                state.config = config;
                state.instance = Some(options);
            }
        }
        self.startup()
    }

    /// The entry-point redirection step shared by `initialize()` and the
    /// post-install restart.
    fn startup(&self) -> Result<InitOutcome> {
        let (entry_point, iframe) = {
            let state = self.state();
            let options = state.instance.as_ref().ok_or(CodeSwapError::NotInitialized)?;
            (state.config.entry_point.clone(), options.iframe)
        };
        let Some(entry_point) = entry_point else {
            return Ok(InitOutcome::Ready);
        };
        if iframe {
            return Ok(InitOutcome::EntryPoint(entry_point));
        }
        if self.inner.runtime.current_location().as_deref() == Some(entry_point.as_str()) {
            return Ok(InitOutcome::Ready);
        }
        self.inner.runtime.navigate(&entry_point)?;
        Ok(InitOutcome::Redirected)
    }

    /// Ask the update server whether a newer bundle is available.
    ///
    /// On success resolves with a [`PendingDownload`] bound to the
    /// advertised update; inspect it via
    /// [`update_info`](PendingDownload::update_info) before committing to
    /// the download. Fails with `NoUpdateAvailable` when the server
    /// advertises the installed bundle, and with `AlreadyInProgress` while
    /// any phase is running.
    pub async fn look_for_updates(
        &self,
        base_url: &str,
        options: UpdateOptions,
    ) -> Result<PendingDownload> {
        self.enter_phase(Phase::Checking)?;
        let result = self.check_inner(base_url, &options).await;
        self.leave_phase();
        let update_info = result?;
        info!(
            version = %update_info.version,
            release = %update_info.release,
            "update available"
        );
        Ok(PendingDownload {
            updater: self.clone(),
            update_info,
            options,
        })
    }

    async fn check_inner(&self, base_url: &str, options: &UpdateOptions) -> Result<UpdateInfo> {
        let url = url_join(base_url, UPDATE_DECLARATION_FILE);
        let body = self.inner.transport.get_text(&url, &options.headers).await?;
        let declaration: UpdateDeclaration =
            serde_json::from_str(&body).map_err(|err| CodeSwapError::TransportError {
                url: url.clone(),
                reason: format!("unparsable update declaration: {err}"),
            })?;

        let config = self.state().config.clone();
        let mut update_info = check::compare_with_current(&config, &declaration)?;
        update_info.content_url =
            check::resolve_content_url(&update_info.content_url, &update_info.release);
        Ok(update_info)
    }

    async fn download(
        &self,
        update_info: &UpdateInfo,
        options: &UpdateOptions,
    ) -> Result<PendingInstall> {
        self.enter_phase(Phase::Downloading)?;
        // Work on a clone so nothing the download mutates aliases the live
        // config until the commit point.
        let result = self.download_inner(update_info.clone(), options).await;
        match result {
            Ok(update_info) => {
                self.leave_phase();
                Ok(PendingInstall {
                    updater: self.clone(),
                    update_info,
                    options: options.clone(),
                })
            }
            Err(err) => {
                // A failed download must never leave a resumable marker for
                // an incomplete bundle.
                let snapshot = {
                    let mut state = self.state();
                    state.config.pending_installation = None;
                    state.config.clone()
                };
                if let Err(save_err) = self.inner.store.save(&snapshot).await {
                    warn!(error = %save_err, "failed to persist cleared pending installation");
                }
                self.leave_phase();
                Err(err)
            }
        }
    }

    async fn download_inner(
        &self,
        mut update_info: UpdateInfo,
        options: &UpdateOptions,
    ) -> Result<UpdateInfo> {
        let manifest_url = sync::manifest_url(&update_info);
        let body = self.inner.transport.get_text(&manifest_url, &options.headers).await?;
        let server_manifest: Manifest =
            serde_json::from_str(&body).map_err(|err| CodeSwapError::TransportError {
                url: manifest_url,
                reason: format!("unparsable manifest: {err}"),
            })?;
        update_info.manifest = Some(server_manifest.clone());

        let (local_manifest, source_release) = {
            let state = self.state();
            (state.config.manifest.clone(), state.config.release.clone())
        };
        let plan = manifest::diff(local_manifest.as_ref(), &server_manifest);
        debug!(
            copies = plan.files_to_copy.len(),
            downloads = plan.files_to_download.len(),
            release = %update_info.release,
            "computed sync plan"
        );

        FileSync::new(self.inner.fs.as_ref(), self.inner.transport.as_ref(), &self.inner.layout)
            .apply(&plan, source_release.as_deref(), &update_info, options)
            .await?;

        // Commit point: files are fully synced, record the resumable marker.
        let snapshot = {
            let mut state = self.state();
            state.config.pending_installation = Some(PendingInstallation {
                update_info: update_info.clone(),
                options: options.clone(),
            });
            state.config.clone()
        };
        self.inner.store.save(&snapshot).await?;
        info!(release = %update_info.release, "update downloaded, awaiting install");
        Ok(update_info)
    }

    async fn install(
        &self,
        update_info: &UpdateInfo,
        options: &UpdateOptions,
    ) -> Result<InstallOutcome> {
        self.enter_phase(Phase::Installing)?;
        let result = self.install_inner(update_info, options).await;
        self.leave_phase();
        result?;

        let (preserve_breakpoints, iframe) = {
            let state = self.state();
            let instance = state.instance.as_ref().ok_or(CodeSwapError::NotInitialized)?;
            (instance.debug.preserve_breakpoints, instance.iframe)
        };
        if preserve_breakpoints && !iframe {
            self.inner.runtime.reload()?;
            Ok(InstallOutcome::Reloaded)
        } else {
            Ok(InstallOutcome::Restarted(self.startup()?))
        }
    }

    async fn install_inner(&self, update_info: &UpdateInfo, options: &UpdateOptions) -> Result<()> {
        let (snapshot, obsolete, preserve_breakpoints) = {
            let mut state = self.state();
            let instance = state.instance.as_ref().ok_or(CodeSwapError::NotInitialized)?;
            let backup_count = instance.backup_count;
            let preserve_breakpoints = instance.debug.preserve_breakpoints;

            // Promotion: from here on the config names the new release.
            state.config.promote(update_info, options, &self.inner.layout, Utc::now());
            let rotation = backup::rotate(std::mem::take(&mut state.config.backups), backup_count);
            state.config.backups = rotation.retained;
            (state.config.clone(), rotation.obsolete, preserve_breakpoints)
        };

        if preserve_breakpoints {
            debug!("debug mode, keeping obsolete backups on disk");
        } else {
            backup::delete_backups(self.inner.fs.as_ref(), &self.inner.layout, &obsolete).await?;
        }
        self.inner.store.save(&snapshot).await?;
        info!(
            version = snapshot.version.as_deref().unwrap_or_default(),
            release = snapshot.release.as_deref().unwrap_or_default(),
            "release promoted"
        );
        Ok(())
    }

    /// Complete a previously downloaded update that was never installed:
    /// the crash-recovery path.
    ///
    /// Locates the persisted [`PendingInstallation`] (surviving process
    /// restarts) and runs the install phase with the options the download
    /// was started with. Fails with `NothingPending` when no download is
    /// awaiting installation.
    pub async fn install_pending(&self) -> Result<InstallOutcome> {
        let pending = {
            let state = self.state();
            if state.instance.is_none() {
                return Err(CodeSwapError::NotInitialized);
            }
            state.config.pending_installation.clone()
        };
        let pending = pending.ok_or(CodeSwapError::NothingPending)?;
        self.install(&pending.update_info, &pending.options).await
    }

    /// Snapshot of the current persisted config, for host diagnostics.
    pub fn config(&self) -> CcsConfig {
        self.state().config.clone()
    }
}

/// A freshness-checked update, ready to download.
///
/// Returned by [`Updater::look_for_updates`]; the download operation is
/// bound to exactly this update.
pub struct PendingDownload {
    updater: Updater,
    update_info: UpdateInfo,
    options: UpdateOptions,
}

impl fmt::Debug for PendingDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingDownload")
            .field("update_info", &self.update_info)
            .field("options", &self.options)
            .finish()
    }
}

impl PendingDownload {
    /// The advertised update, for caller introspection before committing
    /// to the download.
    pub fn update_info(&self) -> &UpdateInfo {
        &self.update_info
    }

    /// Fetch the server manifest, sync the minimal file set to local
    /// storage, and persist the resumable install marker.
    ///
    /// Resolves with a [`PendingInstall`] bound to the downloaded update.
    /// Fails with `AlreadyInProgress` while another phase is running; any
    /// failure clears the persisted pending installation.
    pub async fn download(&self) -> Result<PendingInstall> {
        self.updater.download(&self.update_info, &self.options).await
    }
}

/// A fully downloaded update, ready to install.
pub struct PendingInstall {
    updater: Updater,
    update_info: UpdateInfo,
    options: UpdateOptions,
}

impl fmt::Debug for PendingInstall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingInstall")
            .field("update_info", &self.update_info)
            .field("options", &self.options)
            .finish()
    }
}

impl PendingInstall {
    /// The downloaded update, including its fetched manifest.
    pub fn update_info(&self) -> &UpdateInfo {
        &self.update_info
    }

    /// Promote the downloaded release to active, rotate backups, persist,
    /// and restart the startup flow (or reload in debug mode).
    pub async fn install(&self) -> Result<InstallOutcome> {
        self.updater.install(&self.update_info, &self.options).await
    }
}
