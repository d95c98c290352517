//! Shared helpers for the end-to-end tests: an isolated on-disk layout and
//! in-memory host collaborators.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use codeswap::host::{Headers, Runtime, Transport};
use codeswap::{CodeSwapError, Result, StorageLayout, Updater};
use tempfile::TempDir;

pub const BASE_URL: &str = "https://updates.example.com/app";
pub const CONTENT_BASE: &str = "https://cdn.example.com/app";

/// Transport serving canned documents and recording every file download.
#[derive(Default)]
pub struct FakeTransport {
    documents: Mutex<HashMap<String, String>>,
    downloads: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn put_document(&self, url: &str, body: impl Into<String>) {
        self.documents.lock().unwrap().insert(url.to_string(), body.into());
    }

    /// Advertise `release` with a manifest, in one step.
    pub fn serve_release(&self, version: &str, release: &str, manifest: serde_json::Value) {
        self.put_document(
            &format!("{BASE_URL}/chcp.json"),
            serde_json::json!({
                "version": version,
                "release": release,
                "content_url": CONTENT_BASE,
            })
            .to_string(),
        );
        self.put_document(&format!("{CONTENT_BASE}/{release}/chcp.manifest"), manifest.to_string());
    }

    pub fn downloaded(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_text(&self, url: &str, _headers: &Headers) -> Result<String> {
        self.documents.lock().unwrap().get(url).cloned().ok_or_else(|| {
            CodeSwapError::TransportError {
                url: url.to_string(),
                reason: "404".to_string(),
            }
        })
    }

    async fn download(&self, url: &str, _headers: &Headers, dest: &Path) -> Result<()> {
        self.downloads.lock().unwrap().push(url.to_string());
        tokio::fs::write(dest, format!("payload:{url}")).await.map_err(|err| {
            CodeSwapError::DownloadError {
                url: url.to_string(),
                reason: err.to_string(),
            }
        })
    }
}

/// Runtime recording navigations and reloads instead of performing them.
#[derive(Default)]
pub struct RecordingRuntime {
    pub navigations: Mutex<Vec<String>>,
    pub reloads: Mutex<usize>,
}

impl Runtime for RecordingRuntime {
    fn current_location(&self) -> Option<String> {
        self.navigations.lock().unwrap().last().cloned()
    }

    fn navigate(&self, entry_point: &str) -> Result<()> {
        self.navigations.lock().unwrap().push(entry_point.to_string());
        Ok(())
    }

    fn reload(&self) -> Result<()> {
        *self.reloads.lock().unwrap() += 1;
        Ok(())
    }
}

/// One isolated on-disk environment shared by all updater instances a test
/// creates (so "restarts" see the same persisted state).
pub struct TestEnv {
    pub tmp: TempDir,
    pub layout: StorageLayout,
    pub transport: Arc<FakeTransport>,
    pub runtime: Arc<RecordingRuntime>,
}

impl TestEnv {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let tmp = TempDir::new().unwrap();
        let bundle_dir = tmp.path().join("bundle");
        let www = bundle_dir.join("www");
        for dir in ["cordova-js-src", "plugins"] {
            std::fs::create_dir_all(www.join(dir)).unwrap();
            std::fs::write(www.join(dir).join("init.js"), format!("// {dir}")).unwrap();
        }
        for file in ["cordova.js", "cordova_plugins.js", "index.html"] {
            std::fs::write(www.join(file), format!("// bundled {file}")).unwrap();
        }

        let layout = StorageLayout::new(tmp.path().join("data"), bundle_dir);
        Self {
            tmp,
            layout,
            transport: Arc::new(FakeTransport::default()),
            runtime: Arc::new(RecordingRuntime::default()),
        }
    }

    /// Build an updater over this environment; call again to simulate an
    /// app restart against the same persisted state.
    pub fn updater(&self) -> Updater {
        Updater::builder(self.layout.clone())
            .transport(self.transport.clone())
            .runtime(self.runtime.clone())
            .build()
    }
}
