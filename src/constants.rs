//! Global constants used throughout the codeswap codebase.
//!
//! Wire file names, the persisted-store key, and the fixed platform
//! bootstrap set are defined centrally so the update pipeline and the
//! tests agree on them.

/// File name of the update declaration document on the update server.
///
/// Fetched from `<base_url>/chcp.json`; contains the advertised version,
/// release identifier, and content base URL.
pub const UPDATE_DECLARATION_FILE: &str = "chcp.json";

/// File name of the manifest document on the content server.
///
/// Fetched from `<content_url>/chcp.manifest`; maps relative file paths
/// to content fingerprints for one release.
pub const MANIFEST_FILE: &str = "chcp.manifest";

/// Key under which the full update-state record is persisted in the
/// host's durable key-value store.
pub const CONFIG_STORE_KEY: &str = "ccs";

/// Schema version written into every persisted config record.
///
/// Bump when the persisted shape changes; readers fail closed to a
/// default config on records they cannot parse.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Default entry file loaded from a release folder.
pub const DEFAULT_ENTRY_FILE: &str = "index.html";

/// Default `User-Agent` header sent to the update server.
pub const DEFAULT_USER_AGENT: &str = "codeswap";

/// Name of the served content root inside the read-only application bundle.
pub const BUNDLE_WWW_DIR: &str = "www";

/// Platform bootstrap files re-copied into every release from the
/// application bundle, regardless of the manifest. These are owned by the
/// platform, not by bundle content, so they are never diffed.
pub const BOOTSTRAP_FILES: &[&str] = &["cordova.js", "cordova_plugins.js"];

/// Platform bootstrap directories re-copied recursively into every release
/// from the application bundle.
pub const BOOTSTRAP_DIRS: &[&str] = &["cordova-js-src", "plugins"];
