//! Entry-point navigation collaborator.
//!
//! After promotion the host must start loading the new release's entry
//! point. How that happens (webview navigation, iframe swap, full reload)
//! is entirely host-owned, so the engine only talks to this trait.

use tracing::info;

use crate::core::Result;
use crate::update::DebugOptions;

/// Host navigation and startup hooks.
pub trait Runtime: Send + Sync {
    /// Location the host is currently serving, if it knows one. Compared
    /// against the persisted entry point to decide whether a redirect is
    /// needed.
    fn current_location(&self) -> Option<String>;

    /// Navigate the host to `entry_point`.
    fn navigate(&self, entry_point: &str) -> Result<()>;

    /// Force a full reload of the current location. Used in debug mode so
    /// attached debugger state (breakpoints) survives the swap.
    fn reload(&self) -> Result<()>;

    /// Called once, on the first `initialize()`, to let the host wire up
    /// its debug-mode live-reload service.
    fn negotiate_debug_start(&self, _debug: &DebugOptions) {}
}

/// [`Runtime`] for hosts without a navigable surface: every action is
/// recorded in the log and otherwise a no-op.
#[derive(Debug, Default, Clone)]
pub struct HeadlessRuntime;

impl Runtime for HeadlessRuntime {
    fn current_location(&self) -> Option<String> {
        None
    }

    fn navigate(&self, entry_point: &str) -> Result<()> {
        info!(entry_point, "headless runtime: navigation requested");
        Ok(())
    }

    fn reload(&self) -> Result<()> {
        info!("headless runtime: reload requested");
        Ok(())
    }
}
