//! Host-environment collaborators.
//!
//! The update engine owns sequencing and state; the primitives it drives
//! (filesystem operations, HTTP transport, and entry-point navigation) are
//! supplied by the host behind the traits in this module. The default
//! implementations ([`LocalFileOps`], [`HttpTransport`],
//! [`HeadlessRuntime`]) cover ordinary desktop/server hosts; embedders with
//! their own webview plumbing swap in their own.

pub mod fs;
pub mod runtime;
pub mod transport;

pub use fs::{FileOps, LocalFileOps};
pub use runtime::{HeadlessRuntime, Runtime};
pub use transport::{Headers, HttpTransport, Transport};
