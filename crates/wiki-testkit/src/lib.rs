//! Wiki Testing Infrastructure
//!
//! Mesh doubles, identity and wiki fixtures, and tracing setup shared by the
//! workspace's tests.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! wiki-testkit = { workspace = true }
//! ```
//!
//! ```rust,no_run
//! use wiki_testkit::*;
//!
//! # async fn example() {
//! init_tracing();
//! let mesh = RecordingMesh::shared();
//! let wiki = WikiBuilder::new().page("Ideas", 2).build().await;
//! # }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod fixtures;
pub mod mesh;

pub use fixtures::*;
pub use mesh::*;

use tracing_subscriber::EnvFilter;

/// Install a test subscriber honouring `RUST_LOG` (default `warn`)
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
