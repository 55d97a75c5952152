//! Supervised Inkscape shell-mode proxy.
//!
//! Runs a long-lived `inkscape --shell` process in the background and
//! exposes it as a synchronous, concurrency-safe command/response API. The
//! process is respawned with exponential backoff if it exits unexpectedly;
//! callers are serialized so exactly one command is in flight at a time,
//! which is the only correct model for a line-oriented REPL with no request
//! identifiers.
//!
//! ```no_run
//! use inkscape_proxy::{Proxy, ProxyConfig};
//!
//! # async fn demo() -> Result<(), inkscape_proxy::ProxyError> {
//! let proxy = Proxy::new(ProxyConfig::default());
//! proxy.run::<&str>(&[])?;
//! proxy.svg2pdf("in.svg", "out.pdf").await?;
//! proxy.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod config;
pub mod pool;
pub mod protocol;
pub mod retry;

mod error;
mod proxy;
mod transport;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use proxy::Proxy;
