//! Sluice Remote - sessions and workers over TCP
//!
//! - [`SessionServer`] hosts sessions of named nodes, built from a
//!   [`Registry`](sluice_registry::Registry), and serves stage instances to
//!   remote worker pools.
//! - [`RemoteSession`] drives a session from another process.
//! - [`RemoteCoupling`] is a [`Coupling`](sluice_core::Coupling) that runs a
//!   pool's chunks on a server.
//! - [`wire`] is the byte format they share.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sluice_core::{PoolOptions, WorkerPool};
//! use sluice_remote::{RemoteCoupling, RemoteSession};
//!
//! let key = RemoteSession::open("worker-host:16661")?.key();
//! let pool = registry.create_pool("magnitude").unwrap();
//! for _ in 0..4 {
//!     let worker = RemoteCoupling::connect("worker-host:16661", key, "magnitude", options.stall_timeout)?;
//!     pool.handle().add_worker(Box::new(worker))?;
//! }
//! ```

pub mod client;
pub mod coupling;
pub mod error;
pub mod server;
pub mod wire;

pub use client::{KeepAlive, RemoteSession};
pub use coupling::RemoteCoupling;
pub use error::RemoteError;
pub use server::{DEFAULT_PORT, FIRST_KEY, ServerOptions, SessionServer};
