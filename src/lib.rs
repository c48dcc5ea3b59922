//! An RPC server that exposes an embedded key-value store through a single `Echo` method.
//!
//! Every call carries an operation code, a key, and a value. The server applies the operation to
//! the store and replies with a status and, for reads, the stored value. The store lives only as
//! long as the server: its directory is removed when the server stops.

#![deny(missing_docs, missing_debug_implementations)]

#[macro_use]
extern crate slog;

pub mod config;
pub mod engines;
mod error;
pub mod proto;
pub mod server;
pub mod service;
mod storage;
pub mod thread_pool;

pub use config::ServerConfig;
pub use engines::{KvsEngine, SledKvsEngine};
pub use error::{Error, ErrorKind, Result};
pub use server::{ListenAddr, RpcServer, ServerHandle, ServerOptions};
pub use service::EchoService;
pub use storage::{StorageHandle, DEFAULT_DB_PATH};
