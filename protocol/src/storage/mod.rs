//! # Storage Module
//!
//! Durable state for a deployment. Pools, loans and memberships each get
//! their own sled tree keyed by plain identifiers, mirroring the in-memory
//! arena layout: nothing on disk points at anything else except by id.
//!
//! Bincode is the on-disk encoding; JSON is for the CLI and debugging.

pub mod db;

pub use db::{DbError, DbResult, PoolDB, WriteSet};
