//! Core types and utilities for dao-plugins
//!
//! # Modules
//!
//! - `config`: Environment file loading and typed lookups
//! - `contract`: Deployed contract address space and interface ids
//! - `error`: Error types and Result alias
//! - `hashing`: Domain-separated content hashing
//! - `telemetry`: Tracing subscriber setup
//! - `types`: Addresses, hashes, version tags and setup references

pub mod config;
pub mod contract;
pub mod error;
pub mod hashing;
pub mod telemetry;
pub mod types;

// Re-exports
pub use contract::{AddressSpace, Contract, InterfaceId};
pub use error::{Error, Result};
pub use hashing::{hash_bytes, ContentHasher};
pub use types::*;
