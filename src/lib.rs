// src/lib.rs

//! Teikningar Harvester Library
//!
//! Crawls the Reykjavík drawing archive into per-address snapshots and
//! publishes them incrementally to an object store.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
