//! LinkVault — a personal bookmark manager core with real-time sync.
//!
//! The crate centers on [`engine::SyncEngine`], which reconciles a local
//! ordered bookmark collection against a server-pushed change feed. The
//! session provider, persistent store, and change feed are trait seams in
//! [`backend`]; SQLite and in-memory implementations are included.

pub mod backend;
pub mod config;
pub mod database;
pub mod engine;
pub mod types;
