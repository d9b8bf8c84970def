//! HTTP service over the append-only session event store.
//!
//! Routes live in [`routes`]; the store itself is the `sessionlog-store`
//! workspace crate.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use anyhow::Context;
use sessionlog_store::{create_journal, EventStore};

/// Open the configured journal and replay it into a fresh store.
pub fn open_store(cfg: &config::ServerConfig) -> anyhow::Result<EventStore> {
    let journal = create_journal(&cfg.journal, &cfg.data_dir)
        .with_context(|| format!("failed to open {} journal", cfg.journal))?;
    EventStore::open(journal, cfg.retry.policy()).context("failed to replay journal")
}
