//! Token/pool registry persistence. Snapshot-on-shutdown and
//! load-on-startup are the only touchpoints; `schema_version` is the
//! only compatibility guard, since byte-stable-within-a-major-version is
//! as far as this persistence contract goes.

use crate::graph::VenueKind;
use crate::token::{PoolAddress, TokenId};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub mint: TokenId,
    pub decimals: u8,
    pub first_seen_slot: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRecord {
    pub pool_address: PoolAddress,
    pub venue: VenueKind,
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub last_seen_slot: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub schema_version: u32,
    pub tokens: Vec<TokenRecord>,
    pub pools: Vec<PoolRecord>,
}

impl SnapshotFile {
    pub fn new(tokens: Vec<TokenRecord>, pools: Vec<PoolRecord>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            tokens,
            pools,
        }
    }
}

pub fn save(path: &Path, snapshot: &SnapshotFile) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating snapshot file at {}", path.display()))?;
    serde_json::to_writer_pretty(file, snapshot)
        .with_context(|| format!("writing snapshot to {}", path.display()))?;
    Ok(())
}

pub fn load(path: &Path) -> Result<SnapshotFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading snapshot from {}", path.display()))?;
    let snapshot: SnapshotFile = serde_json::from_str(&content)
        .with_context(|| format!("parsing snapshot from {}", path.display()))?;
    anyhow::ensure!(
        snapshot.schema_version == SCHEMA_VERSION,
        "snapshot at {} has schema_version {}, expected {}",
        path.display(),
        snapshot.schema_version,
        SCHEMA_VERSION
    );
    Ok(snapshot)
}
