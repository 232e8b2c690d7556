use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Node ids feed the 10-bit node field of the id generator.
const MAX_NODE_ID: u16 = 1023;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    /// Node id for the unique-id generator. Must be distinct per running
    /// instance when several instances share a database.
    pub node_id: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let node_id = parse_node_id(env::var("NODE_ID").ok())?;

        Ok(Config {
            port,
            state_dir,
            node_id,
        })
    }
}

/// Parse NODE_ID from an optional string value.
///
/// Missing or blank values default to 0. Values outside the 10-bit range
/// are rejected rather than silently truncated, since two instances mapping
/// to the same node would defeat id uniqueness.
pub fn parse_node_id(value: Option<String>) -> Result<u16> {
    let value = match value.filter(|s| !s.trim().is_empty()) {
        Some(v) => v,
        None => return Ok(0),
    };

    let node_id = value
        .trim()
        .parse::<u16>()
        .context("NODE_ID must be a valid number")?;

    anyhow::ensure!(
        node_id <= MAX_NODE_ID,
        "NODE_ID must be at most {}, got {}",
        MAX_NODE_ID,
        node_id
    );

    Ok(node_id)
}
