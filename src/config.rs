use dotenvy::dotenv;
use eyre::{eyre, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::{collections::HashSet, env, fs};
use alloy::primitives::Address;
use tracing::info;

use crate::models::Token;

/// One prize pool deployment: a tagged record of chain + contract addresses
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub prize_pool: Address,
    pub ticket: Token,
    /// underlying deposit token
    pub token: Token,
    pub prize_distributor: Address,
    pub draw_buffer: Address,
    pub prize_tier_history: Address,
    pub draw_calculator: Address,
    #[serde(default = "default_usd_price")]
    pub usd_price: Decimal,
    /// gas currency symbol
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
}

fn default_usd_price() -> Decimal {
    Decimal::ONE
}

fn default_native_symbol() -> String {
    "ETH".to_string()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub networks: Vec<NetworkConfig>,
    pub db_path: String,
    pub port: u16,
    pub refresh_secs: u64,
    pub query_stale_secs: u64,
    pub max_draws: u32,
}

impl Config {
    pub fn network(&self, chain_id: u64) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.chain_id == chain_id)
    }
}

pub fn load() -> Result<Config> {
    dotenv().ok();

    let networks_file = env::var("NETWORKS_FILE").unwrap_or_else(|_| "networks.json".to_string());
    let raw = fs::read_to_string(&networks_file)
        .map_err(|e| eyre!("Cannot read networks file {}: {}", networks_file, e))?;
    let networks = parse_networks(&raw)?;

    // SQLite DB path (default: prize_view.db)
    let db_path = env::var("DATABASE_URL").unwrap_or_else(|_| "prize_view.db".to_string());

    let port = env_or("PORT", 8080);
    let refresh_secs = env_or("REFRESH_SECS", 60);
    let query_stale_secs = env_or("QUERY_STALE_SECS", 30);
    let max_draws = env_or("MAX_DRAWS", 20);

    let cfg = Config {
        networks,
        db_path,
        port,
        refresh_secs,
        query_stale_secs,
        max_draws,
    };

    info!(
        "Loaded config: {} networks, db {}, port {}",
        cfg.networks.len(),
        cfg.db_path,
        cfg.port
    );

    Ok(cfg)
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse the networks list. Order is kept; it is the display order.
pub fn parse_networks(raw: &str) -> Result<Vec<NetworkConfig>> {
    let networks: Vec<NetworkConfig> = serde_json::from_str(raw)?;

    if networks.is_empty() {
        return Err(eyre!("Networks file lists no networks"));
    }

    let mut seen = HashSet::new();
    for network in &networks {
        if !seen.insert(network.chain_id) {
            return Err(eyre!("Duplicate chain id {} in networks file", network.chain_id));
        }
    }

    // raw twab totals are summed across networks, so ticket units must agree
    let decimals = networks[0].ticket.decimals;
    if let Some(odd) = networks.iter().find(|n| n.ticket.decimals != decimals) {
        return Err(eyre!(
            "Ticket on {} has {} decimals, expected {} like {}",
            odd.name,
            odd.ticket.decimals,
            decimals,
            networks[0].name
        ));
    }

    Ok(networks)
}
