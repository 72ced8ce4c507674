// src/models.rs
use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::units;

/// ERC20 metadata; decimals are fixed per token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

/// A raw integer amount together with its display strings.
///
/// The strings are derived from `amount_unformatted` and are never edited on
/// their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Amount {
    pub amount_unformatted: U256,
    pub amount: String,
    pub amount_pretty: String,
    pub decimals: u8,
}

impl Amount {
    pub fn from_raw(raw: U256, decimals: u8) -> Self {
        Self {
            amount_unformatted: raw,
            amount: units::format_units(raw, decimals),
            amount_pretty: units::pretty_units(raw, decimals, 2),
            decimals,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount_unformatted.is_zero()
    }
}

/// One deposit balance for (user, network, ticket)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerNetworkBalance {
    pub chain_id: u64,
    pub network: String,
    pub prize_pool: Address,
    pub token: Token,
    pub ticket: Token,
    pub balance: Amount,
    pub balance_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub draw_id: u32,
    pub winning_random_number: U256,
    pub timestamp: u64,
    pub beacon_period_started_at: u64,
    pub beacon_period_seconds: u32,
}

impl Draw {
    /// Unix time the draw's beacon period closed
    pub fn ends_at(&self) -> u64 {
        self.beacon_period_started_at + self.beacon_period_seconds as u64
    }

    pub fn date_string(&self) -> String {
        i64::try_from(self.ends_at())
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|dt| dt.format("%b %-d, %Y, %H:%M UTC").to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeTier {
    pub bit_range_size: u8,
    pub draw_id: u32,
    pub max_picks_per_user: u32,
    pub expiry_duration: u32,
    pub end_timestamp_offset: u32,
    pub prize: U256,
    pub tiers: Vec<u32>,
}

/// A draw plus its prize tier. `prize_tier` is `None` when the tier has not
/// been computed yet; that is "unknown", not zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawData {
    pub draw: Draw,
    pub prize_tier: Option<PrizeTier>,
}

/// Claimed payout per draw, tagged with the address it was fetched for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimedAmounts {
    pub users_address: Address,
    pub claimed_amounts: BTreeMap<u32, Amount>,
}

/// Normalized (eligibility) balance per draw, tagged with its address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedBalances {
    pub users_address: Address,
    pub normalized_balances: BTreeMap<u32, U256>,
}

/// Ticket delegation for one network, tagged with its address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delegation {
    pub chain_id: u64,
    pub users_address: Address,
    pub delegate: Option<Address>,
    pub ticket_balance: U256,
}

impl Delegation {
    pub fn is_self_delegated(&self) -> bool {
        self.delegate == Some(self.users_address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeAwardable {
    pub amount: U256,
    pub pick: u64,
    pub distribution_index: u8,
}

/// A user's computed result for one draw, as stored after calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDrawResult {
    pub draw_id: u32,
    pub total_value: U256,
    pub prizes: Vec<PrizeAwardable>,
}

/// Either skeleton placeholders or the rendered items
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "items", rename_all = "lowercase")]
pub enum ListView<T> {
    Loading(usize),
    Items(Vec<T>),
}

impl<T> ListView<T> {
    pub fn items(&self) -> &[T] {
        match self {
            ListView::Loading(_) => &[],
            ListView::Items(items) => items,
        }
    }
}
