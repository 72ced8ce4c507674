use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::{
    models::{
        Amount, ClaimedAmounts, Delegation, DrawData, ListView, NormalizedBalances,
        PerNetworkBalance, StoredDrawResult, Token,
    },
    query::{all_fetched, first_error, Query},
    units,
};

const DEPOSIT_SKELETON_ROWS: usize = 2;
const PAST_DRAW_SKELETON_ROWS: usize = 3;

/// Who is looking, and where their wallet is pointed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Connection {
    pub users_address: Option<Address>,
    pub wallet_chain_id: Option<u64>,
}

impl Connection {
    pub fn new(users_address: Option<Address>, wallet_chain_id: Option<u64>) -> Self {
        Self {
            users_address,
            wallet_chain_id,
        }
    }

    pub fn is_wallet_on_network(&self, chain_id: u64) -> bool {
        self.wallet_chain_id == Some(chain_id)
    }
}

// ---------- cross-network balances ----------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsersBalances {
    pub balances: Vec<PerNetworkBalance>,
    pub total_value_usd: Decimal,
}

/// Combine one balance query per network into a single view.
///
/// Returns `None` without looking at queries when no address is connected.
pub fn users_balances(
    connection: &Connection,
    per_network: &[Query<PerNetworkBalance>],
) -> Option<Query<UsersBalances>> {
    connection.users_address?;

    if !all_fetched(per_network) {
        return Some(Query::Loading);
    }
    if let Some(e) = first_error(per_network) {
        return Some(Query::Error(e));
    }

    let balances: Vec<PerNetworkBalance> = per_network
        .iter()
        .filter_map(Query::data)
        .cloned()
        .collect();
    let total_value_usd = balances.iter().map(|b| b.balance_usd).sum();

    Some(Query::Ready(UsersBalances {
        balances,
        total_value_usd,
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositRow {
    pub chain_id: u64,
    pub network: String,
    pub prize_pool: Address,
    pub symbol: String,
    pub token_address: Address,
    pub ticket_address: Address,
    pub balance_pretty: String,
    pub balance_usd_pretty: String,
    /// zero balances are shown greyed out
    pub dimmed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositsView {
    pub total_value_usd_pretty: String,
    pub rows: ListView<DepositRow>,
}

/// Deposits card. Hidden until fetched and whenever the exact USD total is zero;
/// a total that merely rounds to `0.00` is still shown.
pub fn deposits_view(balances: Option<&Query<UsersBalances>>) -> Option<DepositsView> {
    let data = balances?.data()?;
    if data.total_value_usd.is_zero() {
        return None;
    }

    let rows = data
        .balances
        .iter()
        .map(|b| DepositRow {
            chain_id: b.chain_id,
            network: b.network.clone(),
            prize_pool: b.prize_pool,
            symbol: b.token.symbol.clone(),
            token_address: b.token.address,
            ticket_address: b.ticket.address,
            balance_pretty: b.balance.amount_pretty.clone(),
            balance_usd_pretty: units::pretty_usd(b.balance_usd),
            dimmed: b.balance_usd.is_zero(),
        })
        .collect();

    Some(DepositsView {
        total_value_usd_pretty: units::pretty_usd(data.total_value_usd),
        rows: ListView::Items(rows),
    })
}

/// Deposit list on its own, with skeleton rows while loading
pub fn deposit_list(balances: Option<&Query<UsersBalances>>) -> ListView<DepositRow> {
    match deposits_view(balances) {
        Some(view) => view.rows,
        None if balances.map_or(false, Query::is_fetched) => ListView::Items(Vec::new()),
        None => ListView::Loading(DEPOSIT_SKELETON_ROWS),
    }
}

// ---------- delegated to you ----------

/// Total twab minus every network's self-delegated ticket balance.
///
/// Only subtracts: amounts delegated in are already part of `total_twab`.
pub fn delegated_to_amount(
    connection: &Connection,
    total_twab: &Query<U256>,
    delegations: &[Query<Delegation>],
    decimals: u8,
) -> Query<Amount> {
    let Some(users_address) = connection.users_address else {
        return Query::Loading;
    };

    if !total_twab.is_fetched() || !all_fetched(delegations) {
        return Query::Loading;
    }
    if let Some(e) = total_twab.error().map(str::to_string).or_else(|| first_error(delegations)) {
        return Query::Error(e);
    }

    // results cached for a previous address are not usable
    if delegations
        .iter()
        .filter_map(Query::data)
        .any(|d| d.users_address != users_address)
    {
        debug!("Delegation results belong to another address, waiting for refetch");
        return Query::Loading;
    }

    let mut remaining = total_twab.data().copied().unwrap_or_default();
    for delegation in delegations.iter().filter_map(Query::data) {
        if delegation.is_self_delegated() {
            remaining = remaining.saturating_sub(delegation.ticket_balance);
        }
    }

    Query::Ready(Amount::from_raw(remaining, decimals))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelegatedToRow {
    pub amount: String,
    pub amount_pretty: String,
}

/// Hidden unless fetched and the formatted amount is not `"0.0"`
pub fn delegated_to_row(amount: &Query<Amount>) -> Option<DelegatedToRow> {
    let amount = amount.data()?;
    if amount.amount.is_empty() || amount.amount == "0.0" {
        return None;
    }
    let (int_part, frac_part) = amount
        .amount
        .split_once('.')
        .unwrap_or((amount.amount.as_str(), ""));

    Some(DelegatedToRow {
        amount: amount.amount.clone(),
        amount_pretty: format!("${}.{}", units::with_commas(int_part), frac_part),
    })
}

// ---------- past draws ----------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawStatus {
    /// nothing to say: disconnected, no prize, unclaimed, or still unknown
    Neutral,
    Claimed { amount_pretty: String, symbol: String },
    NotEligible,
}

/// Per-draw message. Checks run in a fixed order; first match wins.
pub fn draw_status(
    connection: &Connection,
    ticket: &Token,
    claimed_amount: Option<&Amount>,
    normalized_balance: Option<&U256>,
    stored_result: Option<&StoredDrawResult>,
) -> DrawStatus {
    if connection.users_address.is_none() {
        return DrawStatus::Neutral;
    }

    if let Some(claimed) = claimed_amount.filter(|c| !c.is_zero()) {
        return DrawStatus::Claimed {
            amount_pretty: claimed.amount_pretty.clone(),
            symbol: ticket.symbol.clone(),
        };
    }

    // nothing claimed from here on
    let has_amount_to_claim = stored_result.map_or(false, |r| !r.total_value.is_zero());
    if stored_result.is_some() && !has_amount_to_claim {
        return DrawStatus::Neutral;
    }
    if has_amount_to_claim {
        // claiming is offered elsewhere
        return DrawStatus::Neutral;
    }

    if normalized_balance.map_or(false, |b| b.is_zero()) {
        return DrawStatus::NotEligible;
    }

    DrawStatus::Neutral
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PastDrawRow {
    pub draw_id: u32,
    pub label: String,
    pub date: String,
    /// whole-token prize; `None` when the draw has no prize tier yet
    pub prize: Option<String>,
    pub status: DrawStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PastDrawsView {
    pub rows: ListView<PastDrawRow>,
    pub no_draws_yet: bool,
}

pub struct PastDrawsInput<'a> {
    pub ticket: &'a Token,
    pub draw_datas: &'a Query<BTreeMap<u32, DrawData>>,
    pub claimed_amounts: &'a Query<ClaimedAmounts>,
    pub normalized_balances: &'a Query<NormalizedBalances>,
    pub stored_results: &'a BTreeMap<u32, StoredDrawResult>,
}

/// Per-user overlays count only when tagged with the connected address
fn overlays_match(connection: &Connection, input: &PastDrawsInput<'_>) -> bool {
    let claimed_for = input.claimed_amounts.data().map(|c| c.users_address);
    let normalized_for = input.normalized_balances.data().map(|n| n.users_address);
    connection.users_address == normalized_for && connection.users_address == claimed_for
}

/// Overlays fetched for an older draw list lack entries for newer draws;
/// a missing entry is "not fetched yet", never "nothing claimed".
fn overlays_cover(
    draw_datas: &BTreeMap<u32, DrawData>,
    claimed: Option<&BTreeMap<u32, Amount>>,
    normalized: Option<&BTreeMap<u32, U256>>,
) -> bool {
    draw_datas.keys().all(|id| {
        claimed.map_or(true, |c| c.contains_key(id)) && normalized.map_or(true, |n| n.contains_key(id))
    })
}

/// Merge draws with prize tiers and the user's overlays, newest first.
pub fn past_draws(connection: &Connection, input: &PastDrawsInput<'_>) -> Query<Vec<PastDrawRow>> {
    if !input.draw_datas.is_fetched() || !overlays_match(connection, input) {
        return Query::Loading;
    }
    let Some(draw_datas) = input.draw_datas.data() else {
        return Query::Error(input.draw_datas.error().unwrap_or_default().to_string());
    };

    let claimed = input.claimed_amounts.data().map(|c| &c.claimed_amounts);
    let normalized = input.normalized_balances.data().map(|n| &n.normalized_balances);
    if !overlays_cover(draw_datas, claimed, normalized) {
        return Query::Loading;
    }

    let rows = draw_datas
        .values()
        .rev()
        .map(|draw_data| {
            let draw_id = draw_data.draw.draw_id;
            PastDrawRow {
                draw_id,
                label: format!("#{}", draw_id),
                date: draw_data.draw.date_string(),
                prize: draw_data
                    .prize_tier
                    .as_ref()
                    .map(|tier| units::whole_units(tier.prize, input.ticket.decimals)),
                status: draw_status(
                    connection,
                    input.ticket,
                    claimed.and_then(|c| c.get(&draw_id)),
                    normalized.and_then(|n| n.get(&draw_id)),
                    input.stored_results.get(&draw_id),
                ),
            }
        })
        .collect();

    Query::Ready(rows)
}

pub fn past_draws_view(rows: &Query<Vec<PastDrawRow>>) -> PastDrawsView {
    match rows.data() {
        Some(rows) => PastDrawsView {
            no_draws_yet: rows.is_empty(),
            rows: ListView::Items(rows.clone()),
        },
        None => PastDrawsView {
            rows: ListView::Loading(PAST_DRAW_SKELETON_ROWS),
            no_draws_yet: false,
        },
    }
}
