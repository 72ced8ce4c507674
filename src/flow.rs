// src/flow.rs
//! Deposit confirmation flow: picks which view a deposit modal shows.
use alloy::primitives::{Address, U256};
use serde::Serialize;

use crate::{
    aggregator::Connection,
    config::NetworkConfig,
    models::Amount,
    odds::OddsChange,
    tx::{Transaction, TxId, TxTracker},
    units,
};

const PRIZES_FAQ_URL: &str = "https://docs.pooltogether.com/faq/prizes-and-winning";
const ACCOUNT_PATH: &str = "/account";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapPreview {
    pub chain_id: u64,
    pub from_symbol: String,
    pub to_symbol: String,
    pub amount_pretty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmView {
    pub chain_id: u64,
    pub swap: SwapPreview,
    /// projected odds change; `None` until the draw has a prize tier
    pub odds: Option<OddsChange>,
    pub receive: String,
    /// native-currency cost, e.g. "0.0042 MATIC"
    pub estimated_gas: Option<String>,
    pub submit_disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DepositView {
    NetworkGate {
        chain_id: u64,
        network: String,
    },
    LoadingGate,
    ApprovalGate {
        chain_id: u64,
        prize_pool: Address,
        approve_tx: Option<Transaction>,
    },
    Error {
        message: String,
    },
    Submitted {
        chain_id: u64,
        tx_hash: Option<String>,
        prizes_notice_url: String,
        account_link: String,
    },
    Confirm(ConfirmView),
}

/// Everything the flow reads; all of it is fetched elsewhere
pub struct DepositRequest<'a> {
    pub network: &'a NetworkConfig,
    pub amount: &'a Amount,
    pub allowance: Option<U256>,
    pub is_data_fetched: bool,
    pub approve_tx: Option<&'a Transaction>,
    pub deposit_tx: Option<&'a Transaction>,
}

/// A deposit is waiting in the wallet and has not resolved yet
pub fn submit_disabled(deposit_tx: Option<&Transaction>) -> bool {
    deposit_tx.map_or(false, |tx| tx.in_wallet && !tx.cancelled && !tx.completed)
}

fn needs_approval(amount: &Amount, allowance: Option<U256>) -> bool {
    !amount.is_zero() && allowance.map_or(false, |allowance| allowance < amount.amount_unformatted)
}

/// Select the view. Checks are ordered; the first that applies wins.
pub fn deposit_view(connection: &Connection, req: &DepositRequest<'_>) -> DepositView {
    let net = req.network;

    if !connection.is_wallet_on_network(net.chain_id) {
        return DepositView::NetworkGate {
            chain_id: net.chain_id,
            network: net.name.clone(),
        };
    }

    if !req.is_data_fetched {
        return DepositView::LoadingGate;
    }

    if needs_approval(req.amount, req.allowance) {
        return DepositView::ApprovalGate {
            chain_id: net.chain_id,
            prize_pool: net.prize_pool,
            // a pending approval is shown instead of a second button
            approve_tx: req
                .approve_tx
                .filter(|tx| tx.sent && !tx.cancelled)
                .cloned(),
        };
    }

    if let Some(tx) = req.deposit_tx.filter(|tx| tx.sent) {
        if tx.error {
            return DepositView::Error {
                message: "Something went wrong while processing your transaction.".into(),
            };
        }
        return DepositView::Submitted {
            chain_id: net.chain_id,
            tx_hash: tx.hash.clone(),
            prizes_notice_url: PRIZES_FAQ_URL.into(),
            account_link: ACCOUNT_PATH.into(),
        };
    }

    DepositView::Confirm(ConfirmView {
        chain_id: net.chain_id,
        swap: SwapPreview {
            chain_id: net.chain_id,
            from_symbol: net.token.symbol.clone(),
            to_symbol: net.ticket.symbol.clone(),
            amount_pretty: req.amount.amount_pretty.clone(),
        },
        odds: None,
        receive: format!("{} {}", req.amount.amount_pretty, net.ticket.symbol),
        estimated_gas: None,
        submit_disabled: submit_disabled(req.deposit_tx),
    })
}

/// Gas cost in the network's native currency, 4 places
pub fn gas_cost_display(cost_wei: U256, native_symbol: &str) -> String {
    format!("{} {}", units::pretty_units(cost_wei, 18, 4), native_symbol)
}

/// Fill the confirmation view's estimates; gates are returned untouched.
pub fn with_estimates(
    view: DepositView,
    odds: Option<OddsChange>,
    estimated_gas: Option<String>,
) -> DepositView {
    match view {
        DepositView::Confirm(confirm) => DepositView::Confirm(ConfirmView {
            odds,
            estimated_gas,
            ..confirm
        }),
        other => other,
    }
}

/// "Try again" from the error view: drop the failed attempt
pub fn reset_deposit(tracker: &TxTracker, deposit_tx: TxId) -> Option<Transaction> {
    tracker.reset(deposit_tx)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AddTokenAction {
    Warn { message: String },
    Add {
        symbol: String,
        address: Address,
        decimals: u8,
        image: Option<String>,
    },
}

fn token_image(symbol: &str) -> Option<String> {
    match symbol {
        "PTaUSDC" => Some("https://app.pooltogether.com/ptausdc@2x.png".into()),
        _ => None,
    }
}

/// Adding the ticket to a wallet only makes sense on its own network
pub fn add_ticket_to_wallet(connection: &Connection, net: &NetworkConfig) -> AddTokenAction {
    if !connection.is_wallet_on_network(net.chain_id) {
        return AddTokenAction::Warn {
            message: format!(
                "Switch to {} to add token '{}'",
                net.name, net.token.symbol
            ),
        };
    }
    AddTokenAction::Add {
        symbol: net.ticket.symbol.clone(),
        address: net.ticket.address,
        decimals: net.ticket.decimals,
        image: token_image(&net.ticket.symbol),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractLink {
    pub label: &'static str,
    pub chain_id: u64,
    pub address: Address,
}

pub fn contract_links(net: &NetworkConfig) -> Vec<ContractLink> {
    vec![
        ContractLink {
            label: "Prize pool",
            chain_id: net.chain_id,
            address: net.prize_pool,
        },
        ContractLink {
            label: "Ticket token",
            chain_id: net.chain_id,
            address: net.ticket.address,
        },
        ContractLink {
            label: "Underlying token",
            chain_id: net.chain_id,
            address: net.token.address,
        },
    ]
}
