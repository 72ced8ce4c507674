// src/contracts.rs
//! Per-network read primitives. Each takes the network's tagged record and
//! returns one snapshot; aggregation happens elsewhere.
use std::collections::BTreeMap;

use alloy::{
    primitives::{Address, U256},
    sol_types::SolCall,
};
use futures_util::future::try_join_all;
use tracing::debug;

use crate::{
    config::NetworkConfig,
    error::{Result, ViewError},
    models::{
        Amount, ClaimedAmounts, Delegation, Draw, DrawData, NormalizedBalances,
        PerNetworkBalance, PrizeTier,
    },
    parser::{
        self,
        abi::{
            allowanceCall, balanceOfCall, delegateOfCall, depositToCall, getBalanceAtCall,
            getDrawPayoutBalanceOfCall, getDrawsCall, getNewestDrawCall,
            getNormalizedBalancesForDrawIdsCall, getOldestDrawCall, getPrizeTierCall,
            totalSupplyCall,
        },
    },
    rpc::RpcClient,
    units,
};

async fn call<C: SolCall>(rpc: &RpcClient, to: Address, call: C) -> Result<C::Return> {
    let data = rpc.eth_call(to, &call.abi_encode()).await?;
    parser::decode_returns::<C>(&data)
}

pub async fn ticket_balance(rpc: &RpcClient, net: &NetworkConfig, user: Address) -> Result<U256> {
    call(rpc, net.ticket.address, balanceOfCall { account: user }).await
}

/// Balance of the network's ticket, valued in USD
pub async fn users_balance(
    rpc: &RpcClient,
    net: &NetworkConfig,
    user: Address,
) -> Result<PerNetworkBalance> {
    let raw = ticket_balance(rpc, net, user).await?;
    per_network_balance(net, raw)
}

pub fn per_network_balance(net: &NetworkConfig, raw: U256) -> Result<PerNetworkBalance> {
    let balance_usd = units::to_decimal(raw, net.ticket.decimals)? * net.usd_price;
    Ok(PerNetworkBalance {
        chain_id: net.chain_id,
        network: net.name.clone(),
        prize_pool: net.prize_pool,
        token: net.token.clone(),
        ticket: net.ticket.clone(),
        balance: Amount::from_raw(raw, net.ticket.decimals),
        balance_usd,
    })
}

pub async fn ticket_total_supply(rpc: &RpcClient, net: &NetworkConfig) -> Result<U256> {
    call(rpc, net.ticket.address, totalSupplyCall {}).await
}

/// Native-currency cost (wei) of depositing `amount` for `user` at the current gas price
pub async fn deposit_gas_cost(
    rpc: &RpcClient,
    net: &NetworkConfig,
    user: Address,
    amount: U256,
) -> Result<U256> {
    let data = depositToCall { to: user, amount }.abi_encode();
    let (gas, price) = tokio::try_join!(
        rpc.estimate_gas(user, net.prize_pool, &data),
        rpc.gas_price()
    )?;
    debug!("{}: deposit needs {} gas at {} wei", net.name, gas, price);
    Ok(gas.saturating_mul(price))
}

/// Underlying-token allowance granted to the prize pool
pub async fn deposit_allowance(rpc: &RpcClient, net: &NetworkConfig, user: Address) -> Result<U256> {
    call(
        rpc,
        net.token.address,
        allowanceCall {
            owner: user,
            spender: net.prize_pool,
        },
    )
    .await
}

pub async fn users_delegation(
    rpc: &RpcClient,
    net: &NetworkConfig,
    user: Address,
) -> Result<Delegation> {
    let delegate = call(rpc, net.ticket.address, delegateOfCall { user }).await?;
    let delegate = parser::delegate_or_none(delegate);
    let ticket_balance = ticket_balance(rpc, net, user).await?;

    Ok(Delegation {
        chain_id: net.chain_id,
        users_address: user,
        delegate,
        ticket_balance,
    })
}

pub async fn users_twab(
    rpc: &RpcClient,
    net: &NetworkConfig,
    user: Address,
    timestamp: u64,
) -> Result<U256> {
    call(rpc, net.ticket.address, getBalanceAtCall { user, timestamp }).await
}

async fn newest_draw(rpc: &RpcClient, net: &NetworkConfig) -> Result<Draw> {
    Ok(call(rpc, net.draw_buffer, getNewestDrawCall {}).await?.into())
}

async fn oldest_draw(rpc: &RpcClient, net: &NetworkConfig) -> Result<Draw> {
    Ok(call(rpc, net.draw_buffer, getOldestDrawCall {}).await?.into())
}

/// Ids of the most recent `max_draws` draws still held by the draw buffer
pub fn draw_id_window(oldest: u32, newest: u32, max_draws: u32) -> Vec<u32> {
    if newest < oldest || max_draws == 0 {
        return Vec::new();
    }
    let first = newest.saturating_sub(max_draws - 1).max(oldest);
    (first..=newest).collect()
}

/// `None` when the tier has not been pushed for this draw yet
pub async fn prize_tier(rpc: &RpcClient, net: &NetworkConfig, draw_id: u32) -> Result<Option<PrizeTier>> {
    match call(rpc, net.prize_tier_history, getPrizeTierCall { drawId: draw_id }).await {
        Ok(tier) => Ok(Some(tier.into())),
        Err(ViewError::Reverted(reason)) => {
            debug!("No prize tier for draw {} on {}: {}", draw_id, net.name, reason);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Draws with their prize tiers, keyed by draw id (ascending)
pub async fn all_draw_datas(
    rpc: &RpcClient,
    net: &NetworkConfig,
    max_draws: u32,
) -> Result<BTreeMap<u32, DrawData>> {
    let newest = match newest_draw(rpc, net).await {
        Ok(draw) => draw,
        // empty draw buffer reverts
        Err(ViewError::Reverted(_)) => return Ok(BTreeMap::new()),
        Err(e) => return Err(e),
    };
    let oldest = oldest_draw(rpc, net).await?;

    let ids = draw_id_window(oldest.draw_id, newest.draw_id, max_draws);
    if ids.is_empty() {
        return Ok(BTreeMap::new());
    }

    let draws = call(rpc, net.draw_buffer, getDrawsCall { drawIds: ids.clone() }).await?;
    if draws.len() != ids.len() {
        return Err(ViewError::Decode("draws"));
    }

    let tiers = try_join_all(ids.iter().map(|id| prize_tier(rpc, net, *id))).await?;

    Ok(draws
        .into_iter()
        .zip(tiers)
        .map(|(draw, prize_tier)| {
            let draw = Draw::from(draw);
            (draw.draw_id, DrawData { draw, prize_tier })
        })
        .collect())
}

pub async fn users_claimed_amounts(
    rpc: &RpcClient,
    net: &NetworkConfig,
    user: Address,
    draw_ids: &[u32],
) -> Result<ClaimedAmounts> {
    let payouts = try_join_all(draw_ids.iter().map(|id| async move {
        call(
            rpc,
            net.prize_distributor,
            getDrawPayoutBalanceOfCall { user, drawId: *id },
        )
        .await
    }))
    .await?;

    Ok(ClaimedAmounts {
        users_address: user,
        claimed_amounts: draw_ids
            .iter()
            .zip(payouts)
            .map(|(id, raw)| (*id, Amount::from_raw(raw, net.ticket.decimals)))
            .collect(),
    })
}

pub async fn users_normalized_balances(
    rpc: &RpcClient,
    net: &NetworkConfig,
    user: Address,
    draw_ids: &[u32],
) -> Result<NormalizedBalances> {
    let normalized_balances = if draw_ids.is_empty() {
        BTreeMap::new()
    } else {
        let values = call(
            rpc,
            net.draw_calculator,
            getNormalizedBalancesForDrawIdsCall {
                user,
                drawIds: draw_ids.to_vec(),
            },
        )
        .await?;
        if values.len() != draw_ids.len() {
            return Err(ViewError::Decode("normalized balances"));
        }
        draw_ids.iter().copied().zip(values).collect()
    };

    Ok(NormalizedBalances {
        users_address: user,
        normalized_balances,
    })
}
