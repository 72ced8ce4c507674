use axum::{
    extract::{Query as QueryParams, State},
    response::Json,
    routing::{get, post},
    Router,
};
use alloy::primitives::{Address, U256};
use futures_util::future::join_all;
use rusqlite::Connection as DbConnection;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::task;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::{
    aggregator::{
        self, Connection, DelegatedToRow, DepositRow, DepositsView, PastDrawsInput, PastDrawsView,
        UsersBalances,
    },
    config::{Config, NetworkConfig},
    contracts, db,
    error::{Result, ViewError},
    flow::{self, AddTokenAction, ContractLink, DepositRequest, DepositView},
    models::{
        Amount, ClaimedAmounts, Delegation, DrawData, ListView, NormalizedBalances,
        PerNetworkBalance, PrizeAwardable, StoredDrawResult,
    },
    odds::{self, OddsChange},
    prizes::{self, PrizeRow},
    query::{Query, QueryCache},
    rpc::RpcClient,
    tx::{self, Transaction, TxId, TxTracker},
    units,
};

type UserKey = (Address, u64);
/// Per-draw overlays are only valid for the draw list they were fetched for
type OverlayKey = (Address, u64, Vec<u32>);

/// Query caches shared by the API and the refresher
pub struct Caches {
    pub balances: QueryCache<UserKey, PerNetworkBalance>,
    pub delegations: QueryCache<UserKey, Delegation>,
    pub twabs: QueryCache<Address, U256>,
    pub allowances: QueryCache<UserKey, U256>,
    pub draw_datas: QueryCache<u64, BTreeMap<u32, DrawData>>,
    pub claimed_amounts: QueryCache<OverlayKey, ClaimedAmounts>,
    pub normalized_balances: QueryCache<OverlayKey, NormalizedBalances>,
}

impl Caches {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            balances: QueryCache::new("balances", stale_after),
            delegations: QueryCache::new("delegations", stale_after),
            twabs: QueryCache::new("twabs", stale_after),
            allowances: QueryCache::new("allowances", stale_after),
            draw_datas: QueryCache::new("draw_datas", stale_after),
            claimed_amounts: QueryCache::new("claimed_amounts", stale_after),
            normalized_balances: QueryCache::new("normalized_balances", stale_after),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub rpcs: Arc<HashMap<u64, RpcClient>>,
    pub caches: Arc<Caches>,
    pub conn: Arc<Mutex<DbConnection>>,
    pub txs: TxTracker,
}

impl AppState {
    pub fn new(cfg: Config, conn: Arc<Mutex<DbConnection>>) -> Result<Self> {
        let rpcs = cfg
            .networks
            .iter()
            .map(|n| Ok((n.chain_id, RpcClient::new(&n.rpc_url)?)))
            .collect::<Result<HashMap<_, _>>>()?;
        let caches = Caches::new(Duration::from_secs(cfg.query_stale_secs));

        Ok(Self {
            cfg: Arc::new(cfg),
            rpcs: Arc::new(rpcs),
            caches: Arc::new(caches),
            conn,
            txs: TxTracker::new(),
        })
    }

    fn network(&self, chain_id: u64) -> Result<(&NetworkConfig, &RpcClient)> {
        let net = self
            .cfg
            .network(chain_id)
            .ok_or(ViewError::UnknownNetwork(chain_id))?;
        let rpc = self
            .rpcs
            .get(&chain_id)
            .ok_or(ViewError::UnknownNetwork(chain_id))?;
        Ok((net, rpc))
    }
}

#[derive(Deserialize)]
pub struct UserParams {
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct DrawsParams {
    pub chain_id: u64,
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct PrizesParams {
    pub chain_id: u64,
    pub address: String,
    pub draw_id: u32,
}

#[derive(Deserialize)]
pub struct DepositParams {
    pub chain_id: u64,
    pub address: String,
    pub wallet_chain_id: Option<u64>,
    pub amount: String,
    pub deposit_tx: Option<TxId>,
    pub approve_tx: Option<TxId>,
}

#[derive(Deserialize)]
pub struct DrawResultBody {
    pub chain_id: u64,
    pub address: String,
    pub draw_id: u32,
    /// decimal string of the raw total
    pub total_value: String,
    #[serde(default)]
    pub prizes: Vec<PrizeAwardable>,
}

#[derive(Deserialize)]
pub struct SubmitBody {
    pub chain_id: u64,
    pub address: String,
    pub name: String,
    /// wallet-signed raw transaction, hex
    pub signed_tx: String,
}

#[derive(Deserialize)]
pub struct TxParams {
    pub id: TxId,
}

#[derive(Deserialize)]
pub struct MoreParams {
    pub chain_id: u64,
    pub wallet_chain_id: Option<u64>,
}

#[derive(Serialize)]
pub struct MoreView {
    pub contracts: Vec<ContractLink>,
    pub add_token: AddTokenAction,
}

fn parse_address(raw: &str) -> Result<Address> {
    raw.trim()
        .parse::<Address>()
        .map_err(|_| ViewError::BadRequest(format!("invalid address {}", raw)))
}

fn parse_optional_address(raw: Option<&str>) -> Result<Option<Address>> {
    raw.filter(|s| !s.trim().is_empty()).map(parse_address).transpose()
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "Prize view API running" }))
        .route("/balances", get(get_balances))
        .route("/balances/list", get(get_balance_list))
        .route("/delegated", get(get_delegated))
        .route("/draws", get(get_draws))
        .route("/prizes", get(get_prizes))
        .route("/draw-results", post(post_draw_result))
        .route("/deposit", get(get_deposit))
        .route("/deposit/submit", post(post_submit))
        .route("/deposit/reset", post(post_reset))
        .route("/tx", get(get_tx))
        .route("/more", get(get_more))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(state: AppState) -> eyre::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], state.cfg.port));
    let app = router(state);
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

// ---------- handlers ----------

async fn users_balances(state: &AppState, users_address: Option<Address>) -> Option<Query<UsersBalances>> {
    let connection = Connection::new(users_address, None);
    let user = users_address?;

    let (rpcs, caches) = (&state.rpcs, &state.caches);
    let per_network = join_all(state.cfg.networks.iter().map(|net| async move {
        let Some(rpc) = rpcs.get(&net.chain_id) else {
            return Query::Error(ViewError::UnknownNetwork(net.chain_id).to_string());
        };
        caches
            .balances
            .fetch_with((user, net.chain_id), contracts::users_balance(rpc, net, user))
            .await
    }))
    .await;

    aggregator::users_balances(&connection, &per_network)
}

async fn get_balances(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<UserParams>,
) -> Result<Json<Option<DepositsView>>> {
    let users_address = parse_optional_address(params.address.as_deref())?;
    let balances = users_balances(&state, users_address).await;
    Ok(Json(aggregator::deposits_view(balances.as_ref())))
}

/// Rows only, with loading placeholders; used by the account page list
async fn get_balance_list(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<UserParams>,
) -> Result<Json<ListView<DepositRow>>> {
    let users_address = parse_optional_address(params.address.as_deref())?;
    let balances = users_balances(&state, users_address).await;
    let list = aggregator::deposit_list(balances.as_ref());
    debug!("Balance list: {} rows", list.items().len());
    Ok(Json(list))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

async fn get_delegated(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<UserParams>,
) -> Result<Json<Option<DelegatedToRow>>> {
    let Some(user) = parse_optional_address(params.address.as_deref())? else {
        return Ok(Json(None));
    };
    let connection = Connection::new(Some(user), None);
    let timestamp = now_secs();

    let (rpcs, caches, networks) = (&state.rpcs, &state.caches, &state.cfg.networks);

    let total_twab = caches
        .twabs
        .fetch_with(user, async move {
            let twabs = join_all(networks.iter().map(|net| async move {
                let rpc = rpcs
                    .get(&net.chain_id)
                    .ok_or(ViewError::UnknownNetwork(net.chain_id))?;
                contracts::users_twab(rpc, net, user, timestamp).await
            }))
            .await;
            twabs
                .into_iter()
                .try_fold(U256::ZERO, |acc, twab| twab.map(|t| acc.saturating_add(t)))
        })
        .await;

    let delegations = join_all(networks.iter().map(|net| async move {
        let Some(rpc) = rpcs.get(&net.chain_id) else {
            return Query::Error(ViewError::UnknownNetwork(net.chain_id).to_string());
        };
        caches
            .delegations
            .fetch_with((user, net.chain_id), contracts::users_delegation(rpc, net, user))
            .await
    }))
    .await;

    // twab totals are summed in the first network's ticket units
    let decimals = state
        .cfg
        .networks
        .first()
        .map(|n| n.ticket.decimals)
        .unwrap_or(6);
    let amount = aggregator::delegated_to_amount(&connection, &total_twab, &delegations, decimals);
    Ok(Json(aggregator::delegated_to_row(&amount)))
}

async fn stored_results(
    state: &AppState,
    net: &NetworkConfig,
    user: Address,
) -> Result<BTreeMap<u32, StoredDrawResult>> {
    let conn = Arc::clone(&state.conn);
    let chain_id = net.chain_id;
    let distributor = net.prize_distributor;
    task::spawn_blocking(move || {
        let db = conn.lock().unwrap_or_else(PoisonError::into_inner);
        db::users_draw_results(&db, chain_id, distributor, user)
    })
    .await
    .map_err(|e| ViewError::Storage(e.to_string()))?
    .map_err(|e| ViewError::Storage(e.to_string()))
}

async fn get_draws(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<DrawsParams>,
) -> Result<Json<PastDrawsView>> {
    let (net, rpc) = state.network(params.chain_id)?;
    let users_address = parse_optional_address(params.address.as_deref())?;
    let connection = Connection::new(users_address, None);

    let draw_datas = state
        .caches
        .draw_datas
        .fetch_with(
            net.chain_id,
            contracts::all_draw_datas(rpc, net, state.cfg.max_draws),
        )
        .await;

    // overlays wait for a settled draw list
    let (claimed_amounts, normalized_balances) = match (users_address, draw_datas.data()) {
        (Some(user), Some(draws)) => {
            let draw_ids: Vec<u32> = draws.keys().copied().collect();
            let key = (user, net.chain_id, draw_ids.clone());
            tokio::join!(
                state.caches.claimed_amounts.fetch_with(
                    key.clone(),
                    contracts::users_claimed_amounts(rpc, net, user, &draw_ids)
                ),
                state.caches.normalized_balances.fetch_with(
                    key,
                    contracts::users_normalized_balances(rpc, net, user, &draw_ids)
                ),
            )
        }
        _ => (Query::Loading, Query::Loading),
    };
    let stored = match users_address {
        Some(user) => stored_results(&state, net, user).await?,
        None => BTreeMap::new(),
    };

    let rows = aggregator::past_draws(
        &connection,
        &PastDrawsInput {
            ticket: &net.ticket,
            draw_datas: &draw_datas,
            claimed_amounts: &claimed_amounts,
            normalized_balances: &normalized_balances,
            stored_results: &stored,
        },
    );
    Ok(Json(aggregator::past_draws_view(&rows)))
}

async fn get_prizes(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<PrizesParams>,
) -> Result<Json<ListView<PrizeRow>>> {
    let (net, _) = state.network(params.chain_id)?;
    let user = parse_address(&params.address)?;
    let stored = stored_results(&state, net, user).await?;
    let prizes = stored.get(&params.draw_id).map(|r| r.prizes.as_slice());
    Ok(Json(prizes::prize_rows(prizes, &net.ticket, &net.token)))
}

async fn post_draw_result(
    State(state): State<AppState>,
    Json(body): Json<DrawResultBody>,
) -> Result<Json<StoredDrawResult>> {
    let (net, _) = state.network(body.chain_id)?;
    let user = parse_address(&body.address)?;
    let total_value = body
        .total_value
        .trim()
        .parse::<U256>()
        .map_err(|_| ViewError::InvalidAmount(body.total_value.clone()))?;

    let result = StoredDrawResult {
        draw_id: body.draw_id,
        total_value,
        prizes: body.prizes,
    };

    let conn = Arc::clone(&state.conn);
    let (chain_id, distributor, record) = (net.chain_id, net.prize_distributor, result.clone());
    task::spawn_blocking(move || {
        let db = conn.lock().unwrap_or_else(PoisonError::into_inner);
        db::record_draw_result(&db, chain_id, distributor, user, &record)
    })
    .await
    .map_err(|e| ViewError::Storage(e.to_string()))?
    .map_err(|e| ViewError::Storage(e.to_string()))?;

    info!("Stored draw {} result for {} on {}", result.draw_id, user, net.name);
    Ok(Json(result))
}

async fn get_deposit(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<DepositParams>,
) -> Result<Json<DepositView>> {
    let (net, rpc) = state.network(params.chain_id)?;
    let user = parse_address(&params.address)?;
    let connection = Connection::new(Some(user), params.wallet_chain_id);

    let raw_amount = units::parse_units(&params.amount, net.token.decimals)?;
    let amount = Amount::from_raw(raw_amount, net.token.decimals);

    let allowance = state
        .caches
        .allowances
        .fetch_with((user, net.chain_id), contracts::deposit_allowance(rpc, net, user))
        .await;

    let deposit_tx = params.deposit_tx.and_then(|id| state.txs.get(id));
    let approve_tx = params.approve_tx.and_then(|id| state.txs.get(id));

    let view = flow::deposit_view(
        &connection,
        &DepositRequest {
            network: net,
            amount: &amount,
            allowance: allowance.data().copied(),
            is_data_fetched: allowance.is_fetched(),
            approve_tx: approve_tx.as_ref(),
            deposit_tx: deposit_tx.as_ref(),
        },
    );

    if !matches!(view, DepositView::Confirm(_)) {
        return Ok(Json(view));
    }
    let (odds, estimated_gas) = deposit_estimates(&state, net, rpc, user, raw_amount).await;
    Ok(Json(flow::with_estimates(view, odds, estimated_gas)))
}

/// Odds change and gas cost for the confirmation view. Either is `None` when
/// its inputs cannot be read; the view still renders.
async fn deposit_estimates(
    state: &AppState,
    net: &NetworkConfig,
    rpc: &RpcClient,
    user: Address,
    amount: U256,
) -> (Option<OddsChange>, Option<String>) {
    let (draw_datas, balance, total_supply, gas_cost) = tokio::join!(
        state.caches.draw_datas.fetch_with(
            net.chain_id,
            contracts::all_draw_datas(rpc, net, state.cfg.max_draws)
        ),
        state
            .caches
            .balances
            .fetch_with((user, net.chain_id), contracts::users_balance(rpc, net, user)),
        contracts::ticket_total_supply(rpc, net),
        contracts::deposit_gas_cost(rpc, net, user, amount),
    );

    // newest draw that has a prize tier
    let tier = draw_datas
        .data()
        .and_then(|draws| draws.values().rev().find_map(|d| d.prize_tier.as_ref()));
    let total_supply = total_supply
        .inspect_err(|e| warn!("{}: total supply unavailable: {}", net.name, e))
        .ok();
    let odds = match (tier, balance.data(), total_supply) {
        (Some(tier), Some(balance), Some(total_supply)) => odds::deposit_odds_change(
            balance.balance.amount_unformatted,
            total_supply,
            amount,
            tier,
            net.ticket.decimals,
        ),
        _ => None,
    };

    let estimated_gas = gas_cost
        .inspect_err(|e| warn!("{}: gas estimate failed: {}", net.name, e))
        .ok()
        .map(|cost| flow::gas_cost_display(cost, &net.native_symbol));

    (odds, estimated_gas)
}

/// Relay a wallet-signed approval or deposit and track it until mined.
async fn post_submit(
    State(state): State<AppState>,
    Json(body): Json<SubmitBody>,
) -> Result<Json<Transaction>> {
    let (net, rpc) = state.network(body.chain_id)?;
    let user = parse_address(&body.address)?;
    let signed = hex::decode(body.signed_tx.trim().trim_start_matches("0x"))
        .map_err(|_| ViewError::BadRequest("signed_tx is not hex".into()))?;

    let rpc = rpc.clone();
    let caches = Arc::clone(&state.caches);
    let key = (user, net.chain_id);
    let id = state.txs.send(body.name, move |handle| async move {
        let outcome = tx::broadcast_and_confirm(&rpc, &handle, &signed).await;
        // mined or reverted, on-chain balances may have moved
        caches.allowances.invalidate(&key);
        caches.balances.invalidate(&key);
        caches.twabs.invalidate(&user);
        outcome
    });

    state
        .txs
        .get(id)
        .map(Json)
        .ok_or_else(|| ViewError::BadRequest(format!("transaction {} not tracked", id)))
}

async fn post_reset(
    State(state): State<AppState>,
    Json(params): Json<TxParams>,
) -> Json<Option<Transaction>> {
    Json(flow::reset_deposit(&state.txs, params.id))
}

async fn get_tx(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<TxParams>,
) -> Json<Option<Transaction>> {
    Json(state.txs.get(params.id))
}

async fn get_more(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<MoreParams>,
) -> Result<Json<MoreView>> {
    let (net, _) = state.network(params.chain_id)?;
    let connection = Connection::new(None, params.wallet_chain_id);
    Ok(Json(MoreView {
        contracts: flow::contract_links(net),
        add_token: flow::add_ticket_to_wallet(&connection, net),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregator::DrawStatus,
        config::tests::network,
        parser::abi::{
            self, allowanceCall, balanceOfCall, getDrawPayoutBalanceOfCall, getDrawsCall,
            getNewestDrawCall, getNormalizedBalancesForDrawIdsCall, getOldestDrawCall,
            getPrizeTierCall, totalSupplyCall,
        },
        rpc::tests::stub_node,
    };
    use alloy::sol_types::SolCall;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};

    const USER: &str = "0x1111111111111111111111111111111111111111";

    fn state() -> AppState {
        state_on(None)
    }

    fn state_on(rpc_url: Option<String>) -> AppState {
        let mut net = network(137, "Polygon");
        if let Some(url) = rpc_url {
            net.rpc_url = url;
        }
        let cfg = Config {
            networks: vec![net],
            db_path: ":memory:".into(),
            port: 0,
            refresh_secs: 60,
            query_stale_secs: 30,
            max_draws: 20,
        };
        let conn = DbConnection::open_in_memory().unwrap();
        db::run_migrations(&conn).unwrap();
        AppState::new(cfg, Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn addresses_are_validated() {
        assert!(parse_address("0x1111111111111111111111111111111111111111").is_ok());
        assert!(parse_address("nope").is_err());
        assert_eq!(parse_optional_address(None).unwrap(), None);
        assert_eq!(parse_optional_address(Some("  ")).unwrap(), None);
    }

    #[test]
    fn unknown_network_is_rejected() {
        let state = state();
        assert!(state.network(137).is_ok());
        assert!(matches!(state.network(1), Err(ViewError::UnknownNetwork(1))));
    }

    #[tokio::test]
    async fn disconnected_balances_return_nothing() {
        let state = state();
        let Json(view) = get_balances(State(state.clone()), QueryParams(UserParams { address: None }))
            .await
            .unwrap();
        assert!(view.is_none());

        let Json(list) = get_balance_list(State(state), QueryParams(UserParams { address: None }))
            .await
            .unwrap();
        assert_eq!(list, ListView::Loading(2));
    }

    #[tokio::test]
    async fn bad_signed_tx_is_rejected_before_tracking() {
        let state = state();
        let out = post_submit(
            State(state.clone()),
            Json(SubmitBody {
                chain_id: 137,
                address: "0x1111111111111111111111111111111111111111".into(),
                name: "Deposit 10 USDC".into(),
                signed_tx: "0xnothex".into(),
            }),
        )
        .await;
        assert!(matches!(out, Err(ViewError::BadRequest(_))));

        let Json(tx) = get_tx(State(state), QueryParams(TxParams { id: 1 })).await;
        assert!(tx.is_none());
    }

    #[tokio::test]
    async fn more_menu_depends_on_wallet_network() {
        let state = state();
        let Json(view) = get_more(
            State(state.clone()),
            QueryParams(MoreParams {
                chain_id: 137,
                wallet_chain_id: Some(137),
            }),
        )
        .await
        .unwrap();
        assert_eq!(view.contracts.len(), 3);
        assert!(matches!(view.add_token, AddTokenAction::Add { .. }));

        let Json(view) = get_more(
            State(state),
            QueryParams(MoreParams {
                chain_id: 137,
                wallet_chain_id: None,
            }),
        )
        .await
        .unwrap();
        assert!(matches!(view.add_token, AddTokenAction::Warn { .. }));
    }

    #[tokio::test]
    async fn stored_prizes_round_trip_through_handlers() {
        let state = state();
        let address = "0x1111111111111111111111111111111111111111".to_string();

        let Json(loading) = get_prizes(
            State(state.clone()),
            QueryParams(PrizesParams {
                chain_id: 137,
                address: address.clone(),
                draw_id: 3,
            }),
        )
        .await
        .unwrap();
        assert_eq!(loading, ListView::Loading(3));

        post_draw_result(
            State(state.clone()),
            Json(DrawResultBody {
                chain_id: 137,
                address: address.clone(),
                draw_id: 3,
                total_value: "5000000".into(),
                prizes: vec![PrizeAwardable {
                    amount: U256::from(5_000_000u64),
                    pick: 11,
                    distribution_index: 0,
                }],
            }),
        )
        .await
        .unwrap();

        let Json(rows) = get_prizes(
            State(state),
            QueryParams(PrizesParams {
                chain_id: 137,
                address,
                draw_id: 3,
            }),
        )
        .await
        .unwrap();
        assert_eq!(rows.items().len(), 1);
        assert!(rows.items()[0].grand_prize);
    }

    fn abi_draw(id: u32) -> abi::Draw {
        abi::Draw {
            winningRandomNumber: U256::from(id),
            drawId: id,
            timestamp: 1_640_995_200 + u64::from(id) * 86_400,
            beaconPeriodStartedAt: 1_640_995_200 + u64::from(id - 1) * 86_400,
            beaconPeriodSeconds: 86_400,
        }
    }

    /// One prize of 1000 tickets per draw
    fn abi_tier(draw_id: u32) -> abi::PrizeTier {
        let mut tiers = [0u32; 16];
        tiers[0] = 1_000_000_000;
        abi::PrizeTier {
            bitRangeSize: 2,
            drawId: draw_id,
            maxPicksPerUser: 2,
            expiryDuration: 5_184_000,
            endTimestampOffset: 900,
            prize: U256::from(1_000_000_000u64),
            tiers,
        }
    }

    /// A prize pool node. Draws run from 1 to `newest`; the user holds 10 of
    /// 1000 tickets, claimed 4 tickets from draw 2 and nothing elsewhere.
    /// A deposit costs 210k gas at 20 gwei.
    fn pool_node(
        newest: Arc<AtomicU32>,
    ) -> impl Fn(&str, &Value) -> std::result::Result<Value, Value> + Send + Sync + 'static {
        move |method, params| {
            match method {
                "eth_call" => {}
                "eth_estimateGas" => return Ok(json!("0x33450")),
                "eth_gasPrice" => return Ok(json!("0x4a817c800")),
                _ => return Err(json!({ "code": -32601, "message": "method not found" })),
            }
            let data = params[0]["data"]
                .as_str()
                .and_then(|d| hex::decode(d.trim_start_matches("0x")).ok())
                .unwrap_or_default();
            let selector: [u8; 4] = data.get(..4).and_then(|s| s.try_into().ok()).unwrap_or_default();
            let bad_call = || json!({ "code": -32602, "message": "bad call" });

            let returns = match selector {
                s if s == getNewestDrawCall::SELECTOR => {
                    getNewestDrawCall::abi_encode_returns(&abi_draw(newest.load(Ordering::SeqCst)))
                }
                s if s == getOldestDrawCall::SELECTOR => getOldestDrawCall::abi_encode_returns(&abi_draw(1)),
                s if s == getDrawsCall::SELECTOR => {
                    let call = getDrawsCall::abi_decode(&data).map_err(|_| bad_call())?;
                    let draws: Vec<abi::Draw> = call.drawIds.into_iter().map(abi_draw).collect();
                    getDrawsCall::abi_encode_returns(&draws)
                }
                s if s == getPrizeTierCall::SELECTOR => {
                    let call = getPrizeTierCall::abi_decode(&data).map_err(|_| bad_call())?;
                    getPrizeTierCall::abi_encode_returns(&abi_tier(call.drawId))
                }
                s if s == getDrawPayoutBalanceOfCall::SELECTOR => {
                    let call = getDrawPayoutBalanceOfCall::abi_decode(&data).map_err(|_| bad_call())?;
                    let payout = if call.drawId == 2 { 4_000_000u64 } else { 0 };
                    getDrawPayoutBalanceOfCall::abi_encode_returns(&U256::from(payout))
                }
                s if s == getNormalizedBalancesForDrawIdsCall::SELECTOR => {
                    let call = getNormalizedBalancesForDrawIdsCall::abi_decode(&data)
                        .map_err(|_| bad_call())?;
                    let balances = vec![U256::from(9u64); call.drawIds.len()];
                    getNormalizedBalancesForDrawIdsCall::abi_encode_returns(&balances)
                }
                s if s == balanceOfCall::SELECTOR => {
                    balanceOfCall::abi_encode_returns(&U256::from(10_000_000u64))
                }
                s if s == totalSupplyCall::SELECTOR => {
                    totalSupplyCall::abi_encode_returns(&U256::from(1_000_000_000u64))
                }
                s if s == allowanceCall::SELECTOR => allowanceCall::abi_encode_returns(&U256::MAX),
                _ => return Err(bad_call()),
            };
            Ok(json!(format!("0x{}", hex::encode(returns))))
        }
    }

    async fn draws_for_user(state: &AppState) -> Vec<aggregator::PastDrawRow> {
        let Json(view) = get_draws(
            State(state.clone()),
            QueryParams(DrawsParams {
                chain_id: 137,
                address: Some(USER.into()),
            }),
        )
        .await
        .unwrap();
        view.rows.items().to_vec()
    }

    #[tokio::test]
    async fn new_draw_is_not_shown_with_overlays_from_the_old_draw_list() {
        let newest = Arc::new(AtomicU32::new(1));
        let state = state_on(Some(stub_node(pool_node(Arc::clone(&newest))).await));

        let rows = draws_for_user(&state).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, DrawStatus::Neutral);
        assert_eq!(rows[0].prize.as_deref(), Some("1,000"));

        // draw 2 lands; the draw list refreshes while the overlays are still fresh
        newest.store(2, Ordering::SeqCst);
        let (net, rpc) = state.network(137).unwrap();
        let refreshed = state
            .caches
            .draw_datas
            .refresh(137, contracts::all_draw_datas(rpc, net, state.cfg.max_draws))
            .await
            .unwrap();
        assert_eq!(refreshed.data().map(|d| d.len()), Some(2));

        let rows = draws_for_user(&state).await;
        assert_eq!(rows.iter().map(|r| r.draw_id).collect::<Vec<_>>(), vec![2, 1]);
        assert!(
            matches!(&rows[0].status, DrawStatus::Claimed { symbol, .. } if symbol == "PTaUSDC"),
            "draw 2 should show its claim, got {:?}",
            rows[0].status
        );
        assert_eq!(rows[1].status, DrawStatus::Neutral);
    }

    #[tokio::test]
    async fn disconnected_draws_skip_user_overlays() {
        let newest = Arc::new(AtomicU32::new(3));
        let state = state_on(Some(stub_node(pool_node(newest)).await));

        let Json(view) = get_draws(
            State(state.clone()),
            QueryParams(DrawsParams {
                chain_id: 137,
                address: None,
            }),
        )
        .await
        .unwrap();
        assert!(!view.no_draws_yet);
        let rows = view.rows.items();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.status == DrawStatus::Neutral));
    }

    #[tokio::test]
    async fn confirm_view_carries_odds_and_gas() {
        let newest = Arc::new(AtomicU32::new(1));
        let state = state_on(Some(stub_node(pool_node(newest)).await));

        let Json(view) = get_deposit(
            State(state),
            QueryParams(DepositParams {
                chain_id: 137,
                address: USER.into(),
                wallet_chain_id: Some(137),
                amount: "10".into(),
                deposit_tx: None,
                approve_tx: None,
            }),
        )
        .await
        .unwrap();

        let confirm = match view {
            DepositView::Confirm(confirm) => confirm,
            other => panic!("expected confirm view, got {:?}", other),
        };
        assert_eq!(
            confirm.odds,
            Some(OddsChange {
                before: Some("1 in 100.00".into()),
                after: "1 in 50.50".into(),
            })
        );
        assert_eq!(confirm.estimated_gas.as_deref(), Some("0.0042 MATIC"));
    }

    #[tokio::test]
    async fn estimates_are_absent_when_the_node_fails() {
        let url = stub_node(|_, _| Err(json!({ "code": -32000, "message": "node down" }))).await;
        let state = state_on(Some(url));
        let (net, rpc) = state.network(137).unwrap();
        let user = parse_address(USER).unwrap();

        let (odds, gas) = deposit_estimates(&state, net, rpc, user, U256::from(10_000_000u64)).await;
        assert_eq!(odds, None);
        assert_eq!(gas, None);
    }
}
