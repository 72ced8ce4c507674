use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::{api::AppState, contracts, query::Query};

const MAX_RETRY_DELAY_SECS: u64 = 120;

/// Next wait after a round: reset on success, double up to the cap on failure
fn next_delay(current: u64, base: u64, failed: bool) -> u64 {
    if failed {
        (current.max(1) * 2).min(MAX_RETRY_DELAY_SECS.max(base))
    } else {
        base
    }
}

/// Keep each network's draw list warm so user requests only fetch overlays.
pub async fn run(state: AppState) -> eyre::Result<()> {
    let base_delay = state.cfg.refresh_secs.max(1);
    let rpc_pause = Duration::from_millis(200); // pause between networks
    let mut retry_delay = base_delay;

    info!(
        "Refresher started for {} networks every {}s",
        state.cfg.networks.len(),
        base_delay
    );

    loop {
        let mut failed = false;

        for net in &state.cfg.networks {
            let Some(rpc) = state.rpcs.get(&net.chain_id) else {
                warn!("No RPC client for {}", net.name);
                continue;
            };

            match rpc.block_number().await {
                Ok(block) => info!("{}: block {}", net.name, block),
                Err(e) => {
                    warn!("{}: RPC failed this round: {}", net.name, e);
                    failed = true;
                    continue;
                }
            }

            let refreshed = state
                .caches
                .draw_datas
                .refresh(
                    net.chain_id,
                    contracts::all_draw_datas(rpc, net, state.cfg.max_draws),
                )
                .await;

            match refreshed {
                Ok(Query::Ready(draws)) => {
                    let missing_tiers = draws.values().filter(|d| d.prize_tier.is_none()).count();
                    info!(
                        "{}: {} draws cached ({} without prize tier)",
                        net.name,
                        draws.len(),
                        missing_tiers
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("{}: draw refresh failed: {}", net.name, e);
                    failed = true;
                }
            }

            sleep(rpc_pause).await; // avoid hammering
        }

        retry_delay = next_delay(retry_delay, base_delay, failed);
        sleep(Duration::from_secs(retry_delay)).await;
    }
}
