// src/odds.rs
//! Odds of winning at least one prize in a draw, from a ticket balance
//! against the ticket's total supply.
use alloy::primitives::U256;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use crate::{models::PrizeTier, units};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OddsChange {
    /// `None` when the user holds no tickets yet
    pub before: Option<String>,
    pub after: String,
}

/// Prizes awarded per draw: tier 0 has one prize, tier `i` has
/// `2^(bits*i) - 2^(bits*(i-1))`. Tiers without a share award nothing.
pub fn number_of_prizes(tier: &PrizeTier) -> u64 {
    let bits = u32::from(tier.bit_range_size);
    let prizes_in_tier = |index: u32| -> u64 {
        if index == 0 {
            return 1;
        }
        let upper = bits.checked_mul(index).and_then(|s| 1u64.checked_shl(s));
        let lower = bits.checked_mul(index - 1).and_then(|s| 1u64.checked_shl(s));
        match (upper, lower) {
            (Some(upper), Some(lower)) => upper - lower,
            _ => u64::MAX,
        }
    };

    (0u32..)
        .zip(&tier.tiers)
        .filter(|(_, share)| **share != 0)
        .fold(0u64, |acc, (index, _)| acc.saturating_add(prizes_in_tier(index)))
}

fn to_f64(raw: U256, decimals: u8) -> Option<f64> {
    units::to_decimal(raw, decimals).ok()?.to_f64()
}

/// "1 in N" odds of at least one prize, or `None` without a balance
pub fn odds_of_winning(balance: U256, total_supply: U256, prizes: u64, decimals: u8) -> Option<f64> {
    if balance.is_zero() || total_supply.is_zero() || prizes == 0 {
        return None;
    }
    let share = (to_f64(balance, decimals)? / to_f64(total_supply, decimals)?).min(1.0);
    let chance = 1.0 - (1.0 - share).powf(prizes as f64);
    (chance > 0.0).then(|| 1.0 / chance)
}

pub fn format_odds(odds: f64) -> String {
    let rounded = format!("{:.2}", odds);
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));
    format!("1 in {}.{}", units::with_commas(int_part), frac_part)
}

/// Odds now and after depositing `amount` more
pub fn deposit_odds_change(
    balance: U256,
    total_supply: U256,
    amount: U256,
    tier: &PrizeTier,
    decimals: u8,
) -> Option<OddsChange> {
    let prizes = number_of_prizes(tier);
    let after = odds_of_winning(
        balance.saturating_add(amount),
        total_supply.saturating_add(amount),
        prizes,
        decimals,
    )?;
    Some(OddsChange {
        before: odds_of_winning(balance, total_supply, prizes, decimals).map(format_odds),
        after: format_odds(after),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(bit_range_size: u8, shares: &[u32]) -> PrizeTier {
        let mut tiers = vec![0; 16];
        tiers[..shares.len()].copy_from_slice(shares);
        PrizeTier {
            bit_range_size,
            draw_id: 1,
            max_picks_per_user: 2,
            expiry_duration: 5_184_000,
            end_timestamp_offset: 900,
            prize: U256::from(1_000_000_000u64),
            tiers,
        }
    }

    #[test]
    fn prize_count_follows_bit_ranges() {
        assert_eq!(number_of_prizes(&tier(2, &[1])), 1);
        // 1 + (4 - 1) + (16 - 4)
        assert_eq!(number_of_prizes(&tier(2, &[1, 1, 1])), 16);
        // skipped tier awards nothing
        assert_eq!(number_of_prizes(&tier(2, &[1, 0, 1])), 13);
        assert_eq!(number_of_prizes(&tier(2, &[])), 0);
        assert_eq!(number_of_prizes(&tier(8, &[1; 16])), u64::MAX);
    }

    #[test]
    fn single_prize_odds_are_supply_over_balance() {
        let odds = odds_of_winning(U256::from(10_000_000u64), U256::from(1_000_000_000u64), 1, 6).unwrap();
        assert!((odds - 100.0).abs() < 1e-9);
        assert_eq!(format_odds(odds), "1 in 100.00");
        assert_eq!(format_odds(1234.5), "1 in 1,234.50");
        assert_eq!(odds_of_winning(U256::ZERO, U256::from(1u64), 1, 6), None);
    }

    #[test]
    fn deposit_improves_odds() {
        let change = deposit_odds_change(
            U256::from(10_000_000u64),
            U256::from(1_000_000_000u64),
            U256::from(10_000_000u64),
            &tier(2, &[1]),
            6,
        )
        .unwrap();
        assert_eq!(change.before.as_deref(), Some("1 in 100.00"));
        assert_eq!(change.after, "1 in 50.50");

        let first = deposit_odds_change(
            U256::ZERO,
            U256::from(1_000_000_000u64),
            U256::from(10_000_000u64),
            &tier(2, &[1]),
            6,
        )
        .unwrap();
        assert_eq!(first.before, None);
        assert_eq!(first.after, "1 in 101.00");
    }
}
