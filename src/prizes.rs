// src/prizes.rs
use serde::Serialize;

use crate::{
    models::{ListView, PrizeAwardable, Token},
    units,
};

const PRIZE_SKELETON_ROWS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrizeRow {
    pub key: String,
    pub amount: String,
    pub place: String,
    pub grand_prize: bool,
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

fn medal(distribution_index: u8) -> &'static str {
    match distribution_index {
        0 => " 🏆",
        1 => " 🥈",
        2 => " 🥉",
        _ => "",
    }
}

/// Rows for a user's awardable prizes; `None` means still loading.
///
/// Amounts are scaled by the ticket's decimals, labelled with the token symbol.
pub fn prize_rows(
    prizes: Option<&[PrizeAwardable]>,
    ticket: &Token,
    token: &Token,
) -> ListView<PrizeRow> {
    let Some(prizes) = prizes else {
        return ListView::Loading(PRIZE_SKELETON_ROWS);
    };

    ListView::Items(
        prizes
            .iter()
            .map(|prize| PrizeRow {
                key: prize.pick.to_string(),
                amount: format!(
                    "{} {}",
                    units::pretty_units(prize.amount, ticket.decimals, 2),
                    token.symbol
                ),
                place: format!(
                    "{} Prize{}",
                    ordinal(prize.distribution_index as u32 + 1),
                    medal(prize.distribution_index)
                ),
                grand_prize: prize.distribution_index == 0,
            })
            .collect(),
    )
}
