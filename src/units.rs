// src/units.rs
use alloy::primitives::U256;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{Result, ViewError};

/// Render a raw integer amount as an exact decimal string.
///
/// Trailing fractional zeros are trimmed but one fractional digit is always
/// kept, so zero renders as `"0.0"`.
pub fn format_units(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return format!("{}.0", digits);
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };

    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    let frac_part = if frac_part.is_empty() { "0" } else { frac_part };

    format!("{}.{}", int_part, frac_part)
}

/// Inverse of [`format_units`]. Rejects more fractional digits than `decimals`.
pub fn parse_units(value: &str, decimals: u8) -> Result<U256> {
    let value = value.trim().replace(',', "");
    let invalid = || ViewError::InvalidAmount(value.clone());

    let (int_part, frac_part) = match value.split_once('.') {
        Some((i, f)) => (i, f),
        None => (value.as_str(), ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    if frac_part.len() > decimals as usize {
        return Err(invalid());
    }

    let mut combined = String::with_capacity(int_part.len() + decimals as usize);
    combined.push_str(int_part);
    combined.push_str(frac_part);
    combined.push_str(&"0".repeat(decimals as usize - frac_part.len()));

    let combined = combined.trim_start_matches('0');
    if combined.is_empty() {
        return Ok(U256::ZERO);
    }
    combined.parse::<U256>().map_err(|_| invalid())
}

/// `1234567.891` -> `1,234,567.89`. Rounds half-up to `places` digits.
pub fn pretty_units(raw: U256, decimals: u8, places: usize) -> String {
    let exact = format_units(raw, decimals);
    let (int_part, frac_part) = exact.split_once('.').unwrap_or((exact.as_str(), ""));
    let (int_part, frac_part) = round_half_up(int_part, frac_part, places);

    if places == 0 {
        with_commas(&int_part)
    } else {
        format!("{}.{}", with_commas(&int_part), frac_part)
    }
}

/// Whole-token rendering used for prize headlines.
pub fn whole_units(raw: U256, decimals: u8) -> String {
    let unit = U256::from(10u64).pow(U256::from(decimals));
    with_commas(&(raw / unit).to_string())
}

/// Exact conversion into a `Decimal`. Fails when `raw` does not fit the
/// 96-bit decimal mantissa.
pub fn to_decimal(raw: U256, decimals: u8) -> Result<Decimal> {
    let raw = u128::try_from(raw).map_err(|_| ViewError::AmountOverflow)?;
    let raw = i128::try_from(raw).map_err(|_| ViewError::AmountOverflow)?;
    Decimal::try_from_i128_with_scale(raw, decimals as u32).map_err(|_| ViewError::AmountOverflow)
}

/// USD display: two places, comma grouped. Display only, never used for zero checks.
pub fn pretty_usd(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded);
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    format!("{}.{}", with_commas(int_part), frac_part)
}

pub fn with_commas(int_part: &str) -> String {
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };

    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    format!("{}{}", sign, out)
}

fn round_half_up(int_part: &str, frac_part: &str, places: usize) -> (String, String) {
    if frac_part.len() <= places {
        return (int_part.to_string(), format!("{:0<width$}", frac_part, width = places));
    }

    let keep = &frac_part[..places];
    let round_up = frac_part.as_bytes()[places] >= b'5';
    if !round_up {
        return (int_part.to_string(), keep.to_string());
    }

    // carry through the concatenated digits, then split back
    let mut digits: Vec<u8> = format!("{}{}", int_part, keep).into_bytes();
    let mut i = digits.len();
    loop {
        if i == 0 {
            digits.insert(0, b'1');
            break;
        }
        i -= 1;
        if digits[i] == b'9' {
            digits[i] = b'0';
        } else {
            digits[i] += 1;
            break;
        }
    }

    let digits = String::from_utf8(digits).unwrap_or_default();
    let (i, f) = digits.split_at(digits.len() - places);
    (i.to_string(), f.to_string())
}
