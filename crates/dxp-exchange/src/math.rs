// SPDX-License-Identifier: AGPL-3.0-only
//! Integer pricing math (no f32/f64).
//!
//! Amounts are `u128`; every product is taken in 256 bits so reserves of
//! thousands of 18-decimal tokens never overflow. Divisions round down, which
//! always favours the pool.

use crate::DexError;
use dxp_core::BPS_DENOMINATOR;
use ethereum_types::U256;

/// Precision multiplier for scaled prices (10^12).
pub const PRICE_PRECISION: u128 = 1_000_000_000_000;

fn to_u128(v: U256) -> Result<u128, DexError> {
    if v > U256::from(u128::MAX) {
        return Err(DexError::Overflow);
    }
    Ok(v.low_u128())
}

/// `floor(a * b / denom)` with a 256-bit intermediate.
pub fn mul_div(a: u128, b: u128, denom: u128) -> Result<u128, DexError> {
    if denom == 0 {
        return Err(DexError::Overflow);
    }
    to_u128(U256::from(a) * U256::from(b) / U256::from(denom))
}

/// `ceil(a * b / denom)` with a 256-bit intermediate.
pub fn mul_div_ceil(a: u128, b: u128, denom: u128) -> Result<u128, DexError> {
    if denom == 0 {
        return Err(DexError::Overflow);
    }
    let num = U256::from(a) * U256::from(b);
    let d = U256::from(denom);
    let (q, r) = num.div_mod(d);
    to_u128(if r.is_zero() { q } else { q + U256::one() })
}

/// `reserve0 * reserve1` as a 256-bit value.
pub fn product(a: u128, b: u128) -> U256 {
    U256::from(a) * U256::from(b)
}

/// floor(√(a·b)). Always fits in `u128`.
pub fn sqrt_product(a: u128, b: u128) -> u128 {
    product(a, b).integer_sqrt().low_u128()
}

/// Split the fee off an input amount. Returns `(after_fee, fee)`.
pub fn deduct_fee(amount: u128, fee_bps: u128) -> Result<(u128, u128), DexError> {
    let fee = mul_div(amount, fee_bps, BPS_DENOMINATOR)?;
    let after_fee = amount.checked_sub(fee).ok_or(DexError::Overflow)?;
    Ok((after_fee, fee))
}

/// Constant-product output for one hop.
///
/// `amount_out = after_fee * reserve_out / (reserve_in + after_fee)`, which is
/// `reserve_out - reserve_in * reserve_out / (reserve_in + after_fee)` with the
/// rounding taken against the trader. Returns `(amount_out, fee)`.
pub fn get_amount_out(
    amount_in: u128,
    reserve_in: u128,
    reserve_out: u128,
    fee_bps: u128,
) -> Result<(u128, u128), DexError> {
    if amount_in == 0 {
        return Err(DexError::ZeroAmount);
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(DexError::InsufficientLiquidity(
            "pair has no reserves".to_string(),
        ));
    }
    let (after_fee, fee) = deduct_fee(amount_in, fee_bps)?;
    let num = U256::from(after_fee) * U256::from(reserve_out);
    let den = U256::from(reserve_in) + U256::from(after_fee);
    let out = to_u128(num / den)?;
    Ok((out, fee))
}

/// Shares minted for a deposit into a pair that already has liquidity:
/// `min(a * S / reserve_a, b * S / reserve_b)`.
pub fn proportional_shares(
    amount_a: u128,
    amount_b: u128,
    reserve_a: u128,
    reserve_b: u128,
    total_shares: u128,
) -> Result<u128, DexError> {
    let from_a = mul_div(amount_a, total_shares, reserve_a)?;
    let from_b = mul_div(amount_b, total_shares, reserve_b)?;
    Ok(from_a.min(from_b))
}

/// Spot price of `reserve_in`'s asset in units of the other, scaled by
/// [`PRICE_PRECISION`].
pub fn spot_price_scaled(reserve_in: u128, reserve_out: u128) -> u128 {
    if reserve_in == 0 {
        return 0;
    }
    mul_div(reserve_out, PRICE_PRECISION, reserve_in).unwrap_or(u128::MAX)
}

/// Price impact in bps: how far the execution price falls below spot.
pub fn price_impact_bps(
    amount_in: u128,
    amount_out: u128,
    reserve_in: u128,
    reserve_out: u128,
) -> u128 {
    if amount_in == 0 || reserve_in == 0 || reserve_out == 0 {
        return 0;
    }
    // exec / spot = (out / in) / (reserve_out / reserve_in)
    let num = match (U256::from(amount_out) * U256::from(reserve_in)).checked_mul(U256::from(BPS_DENOMINATOR)) {
        Some(n) => n,
        None => return 0,
    };
    let exec_vs_spot = num / (U256::from(amount_in) * U256::from(reserve_out));
    let ratio_bps = exec_vs_spot.min(U256::from(BPS_DENOMINATOR)).low_u128();
    BPS_DENOMINATOR - ratio_bps
}
