//! Fixed-Point Accrual Math
//!
//! Share/asset conversions and performance-charge accrual. Every function is
//! pure: callers pass in the totals they observed and get back the numbers
//! to apply. Products are taken in `u128` and results that do not fit in
//! `u64` are reported as [`VaultlineError::Overflow`].

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::{precision::WAD, vault};
use crate::errors::{VaultlineError, VaultlineResult};
use crate::types::Rounding;

/// Outcome of a charge accrual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ChargeAccrual {
    /// Earnings taken as charge, in assets
    pub charge_assets: u64,
    /// Shares to mint to the charge receiver
    pub charge_shares: u64,
    /// Total assets to use as the new snapshot
    pub new_total_assets: u64,
}

/// `x * y / denominator` with explicit rounding
pub fn mul_div(x: u128, y: u128, denominator: u128, rounding: Rounding) -> VaultlineResult<u64> {
    if denominator == 0 {
        return Err(VaultlineError::DivisionByZero);
    }

    let product = x.checked_mul(y).ok_or(VaultlineError::Overflow)?;
    let quotient = product / denominator;
    let result = match rounding {
        Rounding::Floor => quotient,
        Rounding::Ceil if product % denominator != 0 => quotient + 1,
        Rounding::Ceil => quotient,
    };

    u64::try_from(result).map_err(|_| VaultlineError::Overflow)
}

/// Convert assets to shares against the given totals.
///
/// shares = assets * (total_supply + 10^offset) / (total_assets + 1)
pub fn convert_to_shares(
    assets: u64,
    total_supply: u64,
    total_assets: u64,
    rounding: Rounding,
) -> VaultlineResult<u64> {
    mul_div(
        assets as u128,
        total_supply as u128 + vault::VIRTUAL_SHARES as u128,
        total_assets as u128 + vault::VIRTUAL_ASSETS as u128,
        rounding,
    )
}

/// Convert shares to assets against the given totals.
///
/// assets = shares * (total_assets + 1) / (total_supply + 10^offset)
pub fn convert_to_assets(
    shares: u64,
    total_supply: u64,
    total_assets: u64,
    rounding: Rounding,
) -> VaultlineResult<u64> {
    mul_div(
        shares as u128,
        total_assets as u128 + vault::VIRTUAL_ASSETS as u128,
        total_supply as u128 + vault::VIRTUAL_SHARES as u128,
        rounding,
    )
}

/// Compute the charge owed on earnings since the last snapshot.
///
/// Charge assets are floored; tiny earnings can truncate to zero charge,
/// which is accepted dust loss. The charge is converted to shares against
/// `current_total_assets - charge_assets` because the charge assets are
/// already part of `current_total_assets`.
pub fn accrued_charge(
    current_total_assets: u64,
    last_total_holdings: u64,
    charge_rate: u64,
    total_supply: u64,
) -> VaultlineResult<ChargeAccrual> {
    let earnings = floor_sub(current_total_assets, last_total_holdings);

    let mut accrual = ChargeAccrual {
        charge_assets: 0,
        charge_shares: 0,
        new_total_assets: current_total_assets,
    };

    if earnings == 0 || charge_rate == 0 {
        return Ok(accrual);
    }

    accrual.charge_assets = mul_div(earnings as u128, charge_rate as u128, WAD as u128, Rounding::Floor)?;
    accrual.charge_shares = convert_to_shares(
        accrual.charge_assets,
        total_supply,
        safe_sub(current_total_assets, accrual.charge_assets)?,
        Rounding::Floor,
    )?;

    Ok(accrual)
}

/// `max(0, x - y)`
pub fn floor_sub(x: u64, y: u64) -> u64 {
    x.saturating_sub(y)
}

/// Safe addition with overflow check
pub fn safe_add(a: u64, b: u64) -> VaultlineResult<u64> {
    a.checked_add(b).ok_or(VaultlineError::Overflow)
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u64, b: u64) -> VaultlineResult<u64> {
    a.checked_sub(b).ok_or(VaultlineError::Underflow)
}

/// Safe multiplication with overflow check
pub fn safe_mul(a: u64, b: u64) -> VaultlineResult<u64> {
    a.checked_mul(b).ok_or(VaultlineError::Overflow)
}
