//! Pricing
//!
//! Tokens with a nonzero price can be bought with the payment asset at a
//! flat unit price.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use vaultline_common::{
    check,
    math::safe_mul,
    types::TokenId,
    validation::require_positive,
    VaultlineError, VaultlineResult,
};

use crate::metadata::TokenMetadata;

/// Price of a purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Quote {
    pub id: TokenId,
    pub amount: u64,
    pub unit_price: u64,
    pub cost: u64,
}

/// Quote `amount` units of `metadata`'s token.
///
/// # Errors
/// - `ZeroAmount` for an empty purchase
/// - `TokenInactive` if the token is switched off
/// - `NotPurchasable` if the token has no price
/// - `Overflow` if the cost does not fit in `u64`
pub fn quote(metadata: &TokenMetadata, amount: u64) -> VaultlineResult<Quote> {
    require_positive(amount)?;
    check!(metadata.active, VaultlineError::TokenInactive { id: metadata.id });
    check!(metadata.price > 0, VaultlineError::NotPurchasable { id: metadata.id });

    Ok(Quote {
        id: metadata.id,
        amount,
        unit_price: metadata.price,
        cost: safe_mul(metadata.price, amount)?,
    })
}
