//! Asset Transfer Operations
//!
//! The vaults, splitters and the expiring token move fungible assets through
//! the [`AssetLedger`] trait; how balances are actually kept is the host
//! ledger's business. [`AssetBook`] is the in-memory ledger used to drive the
//! contracts end to end.
//!
//! ## Key Features
//!
//! - **Multi-asset**: balances keyed by `(asset, owner)`
//! - **Conservation**: transfers never create or destroy value
//! - **Supply Tracking**: issuance and burns update per-asset supply

use crate::{BTreeMap, VaultlineError, VaultlineResult};
use crate::types::{Address, AssetId};
use crate::validation::require_sufficient_balance;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

// ============================================================================
// Ledger Interface
// ============================================================================

/// Fungible asset ledger the contracts call into
pub trait AssetLedger {
    /// Balance of `owner` in `asset`
    fn balance_of(&self, asset: &AssetId, owner: &Address) -> u64;

    /// Move `amount` of `asset` from `from` to `to`.
    ///
    /// Must fail without side effects if `from` holds less than `amount`.
    fn transfer(&mut self, asset: &AssetId, from: &Address, to: &Address, amount: u64) -> VaultlineResult<()>;
}

// ============================================================================
// In-Memory Ledger
// ============================================================================

/// Supply statistics for one asset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct AssetSupply {
    /// Current total supply
    pub total_supply: u64,
    /// Total issued (cumulative)
    pub total_issued: u64,
    /// Total burned (cumulative)
    pub total_burned: u64,
}

/// In-memory multi-asset ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct AssetBook {
    balances: BTreeMap<(AssetId, Address), u64>,
    supplies: BTreeMap<AssetId, AssetSupply>,
}

impl AssetBook {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Create new units of `asset` for `to`
    pub fn issue(&mut self, asset: &AssetId, to: &Address, amount: u64) -> VaultlineResult<()> {
        let supply = self.supplies.entry(*asset).or_default();
        let total_supply = supply.total_supply.checked_add(amount).ok_or(VaultlineError::Overflow)?;
        let balance = self.balances.get(&(*asset, *to)).copied().unwrap_or(0);
        let new_balance = balance.checked_add(amount).ok_or(VaultlineError::Overflow)?;

        supply.total_supply = total_supply;
        supply.total_issued = supply.total_issued.saturating_add(amount);
        self.balances.insert((*asset, *to), new_balance);
        Ok(())
    }

    /// Destroy units of `asset` held by `from`
    pub fn burn(&mut self, asset: &AssetId, from: &Address, amount: u64) -> VaultlineResult<()> {
        let balance = self.balance_of(asset, from);
        require_sufficient_balance(balance, amount)?;

        self.set_balance(asset, from, balance - amount);
        let supply = self.supplies.entry(*asset).or_default();
        supply.total_supply = supply.total_supply.saturating_sub(amount);
        supply.total_burned = supply.total_burned.saturating_add(amount);
        Ok(())
    }

    /// Supply statistics for `asset`
    pub fn supply_of(&self, asset: &AssetId) -> AssetSupply {
        self.supplies.get(asset).cloned().unwrap_or_default()
    }

    fn set_balance(&mut self, asset: &AssetId, owner: &Address, balance: u64) {
        if balance == 0 {
            self.balances.remove(&(*asset, *owner));
        } else {
            self.balances.insert((*asset, *owner), balance);
        }
    }
}

impl AssetLedger for AssetBook {
    fn balance_of(&self, asset: &AssetId, owner: &Address) -> u64 {
        self.balances.get(&(*asset, *owner)).copied().unwrap_or(0)
    }

    fn transfer(&mut self, asset: &AssetId, from: &Address, to: &Address, amount: u64) -> VaultlineResult<()> {
        let from_balance = self.balance_of(asset, from);
        require_sufficient_balance(from_balance, amount)?;
        if from == to || amount == 0 {
            return Ok(());
        }

        let to_balance = self
            .balance_of(asset, to)
            .checked_add(amount)
            .ok_or(VaultlineError::Overflow)?;
        self.set_balance(asset, from, from_balance - amount);
        self.set_balance(asset, to, to_balance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSET: AssetId = [7u8; 32];

    fn alice() -> Address {
        [1u8; 32]
    }

    fn bob() -> Address {
        [2u8; 32]
    }

    #[test]
    fn test_issue_and_transfer() {
        let mut book = AssetBook::new();
        book.issue(&ASSET, &alice(), 1_000).unwrap();
        book.transfer(&ASSET, &alice(), &bob(), 400).unwrap();

        assert_eq!(book.balance_of(&ASSET, &alice()), 600);
        assert_eq!(book.balance_of(&ASSET, &bob()), 400);
        assert_eq!(book.supply_of(&ASSET).total_supply, 1_000);
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut book = AssetBook::new();
        book.issue(&ASSET, &alice(), 100).unwrap();
        let result = book.transfer(&ASSET, &alice(), &bob(), 101);
        assert_eq!(
            result,
            Err(VaultlineError::InsufficientBalance { available: 100, requested: 101 })
        );
        assert_eq!(book.balance_of(&ASSET, &alice()), 100);
    }

    #[test]
    fn test_self_transfer_keeps_balance() {
        let mut book = AssetBook::new();
        book.issue(&ASSET, &alice(), 100).unwrap();
        book.transfer(&ASSET, &alice(), &alice(), 60).unwrap();
        assert_eq!(book.balance_of(&ASSET, &alice()), 100);
    }

    #[test]
    fn test_burn_updates_supply() {
        let mut book = AssetBook::new();
        book.issue(&ASSET, &alice(), 100).unwrap();
        book.burn(&ASSET, &alice(), 30).unwrap();

        let supply = book.supply_of(&ASSET);
        assert_eq!(supply.total_supply, 70);
        assert_eq!(supply.total_issued, 100);
        assert_eq!(supply.total_burned, 30);
        assert!(book.burn(&ASSET, &bob(), 1).is_err());
    }
}
