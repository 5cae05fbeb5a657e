//! Yield Sources
//!
//! A vault keeps none of its assets itself: every deposit is forwarded to a
//! yield source and every withdrawal is reclaimed from it. What the source
//! reports as withdrawable for the vault is the vault's total assets, so
//! yield shows up to the vault as growth of that number.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::trace;

use vaultline_common::{
    math::{floor_sub, safe_add},
    validation::require_sufficient_balance,
    Address, AssetId, AssetLedger, VaultlineError, VaultlineResult,
};

/// Underlying market a vault supplies its assets to
pub trait YieldSource {
    /// Address the source holds assets under
    fn address(&self) -> Address;

    /// Asset the source accepts
    fn asset(&self) -> AssetId;

    /// Assets `holder` can still supply
    fn max_deposit(&self, holder: &Address) -> u64;

    /// Assets `holder` can withdraw right now, yield included
    fn max_withdraw(&self, holder: &Address) -> u64;

    /// Pull `assets` from `payer` and credit them to `holder`.
    ///
    /// Must not fail for `assets <= max_deposit(holder)` when `payer` holds
    /// enough, and must leave no side effects when it does fail.
    fn deposit(
        &mut self,
        ledger: &mut dyn AssetLedger,
        payer: &Address,
        holder: &Address,
        assets: u64,
    ) -> VaultlineResult<()>;

    /// Debit `assets` from `holder` and send them to `receiver`.
    ///
    /// Must not fail for `assets <= max_withdraw(holder)`.
    fn withdraw(
        &mut self,
        ledger: &mut dyn AssetLedger,
        holder: &Address,
        assets: u64,
        receiver: &Address,
    ) -> VaultlineResult<()>;
}

// ============ Reserve Yield Source ============

/// In-memory yield source backed by an [`AssetLedger`] account.
///
/// Yield is explicit: [`ReserveYieldSource::credit_yield`] moves real assets
/// into the reserve and grows a holder's position by the same amount, so
/// every position is always fully backed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ReserveYieldSource {
    address: Address,
    asset: AssetId,
    positions: BTreeMap<Address, u64>,
    total_positions: u64,
    deposit_cap: u64,
}

impl ReserveYieldSource {
    /// Create an uncapped reserve
    pub fn new(address: Address, asset: AssetId) -> Self {
        Self {
            address,
            asset,
            positions: BTreeMap::new(),
            total_positions: 0,
            deposit_cap: u64::MAX,
        }
    }

    /// Limit the total the reserve accepts
    pub fn with_deposit_cap(mut self, cap: u64) -> Self {
        self.deposit_cap = cap;
        self
    }

    /// Position of `holder`
    pub fn position_of(&self, holder: &Address) -> u64 {
        self.positions.get(holder).copied().unwrap_or(0)
    }

    /// Sum of all positions
    pub fn total_positions(&self) -> u64 {
        self.total_positions
    }

    /// Fund `amount` of yield from `funder` into `holder`'s position
    pub fn credit_yield(
        &mut self,
        ledger: &mut dyn AssetLedger,
        funder: &Address,
        holder: &Address,
        amount: u64,
    ) -> VaultlineResult<()> {
        let position = safe_add(self.position_of(holder), amount)?;
        let total = safe_add(self.total_positions, amount)?;
        ledger.transfer(&self.asset, funder, &self.address, amount)?;

        trace!(amount, "yield credited");
        self.positions.insert(*holder, position);
        self.total_positions = total;
        Ok(())
    }

    /// Write down `holder`'s position by `amount`, capped at the position.
    ///
    /// The written-off assets stay in the reserve account.
    pub fn record_loss(&mut self, holder: &Address, amount: u64) -> u64 {
        let position = self.position_of(holder);
        let loss = position.min(amount);
        self.set_position(holder, position - loss);
        self.total_positions = floor_sub(self.total_positions, loss);
        loss
    }

    fn set_position(&mut self, holder: &Address, amount: u64) {
        if amount == 0 {
            self.positions.remove(holder);
        } else {
            self.positions.insert(*holder, amount);
        }
    }
}

impl YieldSource for ReserveYieldSource {
    fn address(&self) -> Address {
        self.address
    }

    fn asset(&self) -> AssetId {
        self.asset
    }

    fn max_deposit(&self, _holder: &Address) -> u64 {
        floor_sub(self.deposit_cap, self.total_positions)
    }

    fn max_withdraw(&self, holder: &Address) -> u64 {
        self.position_of(holder)
    }

    fn deposit(
        &mut self,
        ledger: &mut dyn AssetLedger,
        payer: &Address,
        holder: &Address,
        assets: u64,
    ) -> VaultlineResult<()> {
        let room = self.max_deposit(holder);
        if assets > room {
            return Err(VaultlineError::ExceedsMaximum {
                amount: assets,
                maximum: room,
            });
        }
        let position = safe_add(self.position_of(holder), assets)?;
        let total = safe_add(self.total_positions, assets)?;
        ledger.transfer(&self.asset, payer, &self.address, assets)?;

        self.set_position(holder, position);
        self.total_positions = total;
        Ok(())
    }

    fn withdraw(
        &mut self,
        ledger: &mut dyn AssetLedger,
        holder: &Address,
        assets: u64,
        receiver: &Address,
    ) -> VaultlineResult<()> {
        let position = self.position_of(holder);
        require_sufficient_balance(position, assets)?;
        ledger.transfer(&self.asset, &self.address, receiver, assets)?;

        self.set_position(holder, position - assets);
        self.total_positions = floor_sub(self.total_positions, assets);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultline_common::AssetBook;

    const ASSET: AssetId = [7u8; 32];
    const RESERVE: Address = [50u8; 32];
    const VAULT: Address = [60u8; 32];
    const ALICE: Address = [1u8; 32];
    const DONOR: Address = [9u8; 32];

    fn setup() -> (AssetBook, ReserveYieldSource) {
        let mut book = AssetBook::new();
        book.issue(&ASSET, &ALICE, 1_000).unwrap();
        book.issue(&ASSET, &DONOR, 1_000).unwrap();
        (book, ReserveYieldSource::new(RESERVE, ASSET))
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let (mut book, mut source) = setup();

        source.deposit(&mut book, &ALICE, &VAULT, 400).unwrap();
        assert_eq!(source.max_withdraw(&VAULT), 400);
        assert_eq!(book.balance_of(&ASSET, &RESERVE), 400);

        source.withdraw(&mut book, &VAULT, 150, &ALICE).unwrap();
        assert_eq!(source.max_withdraw(&VAULT), 250);
        assert_eq!(book.balance_of(&ASSET, &ALICE), 750);
    }

    #[test]
    fn test_credit_yield_is_backed() {
        let (mut book, mut source) = setup();
        source.deposit(&mut book, &ALICE, &VAULT, 1_000).unwrap();
        source.credit_yield(&mut book, &DONOR, &VAULT, 100).unwrap();

        assert_eq!(source.max_withdraw(&VAULT), 1_100);
        assert_eq!(book.balance_of(&ASSET, &RESERVE), 1_100);
        assert_eq!(source.total_positions(), 1_100);
    }

    #[test]
    fn test_deposit_cap() {
        let (mut book, source) = setup();
        let mut source = source.with_deposit_cap(500);

        source.deposit(&mut book, &ALICE, &VAULT, 300).unwrap();
        assert_eq!(source.max_deposit(&VAULT), 200);

        let result = source.deposit(&mut book, &ALICE, &VAULT, 201);
        assert_eq!(result, Err(VaultlineError::ExceedsMaximum { amount: 201, maximum: 200 }));
        assert_eq!(book.balance_of(&ASSET, &ALICE), 700);
    }

    #[test]
    fn test_withdraw_more_than_position_fails() {
        let (mut book, mut source) = setup();
        source.deposit(&mut book, &ALICE, &VAULT, 100).unwrap();

        assert!(source.withdraw(&mut book, &VAULT, 101, &ALICE).is_err());
        assert_eq!(source.max_withdraw(&VAULT), 100);
    }

    #[test]
    fn test_record_loss_capped() {
        let (mut book, mut source) = setup();
        source.deposit(&mut book, &ALICE, &VAULT, 100).unwrap();

        assert_eq!(source.record_loss(&VAULT, 30), 30);
        assert_eq!(source.record_loss(&VAULT, 500), 70);
        assert_eq!(source.max_withdraw(&VAULT), 0);
    }
}
