//! Yield Vault - Share Accounting with Performance Charge
//!
//! A vault issues shares against an underlying asset it forwards to a
//! [`YieldSource`]. Yield grows the vault's total assets and therefore the
//! value of every share; a configurable fraction of that growth is taken as
//! a performance charge, paid by minting new shares to the charge receiver.
//!
//! ## Core Operations
//!
//! - **deposit / mint**: pull assets from the caller, mint shares
//! - **withdraw / redeem**: burn shares, release assets
//! - **accrue_charge**: mint charge shares for earnings since the last snapshot
//! - **set_charge / set_charge_receiver / set_treasury**: owner parameters
//! - **collect**: sweep stray tokens held by the vault to the treasury
//!
//! ## Accrual Model
//!
//! `last_total_holdings` is the total assets seen at the last accrual.
//! Every transacting call first accrues, so charge is always computed on
//! earnings made under the parameters in force when they were earned. View
//! functions simulate the same accrual without minting.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod source;

pub use source::{ReserveYieldSource, YieldSource};

use vaultline_common::{
    access_control::require_controller,
    check,
    constants::charge::MAX_CHARGE,
    guard::{atomic, non_reentrant, ReentrancyGuard},
    math::{self, accrued_charge, floor_sub, safe_add, safe_sub},
    types::{is_zero, Address, AssetId, CallContext, Rounding},
    validation::{require_changed, require_nonzero, require_positive},
    AssetLedger, VaultlineError, VaultlineEvent, VaultlineResult,
};

// ============ Configuration ============

/// Construction parameters for a vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct VaultConfig {
    /// Address of the vault itself
    pub address: Address,
    /// Underlying asset
    pub asset: AssetId,
    /// Yield source the vault supplies to
    pub yield_source: Address,
    /// Controller allowed to change parameters
    pub owner: Address,
    /// Initial charge rate (WAD scale)
    pub charge_rate: u64,
    /// Initial charge receiver, zero only when `charge_rate` is zero
    pub charge_receiver: Address,
    /// Recipient of collected tokens
    pub treasury: Address,
}

/// Collaborators a transacting call reaches out to
pub struct Externals<'a> {
    /// Asset ledger holding the underlying asset
    pub ledger: &'a mut dyn AssetLedger,
    /// The vault's yield source
    pub source: &'a mut dyn YieldSource,
}

impl<'a> Externals<'a> {
    /// Bundle the asset ledger and yield source for one call
    pub fn new(ledger: &'a mut dyn AssetLedger, source: &'a mut dyn YieldSource) -> Self {
        Self { ledger, source }
    }
}

// ============ Vault State ============

/// Yield-bearing share vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct YieldVault {
    address: Address,
    asset: AssetId,
    yield_source: Address,
    owner: Address,
    charge_rate: u64,
    charge_receiver: Address,
    treasury: Address,
    last_total_holdings: u64,
    total_supply: u64,
    balances: BTreeMap<Address, u64>,
    allowances: BTreeMap<(Address, Address), u64>,
    guard: ReentrancyGuard,
}

impl YieldVault {
    /// Create a vault from `config`.
    ///
    /// # Errors
    /// - `ZeroAddress` if the vault, owner or yield source address is zero
    /// - `MaxChargeExceeded` if the charge rate is above `MAX_CHARGE`
    /// - `ZeroChargeRecipient` if a nonzero rate has no receiver
    pub fn new(config: VaultConfig) -> VaultlineResult<Self> {
        require_nonzero(&config.address)?;
        require_nonzero(&config.owner)?;
        require_nonzero(&config.yield_source)?;
        check!(
            config.charge_rate <= MAX_CHARGE,
            VaultlineError::MaxChargeExceeded {
                requested: config.charge_rate,
                maximum: MAX_CHARGE,
            }
        );
        check!(
            config.charge_rate == 0 || !is_zero(&config.charge_receiver),
            VaultlineError::ZeroChargeRecipient
        );

        Ok(Self {
            address: config.address,
            asset: config.asset,
            yield_source: config.yield_source,
            owner: config.owner,
            charge_rate: config.charge_rate,
            charge_receiver: config.charge_receiver,
            treasury: config.treasury,
            last_total_holdings: 0,
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            guard: ReentrancyGuard::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    pub fn yield_source(&self) -> Address {
        self.yield_source
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn charge_rate(&self) -> u64 {
        self.charge_rate
    }

    pub fn charge_receiver(&self) -> Address {
        self.charge_receiver
    }

    pub fn treasury(&self) -> Address {
        self.treasury
    }

    /// Total assets recorded at the last accrual
    pub fn last_total_holdings(&self) -> u64 {
        self.last_total_holdings
    }

    /// Shares in existence, excluding charge shares not yet accrued
    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    pub fn balance_of(&self, holder: &Address) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    fn guard_mut(&mut self) -> &mut ReentrancyGuard {
        &mut self.guard
    }

    // ============ Views ============

    /// Assets the vault could withdraw from its yield source right now
    pub fn total_assets(&self, source: &dyn YieldSource) -> u64 {
        source.max_withdraw(&self.address)
    }

    /// Supply and total assets as they would be after an accrual
    fn accrued_totals(&self, source: &dyn YieldSource) -> VaultlineResult<(u64, u64)> {
        let accrual = accrued_charge(
            self.total_assets(source),
            self.last_total_holdings,
            self.charge_rate,
            self.total_supply,
        )?;
        Ok((safe_add(self.total_supply, accrual.charge_shares)?, accrual.new_total_assets))
    }

    pub fn convert_to_shares(&self, source: &dyn YieldSource, assets: u64) -> VaultlineResult<u64> {
        let (supply, total_assets) = self.accrued_totals(source)?;
        math::convert_to_shares(assets, supply, total_assets, Rounding::Floor)
    }

    pub fn convert_to_assets(&self, source: &dyn YieldSource, shares: u64) -> VaultlineResult<u64> {
        let (supply, total_assets) = self.accrued_totals(source)?;
        math::convert_to_assets(shares, supply, total_assets, Rounding::Floor)
    }

    /// Shares a deposit of `assets` would mint now
    pub fn preview_deposit(&self, source: &dyn YieldSource, assets: u64) -> VaultlineResult<u64> {
        self.convert_to_shares(source, assets)
    }

    /// Assets a mint of `shares` would pull now
    pub fn preview_mint(&self, source: &dyn YieldSource, shares: u64) -> VaultlineResult<u64> {
        let (supply, total_assets) = self.accrued_totals(source)?;
        math::convert_to_assets(shares, supply, total_assets, Rounding::Ceil)
    }

    /// Shares a withdrawal of `assets` would burn now
    pub fn preview_withdraw(&self, source: &dyn YieldSource, assets: u64) -> VaultlineResult<u64> {
        let (supply, total_assets) = self.accrued_totals(source)?;
        math::convert_to_shares(assets, supply, total_assets, Rounding::Ceil)
    }

    /// Assets a redemption of `shares` would release now
    pub fn preview_redeem(&self, source: &dyn YieldSource, shares: u64) -> VaultlineResult<u64> {
        self.convert_to_assets(source, shares)
    }

    pub fn max_deposit(&self, source: &dyn YieldSource) -> u64 {
        source.max_deposit(&self.address)
    }

    pub fn max_mint(&self, source: &dyn YieldSource) -> VaultlineResult<u64> {
        let (supply, total_assets) = self.accrued_totals(source)?;
        match math::convert_to_shares(self.max_deposit(source), supply, total_assets, Rounding::Floor) {
            Err(VaultlineError::Overflow) => Ok(u64::MAX),
            other => other,
        }
    }

    /// Assets `owner` can withdraw, bounded by the source's liquidity
    pub fn max_withdraw(&self, source: &dyn YieldSource, owner: &Address) -> VaultlineResult<u64> {
        let (supply, total_assets) = self.accrued_totals(source)?;
        let owned = math::convert_to_assets(self.balance_of(owner), supply, total_assets, Rounding::Floor)?;
        Ok(owned.min(source.max_withdraw(&self.address)))
    }

    /// Shares `owner` can redeem, bounded by the source's liquidity
    pub fn max_redeem(&self, source: &dyn YieldSource, owner: &Address) -> VaultlineResult<u64> {
        let (supply, total_assets) = self.accrued_totals(source)?;
        let liquid = math::convert_to_shares(
            source.max_withdraw(&self.address),
            supply,
            total_assets,
            Rounding::Floor,
        )?;
        Ok(self.balance_of(owner).min(liquid))
    }

    // ============ Transacting Operations ============

    /// Guarded, all-or-nothing execution of a transacting call
    fn transact<T>(
        &mut self,
        ctx: &mut CallContext,
        body: impl FnOnce(&mut Self, &mut CallContext) -> VaultlineResult<T>,
    ) -> VaultlineResult<T> {
        non_reentrant(self, Self::guard_mut, |vault| atomic(vault, ctx, body))
    }

    /// Mint charge shares for earnings since the last snapshot.
    ///
    /// Returns the new total assets. A second accrual with no new earnings
    /// mints nothing.
    pub fn accrue_charge(&mut self, ctx: &mut CallContext, source: &dyn YieldSource) -> VaultlineResult<u64> {
        self.transact(ctx, |vault, ctx| vault.accrue(ctx, source))
    }

    /// Deposit `assets` from the caller, minting shares to `receiver`
    pub fn deposit(
        &mut self,
        ctx: &mut CallContext,
        ext: &mut Externals<'_>,
        assets: u64,
        receiver: Address,
    ) -> VaultlineResult<u64> {
        self.transact(ctx, |vault, ctx| {
            let new_total_assets = vault.accrue(ctx, &*ext.source)?;
            let shares = math::convert_to_shares(assets, vault.total_supply, new_total_assets, Rounding::Floor)?;
            vault.enter(ctx, ext, assets, shares, receiver)?;
            Ok(shares)
        })
    }

    /// Mint exactly `shares` to `receiver`, pulling the assets they cost
    pub fn mint(
        &mut self,
        ctx: &mut CallContext,
        ext: &mut Externals<'_>,
        shares: u64,
        receiver: Address,
    ) -> VaultlineResult<u64> {
        self.transact(ctx, |vault, ctx| {
            let new_total_assets = vault.accrue(ctx, &*ext.source)?;
            let assets = math::convert_to_assets(shares, vault.total_supply, new_total_assets, Rounding::Ceil)?;
            vault.enter(ctx, ext, assets, shares, receiver)?;
            Ok(assets)
        })
    }

    /// Withdraw exactly `assets` to `receiver`, burning `owner`'s shares
    pub fn withdraw(
        &mut self,
        ctx: &mut CallContext,
        ext: &mut Externals<'_>,
        assets: u64,
        receiver: Address,
        owner: Address,
    ) -> VaultlineResult<u64> {
        self.transact(ctx, |vault, ctx| {
            let new_total_assets = vault.accrue(ctx, &*ext.source)?;
            let shares = math::convert_to_shares(assets, vault.total_supply, new_total_assets, Rounding::Ceil)?;
            vault.exit(ctx, ext, assets, shares, receiver, owner, new_total_assets)?;
            Ok(shares)
        })
    }

    /// Redeem `shares` of `owner`, releasing the assets to `receiver`
    pub fn redeem(
        &mut self,
        ctx: &mut CallContext,
        ext: &mut Externals<'_>,
        shares: u64,
        receiver: Address,
        owner: Address,
    ) -> VaultlineResult<u64> {
        self.transact(ctx, |vault, ctx| {
            let new_total_assets = vault.accrue(ctx, &*ext.source)?;
            let assets = math::convert_to_assets(shares, vault.total_supply, new_total_assets, Rounding::Floor)?;
            vault.exit(ctx, ext, assets, shares, receiver, owner, new_total_assets)?;
            Ok(assets)
        })
    }

    fn accrue(&mut self, ctx: &mut CallContext, source: &dyn YieldSource) -> VaultlineResult<u64> {
        let accrual = accrued_charge(
            self.total_assets(source),
            self.last_total_holdings,
            self.charge_rate,
            self.total_supply,
        )?;

        if accrual.charge_shares > 0 {
            let receiver = self.charge_receiver;
            self.mint_shares(&receiver, accrual.charge_shares)?;
            debug!(
                charge_assets = accrual.charge_assets,
                charge_shares = accrual.charge_shares,
                new_total_assets = accrual.new_total_assets,
                "charge accrued"
            );
            ctx.emit(VaultlineEvent::ChargeAccrued {
                vault: self.address,
                receiver,
                charge_shares: accrual.charge_shares,
                new_total_assets: accrual.new_total_assets,
                timestamp: ctx.timestamp,
            });
        }

        self.last_total_holdings = accrual.new_total_assets;
        Ok(accrual.new_total_assets)
    }

    /// Shared tail of deposit and mint, run after accrual
    fn enter(
        &mut self,
        ctx: &mut CallContext,
        ext: &mut Externals<'_>,
        assets: u64,
        shares: u64,
        receiver: Address,
    ) -> VaultlineResult<()> {
        require_nonzero(&receiver)?;
        require_positive(assets)?;
        require_positive(shares)?;
        let room = ext.source.max_deposit(&self.address);
        check!(
            assets <= room,
            VaultlineError::ExceedsMaximum { amount: assets, maximum: room }
        );

        let caller = ctx.signer;
        let last_total_holdings = safe_add(self.last_total_holdings, assets)?;
        self.mint_shares(&receiver, shares)?;
        self.last_total_holdings = last_total_holdings;

        ext.source.deposit(&mut *ext.ledger, &caller, &self.address, assets)?;

        debug!(assets, shares, "deposit");
        ctx.emit(VaultlineEvent::Deposit {
            vault: self.address,
            caller,
            receiver,
            assets,
            shares,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Shared tail of withdraw and redeem, run after accrual
    #[allow(clippy::too_many_arguments)]
    fn exit(
        &mut self,
        ctx: &mut CallContext,
        ext: &mut Externals<'_>,
        assets: u64,
        shares: u64,
        receiver: Address,
        owner: Address,
        new_total_assets: u64,
    ) -> VaultlineResult<()> {
        require_nonzero(&receiver)?;
        require_positive(assets)?;
        require_positive(shares)?;
        let liquidity = ext.source.max_withdraw(&self.address);
        check!(
            assets <= liquidity,
            VaultlineError::ExceedsMaximum { amount: assets, maximum: liquidity }
        );

        let caller = ctx.signer;
        if caller != owner {
            self.spend_allowance(&owner, &caller, shares)?;
        }
        self.burn_shares(&owner, shares)?;
        self.last_total_holdings = floor_sub(new_total_assets, assets);

        ext.source.withdraw(&mut *ext.ledger, &self.address, assets, &receiver)?;

        debug!(assets, shares, "withdraw");
        ctx.emit(VaultlineEvent::Withdraw {
            vault: self.address,
            caller,
            receiver,
            owner,
            assets,
            shares,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    // ============ Owner Operations ============

    /// Change the charge rate.
    ///
    /// Earnings up to now are charged at the old rate before the change.
    pub fn set_charge(
        &mut self,
        ctx: &mut CallContext,
        source: &dyn YieldSource,
        new_rate: u64,
    ) -> VaultlineResult<()> {
        self.transact(ctx, |vault, ctx| {
            require_controller(&vault.owner, &ctx.signer)?;
            require_changed(&vault.charge_rate, &new_rate)?;
            check!(
                new_rate <= MAX_CHARGE,
                VaultlineError::MaxChargeExceeded { requested: new_rate, maximum: MAX_CHARGE }
            );
            check!(
                new_rate == 0 || !is_zero(&vault.charge_receiver),
                VaultlineError::ZeroChargeRecipient
            );

            vault.accrue(ctx, source)?;
            vault.charge_rate = new_rate;

            ctx.emit(VaultlineEvent::ChargeSet {
                vault: vault.address,
                charge_rate: new_rate,
                timestamp: ctx.timestamp,
            });
            Ok(())
        })
    }

    /// Change the charge receiver, accruing to the old receiver first
    pub fn set_charge_receiver(
        &mut self,
        ctx: &mut CallContext,
        source: &dyn YieldSource,
        new_receiver: Address,
    ) -> VaultlineResult<()> {
        self.transact(ctx, |vault, ctx| {
            require_controller(&vault.owner, &ctx.signer)?;
            require_changed(&vault.charge_receiver, &new_receiver)?;
            check!(
                !is_zero(&new_receiver) || vault.charge_rate == 0,
                VaultlineError::ZeroChargeRecipient
            );

            vault.accrue(ctx, source)?;
            vault.charge_receiver = new_receiver;

            ctx.emit(VaultlineEvent::ChargeReceiverSet {
                vault: vault.address,
                receiver: new_receiver,
                timestamp: ctx.timestamp,
            });
            Ok(())
        })
    }

    pub fn set_treasury(&mut self, ctx: &mut CallContext, new_treasury: Address) -> VaultlineResult<()> {
        require_controller(&self.owner, &ctx.signer)?;
        require_nonzero(&new_treasury)?;
        require_changed(&self.treasury, &new_treasury)?;

        self.treasury = new_treasury;
        ctx.emit(VaultlineEvent::TreasurySet {
            vault: self.address,
            treasury: new_treasury,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Send the vault's whole balance of `token` to the treasury.
    ///
    /// Deposits never rest in the vault, so anything it holds is stray.
    pub fn collect(
        &mut self,
        ctx: &mut CallContext,
        ledger: &mut dyn AssetLedger,
        token: AssetId,
    ) -> VaultlineResult<u64> {
        self.transact(ctx, |vault, ctx| {
            require_nonzero(&vault.treasury)?;
            let amount = ledger.balance_of(&token, &vault.address);
            ledger.transfer(&token, &vault.address, &vault.treasury, amount)?;

            ctx.emit(VaultlineEvent::Collected {
                vault: vault.address,
                token,
                treasury: vault.treasury,
                amount,
                timestamp: ctx.timestamp,
            });
            Ok(amount)
        })
    }

    // ============ Share Ledger ============

    /// Move `amount` shares from the caller to `to`
    pub fn transfer(&mut self, ctx: &mut CallContext, to: Address, amount: u64) -> VaultlineResult<()> {
        let from = ctx.signer;
        self.move_shares(ctx, from, to, amount)
    }

    /// Move `amount` shares from `from` to `to`, spending the caller's allowance
    pub fn transfer_from(
        &mut self,
        ctx: &mut CallContext,
        from: Address,
        to: Address,
        amount: u64,
    ) -> VaultlineResult<()> {
        atomic(self, ctx, |vault, ctx| {
            if ctx.signer != from {
                let spender = ctx.signer;
                vault.spend_allowance(&from, &spender, amount)?;
            }
            vault.move_shares(ctx, from, to, amount)
        })
    }

    /// Let `spender` move up to `amount` of the caller's shares.
    ///
    /// `u64::MAX` is an allowance that is never spent down.
    pub fn approve(&mut self, ctx: &mut CallContext, spender: Address, amount: u64) -> VaultlineResult<()> {
        require_nonzero(&spender)?;
        let owner = ctx.signer;
        self.allowances.insert((owner, spender), amount);
        ctx.emit(VaultlineEvent::SharesApproved {
            vault: self.address,
            owner,
            spender,
            amount,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    fn move_shares(&mut self, ctx: &mut CallContext, from: Address, to: Address, amount: u64) -> VaultlineResult<()> {
        require_nonzero(&to)?;
        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(VaultlineError::InsufficientBalance {
                available: from_balance,
                requested: amount,
            });
        }
        if from != to {
            let to_balance = safe_add(self.balance_of(&to), amount)?;
            self.set_balance(&from, from_balance - amount);
            self.set_balance(&to, to_balance);
        }

        ctx.emit(VaultlineEvent::SharesTransferred {
            vault: self.address,
            from,
            to,
            amount,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    fn spend_allowance(&mut self, owner: &Address, spender: &Address, amount: u64) -> VaultlineResult<()> {
        let allowance = self.allowance(owner, spender);
        if allowance == u64::MAX {
            return Ok(());
        }
        if allowance < amount {
            return Err(VaultlineError::InsufficientAllowance {
                available: allowance,
                requested: amount,
            });
        }
        self.allowances.insert((*owner, *spender), allowance - amount);
        Ok(())
    }

    fn mint_shares(&mut self, to: &Address, shares: u64) -> VaultlineResult<()> {
        let supply = safe_add(self.total_supply, shares)?;
        let balance = safe_add(self.balance_of(to), shares)?;
        self.total_supply = supply;
        self.set_balance(to, balance);
        Ok(())
    }

    fn burn_shares(&mut self, from: &Address, shares: u64) -> VaultlineResult<()> {
        let balance = self.balance_of(from);
        if balance < shares {
            return Err(VaultlineError::InsufficientBalance {
                available: balance,
                requested: shares,
            });
        }
        self.total_supply = safe_sub(self.total_supply, shares)?;
        self.set_balance(from, balance - shares);
        Ok(())
    }

    fn set_balance(&mut self, holder: &Address, balance: u64) {
        if balance == 0 {
            self.balances.remove(holder);
        } else {
            self.balances.insert(*holder, balance);
        }
    }
}
