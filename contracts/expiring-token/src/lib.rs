//! Expiring Token - Purchasable Multi-Token Ledger
//!
//! A multi-token ledger whose units can expire. Every token id carries
//! metadata (active, burnable, transferable, price, ttl); units issued of a
//! token with a ttl expire `ttl` seconds after issuance.
//!
//! ## Balance Pipeline
//!
//! Every mutation runs the same fixed steps:
//!
//! 1. **gate**: caller permission and token flags
//! 2. **stored balances**: the per (account, id) totals
//! 3. **groups**: the [`expiration::ExpirationLedger`] mirror of those totals
//! 4. **prune**: expired groups of the touched accounts are dropped, and the
//!    expired amount leaves the stored balance with a `TokensExpired` event
//!
//! Stored balances always equal the sum of their groups. Reads go through
//! the groups and count only live units, so a balance drops at expiry even
//! before the next prune.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod expiration;
pub mod metadata;
pub mod pricing;

pub use expiration::{ExpirationLedger, Group};
pub use metadata::{MetadataStore, TokenMetadata};
pub use pricing::{quote, Quote};

use vaultline_common::{
    access_control::{require_controller, OperatorApprovals},
    check,
    guard::atomic,
    math::{safe_add, safe_sub},
    types::{Address, AssetId, CallContext, Timestamp, TokenId, ZERO_ADDRESS},
    validation::{
        require_changed, require_nonzero, require_positive, require_same_length,
        require_sufficient_balance,
    },
    AssetLedger, VaultlineError, VaultlineEvent, VaultlineResult,
};

// ============ Configuration ============

/// Construction parameters for the token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ExpiringTokenConfig {
    /// Address of the token contract, where sale proceeds accumulate
    pub address: Address,
    /// Owner allowed to issue and configure tokens
    pub owner: Address,
    /// Recipient of withdrawn proceeds
    pub wallet: Address,
    /// Asset purchases are paid in, usually `NATIVE_ASSET`
    pub payment_asset: AssetId,
}

// ============ Token State ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ExpiringToken {
    address: Address,
    owner: Address,
    wallet: Address,
    payment_asset: AssetId,
    balances: BTreeMap<(Address, TokenId), u64>,
    metadata: MetadataStore,
    expiration: ExpirationLedger,
    operators: OperatorApprovals,
}

impl ExpiringToken {
    /// Create an empty token ledger.
    ///
    /// # Errors
    /// Returns `ZeroAddress` if the contract, owner or wallet is zero.
    pub fn new(config: ExpiringTokenConfig) -> VaultlineResult<Self> {
        require_nonzero(&config.address)?;
        require_nonzero(&config.owner)?;
        require_nonzero(&config.wallet)?;

        Ok(Self {
            address: config.address,
            owner: config.owner,
            wallet: config.wallet,
            payment_asset: config.payment_asset,
            balances: BTreeMap::new(),
            metadata: MetadataStore::new(),
            expiration: ExpirationLedger::new(),
            operators: OperatorApprovals::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn wallet(&self) -> Address {
        self.wallet
    }

    pub fn metadata(&self, id: TokenId) -> VaultlineResult<&TokenMetadata> {
        self.metadata.get(id)
    }

    pub fn token_count(&self) -> u64 {
        self.metadata.token_count()
    }

    pub fn expiration(&self) -> &ExpirationLedger {
        &self.expiration
    }

    pub fn is_approved_for_all(&self, holder: &Address, operator: &Address) -> bool {
        self.operators.is_approved(holder, operator)
    }

    /// Stored balance, expired-but-unpruned units included
    pub fn stored_balance_of(&self, account: &Address, id: TokenId) -> u64 {
        self.balances.get(&(*account, id)).copied().unwrap_or(0)
    }

    // ============ Balance Views ============

    /// Live balance of `account` in `id` at `now`
    pub fn balance_of(&self, account: &Address, id: TokenId, now: Timestamp) -> u64 {
        self.expiration.effective_balance(account, id, now)
    }

    /// Live balance of `account` in every token, indexed by id
    pub fn balance_of_all(&self, account: &Address, now: Timestamp) -> Vec<u64> {
        (0..self.token_count())
            .map(|id| self.balance_of(account, id, now))
            .collect()
    }

    pub fn balance_of_batch(
        &self,
        accounts: &[Address],
        ids: &[TokenId],
        now: Timestamp,
    ) -> VaultlineResult<Vec<u64>> {
        require_same_length(accounts.len(), ids.len())?;
        Ok(accounts
            .iter()
            .zip(ids)
            .map(|(account, id)| self.balance_of(account, *id, now))
            .collect())
    }

    /// Live groups of `account` in `id`, soonest expiry first
    pub fn balance_details_of(&self, account: &Address, id: TokenId, now: Timestamp) -> Vec<Group> {
        self.expiration
            .groups(account, id)
            .iter()
            .filter(|group| group.is_live(now) && group.balance > 0)
            .copied()
            .collect()
    }

    pub fn balance_details_of_all(&self, account: &Address, now: Timestamp) -> Vec<Vec<Group>> {
        (0..self.token_count())
            .map(|id| self.balance_details_of(account, id, now))
            .collect()
    }

    // ============ Issue / Burn / Transfer ============

    pub fn issue(&mut self, ctx: &mut CallContext, to: Address, id: TokenId, amount: u64) -> VaultlineResult<()> {
        require_controller(&self.owner, &ctx.signer)?;
        atomic(self, ctx, |token, ctx| token.mint_to(ctx, to, id, amount))
    }

    pub fn issue_batch(
        &mut self,
        ctx: &mut CallContext,
        to: Address,
        ids: &[TokenId],
        amounts: &[u64],
    ) -> VaultlineResult<()> {
        require_controller(&self.owner, &ctx.signer)?;
        require_same_length(ids.len(), amounts.len())?;
        atomic(self, ctx, |token, ctx| {
            for (id, amount) in ids.iter().zip(amounts) {
                token.mint_to(ctx, to, *id, *amount)?;
            }
            Ok(())
        })
    }

    /// Burn `amount` of `from`'s live units, oldest first
    pub fn burn(&mut self, ctx: &mut CallContext, from: Address, id: TokenId, amount: u64) -> VaultlineResult<()> {
        self.operators.require_holder_or_operator(&from, &ctx.signer)?;
        atomic(self, ctx, |token, ctx| token.burn_from(ctx, from, id, amount))
    }

    pub fn burn_batch(
        &mut self,
        ctx: &mut CallContext,
        from: Address,
        ids: &[TokenId],
        amounts: &[u64],
    ) -> VaultlineResult<()> {
        self.operators.require_holder_or_operator(&from, &ctx.signer)?;
        require_same_length(ids.len(), amounts.len())?;
        atomic(self, ctx, |token, ctx| {
            for (id, amount) in ids.iter().zip(amounts) {
                token.burn_from(ctx, from, *id, *amount)?;
            }
            Ok(())
        })
    }

    /// Move `amount` live units from `from` to `to`; each unit keeps its expiry
    pub fn transfer(
        &mut self,
        ctx: &mut CallContext,
        from: Address,
        to: Address,
        id: TokenId,
        amount: u64,
    ) -> VaultlineResult<()> {
        self.operators.require_holder_or_operator(&from, &ctx.signer)?;
        atomic(self, ctx, |token, ctx| token.transfer_one(ctx, from, to, id, amount))
    }

    pub fn transfer_batch(
        &mut self,
        ctx: &mut CallContext,
        from: Address,
        to: Address,
        ids: &[TokenId],
        amounts: &[u64],
    ) -> VaultlineResult<()> {
        self.operators.require_holder_or_operator(&from, &ctx.signer)?;
        require_same_length(ids.len(), amounts.len())?;
        atomic(self, ctx, |token, ctx| {
            for (id, amount) in ids.iter().zip(amounts) {
                token.transfer_one(ctx, from, to, *id, *amount)?;
            }
            Ok(())
        })
    }

    /// Let `operator` burn and transfer everything the caller holds
    pub fn set_approval_for_all(
        &mut self,
        ctx: &mut CallContext,
        operator: Address,
        approved: bool,
    ) -> VaultlineResult<()> {
        require_nonzero(&operator)?;
        let holder = ctx.signer;
        self.operators.set(holder, operator, approved);
        ctx.emit(VaultlineEvent::ApprovalForAll {
            holder,
            operator,
            approved,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    fn mint_to(&mut self, ctx: &mut CallContext, to: Address, id: TokenId, amount: u64) -> VaultlineResult<()> {
        let metadata = *self.metadata.get(id)?;
        check!(metadata.active, VaultlineError::TokenInactive { id });
        require_nonzero(&to)?;
        require_positive(amount)?;

        self.credit(&to, id, amount)?;
        self.expiration
            .upsert_group(&to, id, amount, metadata.expiration_for(ctx.timestamp))?;
        self.settle(ctx, to, id)?;

        ctx.emit(VaultlineEvent::TokenTransfer {
            operator: ctx.signer,
            from: ZERO_ADDRESS,
            to,
            id,
            amount,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    fn burn_from(&mut self, ctx: &mut CallContext, from: Address, id: TokenId, amount: u64) -> VaultlineResult<()> {
        check!(self.metadata.get(id)?.burnable, VaultlineError::NotBurnable { id });
        require_positive(amount)?;
        let now = ctx.timestamp;
        require_sufficient_balance(self.balance_of(&from, id, now), amount)?;

        self.debit(&from, id, amount)?;
        self.expiration.debit_fifo(&from, id, amount, now)?;
        self.settle(ctx, from, id)?;

        ctx.emit(VaultlineEvent::TokenTransfer {
            operator: ctx.signer,
            from,
            to: ZERO_ADDRESS,
            id,
            amount,
            timestamp: now,
        });
        Ok(())
    }

    fn transfer_one(
        &mut self,
        ctx: &mut CallContext,
        from: Address,
        to: Address,
        id: TokenId,
        amount: u64,
    ) -> VaultlineResult<()> {
        check!(self.metadata.get(id)?.transferable, VaultlineError::NotTransferable { id });
        require_nonzero(&to)?;
        let now = ctx.timestamp;
        require_sufficient_balance(self.balance_of(&from, id, now), amount)?;

        if from != to {
            self.debit(&from, id, amount)?;
            self.credit(&to, id, amount)?;
        }
        let expired = self.expiration.transfer_groups(&from, &to, id, amount, now)?;
        self.drop_expired(ctx, from, id, expired)?;
        self.settle(ctx, to, id)?;

        ctx.emit(VaultlineEvent::TokenTransfer {
            operator: ctx.signer,
            from,
            to,
            id,
            amount,
            timestamp: now,
        });
        Ok(())
    }

    /// Prune `account`'s groups in `id` and drop the expired amount
    fn settle(&mut self, ctx: &mut CallContext, account: Address, id: TokenId) -> VaultlineResult<()> {
        let expired = self.expiration.prune(&account, id, ctx.timestamp);
        self.drop_expired(ctx, account, id, expired)
    }

    fn drop_expired(
        &mut self,
        ctx: &mut CallContext,
        account: Address,
        id: TokenId,
        expired: u64,
    ) -> VaultlineResult<()> {
        if expired == 0 {
            return Ok(());
        }
        self.debit(&account, id, expired)?;

        debug!(id, expired, "expired balance removed");
        ctx.emit(VaultlineEvent::TokensExpired {
            account,
            id,
            amount: expired,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    fn credit(&mut self, account: &Address, id: TokenId, amount: u64) -> VaultlineResult<()> {
        let balance = safe_add(self.stored_balance_of(account, id), amount)?;
        self.set_stored(account, id, balance);
        Ok(())
    }

    fn debit(&mut self, account: &Address, id: TokenId, amount: u64) -> VaultlineResult<()> {
        let balance = safe_sub(self.stored_balance_of(account, id), amount)?;
        self.set_stored(account, id, balance);
        Ok(())
    }

    fn set_stored(&mut self, account: &Address, id: TokenId, balance: u64) {
        if balance == 0 {
            self.balances.remove(&(*account, id));
        } else {
            self.balances.insert((*account, id), balance);
        }
    }

    // ============ Sale ============

    /// Buy `amount` units of `id` for `account`, paid by the caller.
    ///
    /// Returns the cost pulled from the caller in the payment asset.
    pub fn purchase(
        &mut self,
        ctx: &mut CallContext,
        ledger: &mut dyn AssetLedger,
        account: Address,
        id: TokenId,
        amount: u64,
    ) -> VaultlineResult<u64> {
        atomic(self, ctx, |token, ctx| {
            let quote = quote(token.metadata.get(id)?, amount)?;
            let buyer = ctx.signer;

            token.mint_to(ctx, account, id, amount)?;
            ledger.transfer(&token.payment_asset, &buyer, &token.address, quote.cost)?;

            debug!(id, amount, cost = quote.cost, "tokens purchased");
            ctx.emit(VaultlineEvent::Purchased {
                buyer,
                account,
                id,
                amount,
                cost: quote.cost,
                timestamp: ctx.timestamp,
            });
            Ok(quote.cost)
        })
    }

    /// Send all collected proceeds to the wallet
    pub fn withdraw(&mut self, ctx: &mut CallContext, ledger: &mut dyn AssetLedger) -> VaultlineResult<u64> {
        require_controller(&self.owner, &ctx.signer)?;
        let amount = ledger.balance_of(&self.payment_asset, &self.address);
        require_positive(amount)?;
        ledger.transfer(&self.payment_asset, &self.address, &self.wallet, amount)?;

        ctx.emit(VaultlineEvent::FundsWithdrawn {
            wallet: self.wallet,
            amount,
            timestamp: ctx.timestamp,
        });
        Ok(amount)
    }

    // ============ Owner Configuration ============

    /// Create the next token or replace an existing one's metadata
    pub fn set_metadata(&mut self, ctx: &mut CallContext, metadata: TokenMetadata) -> VaultlineResult<()> {
        require_controller(&self.owner, &ctx.signer)?;
        self.metadata.set(metadata)?;

        ctx.emit(VaultlineEvent::MetadataSet {
            id: metadata.id,
            active: metadata.active,
            burnable: metadata.burnable,
            transferable: metadata.transferable,
            price: metadata.price,
            ttl: metadata.ttl,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    pub fn set_price_of(&mut self, ctx: &mut CallContext, id: TokenId, price: u64) -> VaultlineResult<()> {
        require_controller(&self.owner, &ctx.signer)?;
        let metadata = self.metadata.get_mut(id)?;
        require_changed(&metadata.price, &price)?;
        metadata.price = price;

        ctx.emit(VaultlineEvent::PriceSet {
            id,
            price,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    /// Change the lifetime of units issued from now on
    pub fn set_ttl(&mut self, ctx: &mut CallContext, id: TokenId, ttl: u64) -> VaultlineResult<()> {
        require_controller(&self.owner, &ctx.signer)?;
        let metadata = self.metadata.get_mut(id)?;
        require_changed(&metadata.ttl, &ttl)?;
        metadata.ttl = ttl;

        ctx.emit(VaultlineEvent::TtlSet {
            id,
            ttl,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    pub fn set_wallet(&mut self, ctx: &mut CallContext, wallet: Address) -> VaultlineResult<()> {
        require_controller(&self.owner, &ctx.signer)?;
        require_nonzero(&wallet)?;
        require_changed(&self.wallet, &wallet)?;

        self.wallet = wallet;
        ctx.emit(VaultlineEvent::WalletSet {
            wallet,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }
}
