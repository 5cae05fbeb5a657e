//! Expiration Group Ledger
//!
//! Every (account, token) balance is split into groups, one per expiry.
//! Groups are kept strictly increasing by `expires_at` and no two share an
//! expiry: units issued with an expiry already present are merged into that
//! group. Spending is FIFO, so the units closest to expiring go first.
//!
//! A group is live while `expires_at > now`. Expired groups stay in place
//! until the next [`ExpirationLedger::prune`] of their key, but they never
//! count toward a balance and are never spent or moved.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::trace;

use vaultline_common::{
    math::safe_add,
    types::{Address, Timestamp, TokenId},
    validation::require_sufficient_balance,
    VaultlineResult,
};

/// Units of one token sharing an expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Group {
    pub balance: u64,
    pub expires_at: Timestamp,
}

impl Group {
    pub fn new(balance: u64, expires_at: Timestamp) -> Self {
        Self { balance, expires_at }
    }

    pub fn is_live(&self, now: Timestamp) -> bool {
        self.expires_at > now
    }
}

/// Groups per (account, token)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ExpirationLedger {
    groups: BTreeMap<(Address, TokenId), Vec<Group>>,
}

impl ExpirationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All groups of `account` in `id`, expired ones included
    pub fn groups(&self, account: &Address, id: TokenId) -> &[Group] {
        self.groups
            .get(&(*account, id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sum of every group, expired ones included
    pub fn total(&self, account: &Address, id: TokenId) -> u64 {
        self.groups(account, id)
            .iter()
            .fold(0u64, |sum, group| sum.saturating_add(group.balance))
    }

    /// Sum of the live groups
    pub fn effective_balance(&self, account: &Address, id: TokenId, now: Timestamp) -> u64 {
        self.groups(account, id)
            .iter()
            .filter(|group| group.is_live(now))
            .fold(0u64, |sum, group| sum.saturating_add(group.balance))
    }

    /// Add `amount` expiring at `expires_at`, merging into an equal expiry
    pub fn upsert_group(
        &mut self,
        account: &Address,
        id: TokenId,
        amount: u64,
        expires_at: Timestamp,
    ) -> VaultlineResult<()> {
        if amount == 0 {
            return Ok(());
        }

        let groups = self.groups.entry((*account, id)).or_default();
        let position = groups.iter().position(|group| group.expires_at >= expires_at);
        match position {
            Some(index) if groups[index].expires_at == expires_at => {
                groups[index].balance = safe_add(groups[index].balance, amount)?;
            }
            Some(index) => groups.insert(index, Group::new(amount, expires_at)),
            None => groups.push(Group::new(amount, expires_at)),
        }
        Ok(())
    }

    /// Spend `amount` from the live groups, oldest first.
    ///
    /// Consumed groups are left at zero for the next prune.
    pub fn debit_fifo(
        &mut self,
        account: &Address,
        id: TokenId,
        amount: u64,
        now: Timestamp,
    ) -> VaultlineResult<()> {
        self.take_fifo(account, id, amount, now).map(|_| ())
    }

    /// Drop empty and expired groups of `account` in `id`.
    ///
    /// Returns the expired balance removed. Survivors keep their order.
    pub fn prune(&mut self, account: &Address, id: TokenId, now: Timestamp) -> u64 {
        let key = (*account, id);
        let Some(groups) = self.groups.get_mut(&key) else {
            return 0;
        };

        let mut expired = 0u64;
        groups.retain(|group| {
            if group.balance == 0 {
                return false;
            }
            if !group.is_live(now) {
                expired = expired.saturating_add(group.balance);
                return false;
            }
            true
        });

        if groups.is_empty() {
            self.groups.remove(&key);
        }
        if expired > 0 {
            trace!(id, expired, "expired groups pruned");
        }
        expired
    }

    /// Move `amount` of live units from `from` to `to`, keeping each slice's
    /// expiry.
    ///
    /// Returns the expired balance pruned from `from` afterwards.
    pub fn transfer_groups(
        &mut self,
        from: &Address,
        to: &Address,
        id: TokenId,
        amount: u64,
        now: Timestamp,
    ) -> VaultlineResult<u64> {
        if from == to || amount == 0 {
            return Ok(0);
        }

        for slice in self.take_fifo(from, id, amount, now)? {
            self.upsert_group(to, id, slice.balance, slice.expires_at)?;
        }
        Ok(self.prune(from, id, now))
    }

    /// FIFO debit returning the consumed slices
    fn take_fifo(
        &mut self,
        account: &Address,
        id: TokenId,
        amount: u64,
        now: Timestamp,
    ) -> VaultlineResult<Vec<Group>> {
        require_sufficient_balance(self.effective_balance(account, id, now), amount)?;

        let mut slices = Vec::new();
        let mut remaining = amount;
        if let Some(groups) = self.groups.get_mut(&(*account, id)) {
            for group in groups.iter_mut().filter(|group| group.is_live(now)) {
                if remaining == 0 {
                    break;
                }
                let take = group.balance.min(remaining);
                if take == 0 {
                    continue;
                }
                group.balance -= take;
                remaining -= take;
                slices.push(Group::new(take, group.expires_at));
            }
        }
        Ok(slices)
    }
}
