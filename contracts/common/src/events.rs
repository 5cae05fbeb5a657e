//! Protocol Events for Vaultline
//!
//! Every state-changing operation appends a structured record to the call's
//! [`EventLog`]. Records are borsh-encodable so an indexer can store them
//! verbatim.

use crate::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use crate::types::{Address, TokenId, Timestamp};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Vault Events (0x01 - 0x1F)
    Deposit = 0x01,
    Withdraw = 0x02,
    ChargeAccrued = 0x03,
    ChargeSet = 0x04,
    ChargeReceiverSet = 0x05,
    TreasurySet = 0x06,
    Collected = 0x07,
    SharesTransferred = 0x08,
    SharesApproved = 0x09,

    // Factory Events (0x20 - 0x3F)
    VaultCreated = 0x20,
    PartnerCreated = 0x21,
    UserVaultSet = 0x22,
    ShareSet = 0x23,

    // Partner Events (0x40 - 0x5F)
    Distributed = 0x40,
    DistributionVaultSet = 0x41,

    // Expiring Token Events (0x60 - 0x7F)
    TokenTransfer = 0x60,
    TokensExpired = 0x61,
    MetadataSet = 0x62,
    PriceSet = 0x63,
    TtlSet = 0x64,
    Purchased = 0x65,
    FundsWithdrawn = 0x66,
    WalletSet = 0x67,
    ApprovalForAll = 0x68,
}

/// Main event enum containing all possible protocol events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum VaultlineEvent {
    // ============ Vault Events ============

    /// Assets deposited, shares minted
    Deposit {
        vault: Address,
        caller: Address,
        receiver: Address,
        assets: u64,
        shares: u64,
        timestamp: Timestamp,
    },

    /// Shares burned, assets released
    Withdraw {
        vault: Address,
        caller: Address,
        receiver: Address,
        owner: Address,
        assets: u64,
        shares: u64,
        timestamp: Timestamp,
    },

    /// Charge shares minted on accrual
    ChargeAccrued {
        vault: Address,
        receiver: Address,
        charge_shares: u64,
        new_total_assets: u64,
        timestamp: Timestamp,
    },

    /// Charge rate changed
    ChargeSet {
        vault: Address,
        charge_rate: u64,
        timestamp: Timestamp,
    },

    /// Charge receiver changed
    ChargeReceiverSet {
        vault: Address,
        receiver: Address,
        timestamp: Timestamp,
    },

    /// Treasury changed
    TreasurySet {
        vault: Address,
        treasury: Address,
        timestamp: Timestamp,
    },

    /// Stray tokens swept to the treasury
    Collected {
        vault: Address,
        token: Address,
        treasury: Address,
        amount: u64,
        timestamp: Timestamp,
    },

    /// Vault shares moved between holders
    SharesTransferred {
        vault: Address,
        from: Address,
        to: Address,
        amount: u64,
        timestamp: Timestamp,
    },

    /// Share allowance set
    SharesApproved {
        vault: Address,
        owner: Address,
        spender: Address,
        amount: u64,
        timestamp: Timestamp,
    },

    // ============ Factory Events ============

    /// New vault created for an introducer
    VaultCreated {
        factory: Address,
        vault: Address,
        introducer: Address,
        charge_receiver: Address,
        timestamp: Timestamp,
    },

    /// New partner splitter created for an introducer
    PartnerCreated {
        factory: Address,
        splitter: Address,
        introducer: Address,
        distribution_vault: Address,
        timestamp: Timestamp,
    },

    /// User's chosen vault recorded
    UserVaultSet {
        user: Address,
        vault: Address,
        timestamp: Timestamp,
    },

    /// Controller share changed
    ShareSet {
        share: u64,
        timestamp: Timestamp,
    },

    // ============ Partner Events ============

    /// Partner revenue redeemed and split
    Distributed {
        splitter: Address,
        vault: Address,
        redeemed_shares: u64,
        redeemed_assets: u64,
        controller_portion: u64,
        partner_portion: u64,
        timestamp: Timestamp,
    },

    /// Partner distribution vault changed
    DistributionVaultSet {
        splitter: Address,
        vault: Address,
        timestamp: Timestamp,
    },

    // ============ Expiring Token Events ============

    /// Tokens issued (from zero), burned (to zero) or transferred
    TokenTransfer {
        operator: Address,
        from: Address,
        to: Address,
        id: TokenId,
        amount: u64,
        timestamp: Timestamp,
    },

    /// Expired balance pruned from an account
    TokensExpired {
        account: Address,
        id: TokenId,
        amount: u64,
        timestamp: Timestamp,
    },

    /// Token metadata created or replaced
    MetadataSet {
        id: TokenId,
        active: bool,
        burnable: bool,
        transferable: bool,
        price: u64,
        ttl: u64,
        timestamp: Timestamp,
    },

    /// Token price changed
    PriceSet {
        id: TokenId,
        price: u64,
        timestamp: Timestamp,
    },

    /// Token ttl changed
    TtlSet {
        id: TokenId,
        ttl: u64,
        timestamp: Timestamp,
    },

    /// Tokens bought
    Purchased {
        buyer: Address,
        account: Address,
        id: TokenId,
        amount: u64,
        cost: u64,
        timestamp: Timestamp,
    },

    /// Sale proceeds sent to the wallet
    FundsWithdrawn {
        wallet: Address,
        amount: u64,
        timestamp: Timestamp,
    },

    /// Proceeds wallet changed
    WalletSet {
        wallet: Address,
        timestamp: Timestamp,
    },

    /// Operator approval changed
    ApprovalForAll {
        holder: Address,
        operator: Address,
        approved: bool,
        timestamp: Timestamp,
    },
}

impl VaultlineEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Deposit { .. } => EventType::Deposit,
            Self::Withdraw { .. } => EventType::Withdraw,
            Self::ChargeAccrued { .. } => EventType::ChargeAccrued,
            Self::ChargeSet { .. } => EventType::ChargeSet,
            Self::ChargeReceiverSet { .. } => EventType::ChargeReceiverSet,
            Self::TreasurySet { .. } => EventType::TreasurySet,
            Self::Collected { .. } => EventType::Collected,
            Self::SharesTransferred { .. } => EventType::SharesTransferred,
            Self::SharesApproved { .. } => EventType::SharesApproved,
            Self::VaultCreated { .. } => EventType::VaultCreated,
            Self::PartnerCreated { .. } => EventType::PartnerCreated,
            Self::UserVaultSet { .. } => EventType::UserVaultSet,
            Self::ShareSet { .. } => EventType::ShareSet,
            Self::Distributed { .. } => EventType::Distributed,
            Self::DistributionVaultSet { .. } => EventType::DistributionVaultSet,
            Self::TokenTransfer { .. } => EventType::TokenTransfer,
            Self::TokensExpired { .. } => EventType::TokensExpired,
            Self::MetadataSet { .. } => EventType::MetadataSet,
            Self::PriceSet { .. } => EventType::PriceSet,
            Self::TtlSet { .. } => EventType::TtlSet,
            Self::Purchased { .. } => EventType::Purchased,
            Self::FundsWithdrawn { .. } => EventType::FundsWithdrawn,
            Self::WalletSet { .. } => EventType::WalletSet,
            Self::ApprovalForAll { .. } => EventType::ApprovalForAll,
        }
    }

    /// Get the ledger time when the event occurred
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Deposit { timestamp, .. }
            | Self::Withdraw { timestamp, .. }
            | Self::ChargeAccrued { timestamp, .. }
            | Self::ChargeSet { timestamp, .. }
            | Self::ChargeReceiverSet { timestamp, .. }
            | Self::TreasurySet { timestamp, .. }
            | Self::Collected { timestamp, .. }
            | Self::SharesTransferred { timestamp, .. }
            | Self::SharesApproved { timestamp, .. }
            | Self::VaultCreated { timestamp, .. }
            | Self::PartnerCreated { timestamp, .. }
            | Self::UserVaultSet { timestamp, .. }
            | Self::ShareSet { timestamp, .. }
            | Self::Distributed { timestamp, .. }
            | Self::DistributionVaultSet { timestamp, .. }
            | Self::TokenTransfer { timestamp, .. }
            | Self::TokensExpired { timestamp, .. }
            | Self::MetadataSet { timestamp, .. }
            | Self::PriceSet { timestamp, .. }
            | Self::TtlSet { timestamp, .. }
            | Self::Purchased { timestamp, .. }
            | Self::FundsWithdrawn { timestamp, .. }
            | Self::WalletSet { timestamp, .. }
            | Self::ApprovalForAll { timestamp, .. } => *timestamp,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Event log for collecting multiple events during execution
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<VaultlineEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: VaultlineEvent) {
        self.events.push(event);
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&VaultlineEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Drop every event recorded after the first `len`.
    ///
    /// Used to discard the records of a call that failed part-way.
    pub fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }

    /// Check if any events were emitted
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if no events were emitted
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        let event = VaultlineEvent::Deposit {
            vault: [1u8; 32],
            caller: [2u8; 32],
            receiver: [2u8; 32],
            assets: 1_000,
            shares: 1_000,
            timestamp: 100,
        };

        assert_eq!(event.event_type(), EventType::Deposit);
        assert_eq!(event.timestamp(), 100);
    }

    #[test]
    fn test_event_serialization() {
        let event = VaultlineEvent::TokensExpired {
            account: [1u8; 32],
            id: 5,
            amount: 50,
            timestamp: 3_600,
        };

        let bytes = event.to_bytes();
        let restored = VaultlineEvent::from_bytes(&bytes).unwrap();

        assert_eq!(event, restored);
    }

    #[test]
    fn test_event_log() {
        let mut log = EventLog::new();

        log.emit(VaultlineEvent::ShareSet { share: 5_000, timestamp: 1 });
        log.emit(VaultlineEvent::WalletSet { wallet: [3u8; 32], timestamp: 2 });
        log.emit(VaultlineEvent::ShareSet { share: 6_000, timestamp: 3 });

        assert_eq!(log.len(), 3);
        assert!(log.has_events());
        assert_eq!(log.filter_by_type(EventType::ShareSet).len(), 2);

        log.truncate(1);
        assert_eq!(log.len(), 1);
    }
}
