//! Token Metadata Store
//!
//! Ids are dense: token `n` exists once `n` entries were created, and the
//! next id to create is always the current count. Metadata is replaced
//! wholesale by the owner; the ledger only ever reads it.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use vaultline_common::{
    constants::token::PERPETUAL,
    types::{Timestamp, TokenId},
    VaultlineError, VaultlineResult,
};

/// Per-token configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TokenMetadata {
    pub id: TokenId,
    /// Inactive tokens cannot be issued or purchased
    pub active: bool,
    pub burnable: bool,
    pub transferable: bool,
    /// Price per unit in the payment asset, zero when not for sale
    pub price: u64,
    /// Lifetime of newly issued units in seconds, zero for perpetual
    pub ttl: u64,
}

impl TokenMetadata {
    /// Expiry of units issued at `now`
    pub fn expiration_for(&self, now: Timestamp) -> Timestamp {
        if self.ttl == 0 {
            PERPETUAL
        } else {
            now.saturating_add(self.ttl)
        }
    }
}

/// Arena of token metadata indexed by id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct MetadataStore {
    tokens: Vec<TokenMetadata>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next created token receives
    pub fn next_id(&self) -> TokenId {
        self.tokens.len() as TokenId
    }

    pub fn token_count(&self) -> u64 {
        self.tokens.len() as u64
    }

    pub fn get(&self, id: TokenId) -> VaultlineResult<&TokenMetadata> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.tokens.get(index))
            .ok_or(VaultlineError::TokenNotFound { id })
    }

    pub fn get_mut(&mut self, id: TokenId) -> VaultlineResult<&mut TokenMetadata> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.tokens.get_mut(index))
            .ok_or(VaultlineError::TokenNotFound { id })
    }

    /// Create token `metadata.id` if it is the next id, replace it if it exists
    pub fn set(&mut self, metadata: TokenMetadata) -> VaultlineResult<()> {
        if metadata.id == self.next_id() {
            self.tokens.push(metadata);
            return Ok(());
        }
        *self.get_mut(metadata.id)? = metadata;
        Ok(())
    }
}
