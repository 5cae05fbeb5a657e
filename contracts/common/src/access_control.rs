//! Access Control Module
//!
//! Permission gating is deliberately thin: each contract has one controller
//! (vault owner, factory controller, token owner), splitters have one
//! partner, and token holders can approve operators to act for them.

use crate::{BTreeMap, VaultlineError, VaultlineResult};
use crate::types::Address;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Require the caller to be the contract's controller.
pub fn require_controller(controller: &Address, caller: &Address) -> VaultlineResult<()> {
    if controller != caller {
        return Err(VaultlineError::UnauthorizedController { caller: *caller });
    }
    Ok(())
}

/// Require the caller to be the splitter's partner.
pub fn require_partner(partner: &Address, caller: &Address) -> VaultlineResult<()> {
    if partner != caller {
        return Err(VaultlineError::UnauthorizedPartner { caller: *caller });
    }
    Ok(())
}

/// Holder -> operator approvals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct OperatorApprovals {
    approvals: BTreeMap<(Address, Address), bool>,
}

impl OperatorApprovals {
    /// Create an empty approval table
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant or revoke `operator` for everything `holder` owns
    pub fn set(&mut self, holder: Address, operator: Address, approved: bool) {
        if approved {
            self.approvals.insert((holder, operator), true);
        } else {
            self.approvals.remove(&(holder, operator));
        }
    }

    /// Returns true if `operator` may act for `holder`
    pub fn is_approved(&self, holder: &Address, operator: &Address) -> bool {
        self.approvals.get(&(*holder, *operator)).copied().unwrap_or(false)
    }

    /// Require `caller` to be `holder` or one of its operators
    pub fn require_holder_or_operator(&self, holder: &Address, caller: &Address) -> VaultlineResult<()> {
        if holder == caller || self.is_approved(holder, caller) {
            return Ok(());
        }
        Err(VaultlineError::UnauthorizedOperator {
            caller: *caller,
            holder: *holder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_controller() {
        assert!(require_controller(&[1u8; 32], &[1u8; 32]).is_ok());
        assert_eq!(
            require_controller(&[1u8; 32], &[2u8; 32]),
            Err(VaultlineError::UnauthorizedController { caller: [2u8; 32] })
        );
    }

    #[test]
    fn test_require_partner() {
        assert_eq!(
            require_partner(&[1u8; 32], &[2u8; 32]),
            Err(VaultlineError::UnauthorizedPartner { caller: [2u8; 32] })
        );
    }

    #[test]
    fn test_operator_approvals() {
        let holder = [1u8; 32];
        let operator = [2u8; 32];
        let mut approvals = OperatorApprovals::new();

        assert!(approvals.require_holder_or_operator(&holder, &holder).is_ok());
        assert!(approvals.require_holder_or_operator(&holder, &operator).is_err());

        approvals.set(holder, operator, true);
        assert!(approvals.require_holder_or_operator(&holder, &operator).is_ok());

        approvals.set(holder, operator, false);
        assert!(!approvals.is_approved(&holder, &operator));
    }
}
