//! Staking lifecycle hooks
//!
//! Other modules (slashing, distribution) observe staking state changes
//! through this capability set. Listeners are held in an explicit ordered
//! list and invoked synchronously in registration order; calls are
//! fire-and-forget and return nothing, so a listener can never veto a
//! state change. Every method has a no-op default, letting a listener
//! implement only what it needs.

use rust_decimal::Decimal;

use crate::core::Address;

/// Staking event listener capability set
#[allow(unused_variables)]
pub trait StakingHooks {
    /// A validator record was created
    fn after_validator_created(&mut self, operator: Address) {}

    /// A validator record is about to change
    fn before_validator_modified(&mut self, operator: Address) {}

    /// A validator record was deleted
    fn after_validator_removed(&mut self, cons_addr: Address, operator: Address) {}

    /// A validator entered the active set
    fn after_validator_bonded(&mut self, cons_addr: Address, operator: Address) {}

    /// A validator left the active set and started unbonding
    fn after_validator_begin_unbonding(&mut self, cons_addr: Address, operator: Address) {}

    /// A delegation record is about to be created
    fn before_delegation_created(&mut self, delegator: Address, operator: Address) {}

    /// An existing delegation's shares are about to change
    fn before_delegation_shares_modified(&mut self, delegator: Address, operator: Address) {}

    /// A delegation record is about to be deleted
    fn before_delegation_removed(&mut self, delegator: Address, operator: Address) {}

    /// A delegation record was created or changed
    fn after_delegation_modified(&mut self, delegator: Address, operator: Address) {}

    /// A validator is about to be slashed by `fraction`
    fn before_validator_slashed(&mut self, operator: Address, fraction: Decimal) {}
}

/// Ordered listener list
#[derive(Default)]
pub struct HookRegistry {
    listeners: Vec<Box<dyn StakingHooks>>,
}

impl HookRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener; invocation order is registration order
    pub fn register(&mut self, listener: Box<dyn StakingHooks>) {
        self.listeners.push(listener);
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// True if no listeners are registered
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Invoke `f` on every listener in registration order
    pub fn each(&mut self, mut f: impl FnMut(&mut dyn StakingHooks)) {
        for listener in self.listeners.iter_mut() {
            f(listener.as_mut());
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
