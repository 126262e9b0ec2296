//! # Policy Enforcement Point
//!
//! Gates an action behind a decision. The PEP does not evaluate policy
//! itself: it forwards the request string to a resolver registered in its
//! callback table and reports what the resolver decided. No resolver means
//! no decision, which is reported as [`Decision::Error`].

use crate::registry::{CallbackTable, RegistryError};
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

/// Outcome of an access request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Grant,
    Deny,
    Error,
}

impl Decision {
    /// Reply string sent back over the secure channel
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Grant => "GRANTED",
            Decision::Deny => "DENIED",
            Decision::Error => "ERROR",
        }
    }

    pub fn parse(reply: &str) -> Option<Self> {
        match reply {
            "GRANTED" => Some(Decision::Grant),
            "DENIED" => Some(Decision::Deny),
            "ERROR" => Some(Decision::Error),
            _ => None,
        }
    }

    pub fn is_granted(self) -> bool {
        self == Decision::Grant
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability slots of the PEP callback table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum PepCallback {
    Resolver = 0,
}

const PEP_CALLBACK_SLOTS: usize = 1;

/// Resolver turning a request string into a decision
pub type Resolver = Arc<dyn Fn(&str) -> Decision + Send + Sync>;

/// Policy enforcement point
pub struct PolicyEnforcementPoint {
    callbacks: CallbackTable<Resolver>,
}

impl PolicyEnforcementPoint {
    pub fn new() -> Self {
        Self {
            callbacks: CallbackTable::new(PEP_CALLBACK_SLOTS),
        }
    }

    /// Register a callback; an occupied slot is never replaced
    pub fn register_callback(
        &self,
        slot: PepCallback,
        name: &str,
        resolver: Resolver,
    ) -> Result<(), RegistryError> {
        self.callbacks.register_at(slot as usize, name, resolver)?;
        debug!("Registered PEP {:?} callback '{}'", slot, name);
        Ok(())
    }

    /// Remove a callback
    pub fn unregister_callback(&self, slot: PepCallback) -> Result<(), RegistryError> {
        self.callbacks.unregister(slot as usize).map(|_| ())
    }

    /// Ask the resolver for a decision on `request`
    pub fn request_access(&self, request: &str) -> Decision {
        // Clone out of the table so the resolver runs without the lock held
        let resolver = match self
            .callbacks
            .dispatch(PepCallback::Resolver as usize, |r| Arc::clone(r))
        {
            Ok(resolver) => resolver,
            Err(e) => {
                warn!("No decision for request: {}", e);
                return Decision::Error;
            }
        };

        let decision = resolver(request);
        debug!("Request '{}' -> {}", request, decision);
        decision
    }
}

impl Default for PolicyEnforcementPoint {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PolicyEnforcementPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEnforcementPoint")
            .field("resolver", &self.callbacks.name(PepCallback::Resolver as usize))
            .finish()
    }
}
