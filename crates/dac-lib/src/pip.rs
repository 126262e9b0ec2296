//! # Policy Information Point
//!
//! Attribute providers plugged into a fixed table of five slots. An
//! attribute URI looks like `authority:policy_id/type?value`; the
//! authority names the provider that answers it.

use crate::registry::{CallbackTable, RegistryError};
use log::debug;
use std::sync::Arc;

/// Number of provider slots
pub const MAX_PIP_PLUGINS: usize = 5;

/// Longest accepted attribute URI
pub const MAX_URI_LEN: usize = 1024;

/// One attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub kind: String,
    pub value: String,
}

/// Source of attribute values
pub trait AttributeProvider: Send + Sync {
    /// Answer `uri`, or `None` if this provider has no such attribute
    fn acquire(&self, uri: &str) -> Option<Attribute>;
}

impl<F> AttributeProvider for F
where
    F: Fn(&str) -> Option<Attribute> + Send + Sync,
{
    fn acquire(&self, uri: &str) -> Option<Attribute> {
        self(uri)
    }
}

/// Authority part of an attribute URI
pub fn uri_authority(uri: &str) -> Option<&str> {
    let (authority, _) = uri.split_once(':')?;
    if authority.is_empty() {
        None
    } else {
        Some(authority)
    }
}

/// Policy information point
pub struct PolicyInformationPoint {
    providers: CallbackTable<Arc<dyn AttributeProvider>>,
}

impl PolicyInformationPoint {
    pub fn new() -> Self {
        Self {
            providers: CallbackTable::new(MAX_PIP_PLUGINS),
        }
    }

    /// Register a provider under its authority name
    pub fn register_plugin(
        &self,
        authority: &str,
        provider: Arc<dyn AttributeProvider>,
    ) -> Result<usize, RegistryError> {
        let index = self.providers.register(authority, provider)?;
        debug!("Registered PIP plugin '{}' in slot {}", authority, index);
        Ok(index)
    }

    pub fn unregister_plugin(&self, index: usize) -> Result<(), RegistryError> {
        self.providers.unregister(index).map(|_| ())
    }

    /// Look up an attribute through the provider owning the URI's authority
    pub fn get_attribute(&self, uri: &str) -> Option<Attribute> {
        if uri.len() > MAX_URI_LEN {
            return None;
        }
        let authority = uri_authority(uri)?;
        self.providers
            .find_map(|name, provider| {
                if name == authority {
                    provider.acquire(uri)
                } else {
                    None
                }
            })
            .ok()
            .flatten()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for PolicyInformationPoint {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(value: &'static str) -> Arc<dyn AttributeProvider> {
        Arc::new(move |_: &str| {
            Some(Attribute {
                kind: "string".into(),
                value: value.into(),
            })
        })
    }

    #[test]
    fn test_uri_authority() {
        assert_eq!(uri_authority("wallet:abc/balance?x"), Some("wallet"));
        assert_eq!(uri_authority(":abc"), None);
        assert_eq!(uri_authority("no-authority"), None);
    }

    #[test]
    fn test_routes_by_authority() {
        let pip = PolicyInformationPoint::new();
        pip.register_plugin("wallet", fixed("100")).unwrap();
        pip.register_plugin("gps", fixed("45.25,19.84")).unwrap();

        let attr = pip.get_attribute("gps:policy/location?now").unwrap();
        assert_eq!(attr.value, "45.25,19.84");
        assert_eq!(pip.get_attribute("wallet:p/balance").unwrap().value, "100");
        assert!(pip.get_attribute("can:p/speed").is_none());
    }

    #[test]
    fn test_plugin_limit() {
        let pip = PolicyInformationPoint::new();
        for i in 0..MAX_PIP_PLUGINS {
            pip.register_plugin(&format!("p{}", i), fixed("v")).unwrap();
        }
        assert_eq!(
            pip.register_plugin("extra", fixed("v")),
            Err(RegistryError::Full(MAX_PIP_PLUGINS))
        );
        assert_eq!(
            pip.register_plugin("p0", fixed("v")).unwrap_err(),
            RegistryError::AlreadyRegistered("p0".into())
        );

        pip.unregister_plugin(0).unwrap();
        assert_eq!(
            pip.register_plugin("p1", fixed("v")),
            Err(RegistryError::AlreadyRegistered("p1".into()))
        );
        assert_eq!(pip.len(), MAX_PIP_PLUGINS - 1);
    }

    #[test]
    fn test_oversized_uri() {
        let pip = PolicyInformationPoint::new();
        pip.register_plugin("a", fixed("v")).unwrap();
        let uri = format!("a:{}", "x".repeat(MAX_URI_LEN));
        assert!(pip.get_attribute(&uri).is_none());
    }
}
