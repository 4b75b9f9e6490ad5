//! Ledger variant registry (R): a process-wide `symbol_network -> variant`
//! map populated by each variant's `register` call, replacing the
//! metaclass-driven self-registration the Python original used (spec §9
//! design note) with an explicit call a variant invokes once at startup.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::error::Error;
use crate::Result;

/// The capability set a ledger variant declares: address-format prefixes
/// and the default fee rate. The base set is never itself registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerVariant {
    pub name: String,
    pub symbol: String,
    pub network_name: String,
    pub pubkey_address_prefix: Vec<u8>,
    pub script_address_prefix: Vec<u8>,
    pub extended_public_key_prefix: Vec<u8>,
    pub extended_private_key_prefix: Vec<u8>,
    pub default_fee_per_byte: u64,
}

impl LedgerVariant {
    /// `"<symbol>_<network>"`, lowercased — the registry key.
    pub fn id(&self) -> String {
        format!("{}_{}", self.symbol.to_lowercase(), self.network_name.to_lowercase())
    }
}

static REGISTRY: Lazy<RwLock<HashMap<String, LedgerVariant>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Registers `variant` under its id. A collision (two variants claiming
/// the same `symbol_network`) is a programmer error, reported as
/// `Error::RegistryCollision` rather than panicking, so callers that build
/// up a set of optional variants at runtime can surface it cleanly.
pub fn register(variant: LedgerVariant) -> Result<()> {
    let id = variant.id();
    let mut registry = REGISTRY.write().unwrap();
    if registry.contains_key(&id) {
        return Err(Error::RegistryCollision(id));
    }
    registry.insert(id, variant);
    Ok(())
}

/// Looks up a previously registered variant by its `symbol_network` id.
pub fn get(id: &str) -> Option<LedgerVariant> {
    REGISTRY.read().unwrap().get(id).cloned()
}

/// Test-only helper: registry state is process-global, so tests that touch
/// it use distinct ids to avoid interfering with each other.
#[cfg(test)]
mod tests {
    use super::*;

    fn sample(symbol: &str, network: &str) -> LedgerVariant {
        LedgerVariant {
            name: format!("{} {}", symbol, network),
            symbol: symbol.into(),
            network_name: network.into(),
            pubkey_address_prefix: vec![0x00],
            script_address_prefix: vec![0x05],
            extended_public_key_prefix: vec![0x04, 0x88, 0xb2, 0x1e],
            extended_private_key_prefix: vec![0x04, 0x88, 0xad, 0xe4],
            default_fee_per_byte: 10,
        }
    }

    #[test]
    fn register_then_lookup_round_trips() {
        let variant = sample("OBSC", "Main");
        register(variant.clone()).unwrap();
        let found = get("obsc_main").unwrap();
        assert_eq!(found, variant);
    }

    #[test]
    fn duplicate_registration_is_a_collision_error() {
        let variant = sample("OBSC", "Test2");
        register(variant.clone()).unwrap();
        let err = register(variant).unwrap_err();
        assert!(matches!(err, Error::RegistryCollision(id) if id == "obsc_test2"));
    }
}
