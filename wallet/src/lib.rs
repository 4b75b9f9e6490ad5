//! `obscura-wallet`: the `Account` adapter (spec.md §6) — the narrow
//! key-tree and address-gap slice the synchronization engine drives.
//!
//! Byte-level transaction construction/signing and any notion of "spent"
//! beyond what's passed in by the caller are out of scope here (spec.md §1
//! treats `Account` as an external collaborator); what this crate owns is
//! address derivation and the unused-address-gap bookkeeping that
//! `Ledger::update_account` needs to drive reconciliation.

use std::sync::Mutex;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha2::Sha512;

use obscura_core::adapters::{Account, Utxo};
use obscura_core::registry::LedgerVariant;
use obscura_core::{Error, Result};

type HmacSha512 = Hmac<Sha512>;

/// How many trailing unused addresses per chain `ensure_address_gap` keeps
/// synthesized ahead of the last used one (the BIP44 "address gap" heuristic,
/// spec.md glossary).
pub const ADDRESS_GAP: u32 = 20;

/// Receiving vs. change chain, matching the `chain` column on `AddressRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    Receiving = 0,
    Change = 1,
}

struct ChainState {
    /// Addresses generated so far, in position order.
    addresses: Vec<String>,
    /// Highest position a caller has reported as used, if any.
    /// `ensure_address_gap` keeps `ADDRESS_GAP` addresses generated past it.
    last_used: Option<u32>,
}

impl ChainState {
    fn new() -> Self {
        Self { addresses: Vec::new(), last_used: None }
    }
}

/// A single BIP32-style account: one seed, two derivation chains
/// (receiving/change), addresses synthesized on demand to satisfy the
/// unused-address gap.
pub struct ObscuraAccount {
    id: String,
    seed: [u8; 32],
    variant: LedgerVariant,
    receiving: Mutex<ChainState>,
    change: Mutex<ChainState>,
    /// Outputs the caller has told this account about via
    /// [`Self::set_unspent_outputs`]. A real account backs this onto the
    /// database's UTXO view; this crate only owns key derivation, so it's
    /// kept here as a simple cache.
    utxos: Mutex<Vec<Utxo>>,
}

impl ObscuraAccount {
    /// Builds a fresh account from a 32-byte seed under `variant`'s address
    /// prefix, deriving the account's own identifying address at chain 0,
    /// position 0.
    pub fn from_seed(seed: [u8; 32], variant: LedgerVariant) -> Result<Self> {
        let secp = Secp256k1::signing_only();
        let (root_secret, _) = derive_child(&secp, &seed, Chain::Receiving, 0)?;
        let root_public = PublicKey::from_secret_key(&secp, &root_secret);
        let id = obscura_core::codec::hash160_to_address(
            &variant.pubkey_address_prefix,
            &obscura_core::codec::hash160(&root_public.serialize()),
        );
        Ok(Self {
            id,
            seed,
            variant,
            receiving: Mutex::new(ChainState::new()),
            change: Mutex::new(ChainState::new()),
            utxos: Mutex::new(Vec::new()),
        })
    }

    /// Replaces the account's cached unspent-output set, as reported by
    /// whatever owns the real UTXO view (typically the database adapter).
    pub fn set_unspent_outputs(&self, utxos: Vec<Utxo>) {
        *self.utxos.lock().unwrap() = utxos;
    }

    /// Marks `position` on `chain` as used, so `ensure_address_gap` keeps the
    /// gap measured from it rather than from the chain's start.
    pub fn mark_used(&self, chain: Chain, position: u32) {
        let mut state = self.chain_state(chain).lock().unwrap();
        state.last_used = Some(state.last_used.map_or(position, |p| p.max(position)));
    }

    fn chain_state(&self, chain: Chain) -> &Mutex<ChainState> {
        match chain {
            Chain::Receiving => &self.receiving,
            Chain::Change => &self.change,
        }
    }

    fn address_at(&self, chain: Chain, position: u32) -> Result<String> {
        let secp = Secp256k1::signing_only();
        let (_, public) = derive_child(&secp, &self.seed, chain, position)?;
        Ok(obscura_core::codec::hash160_to_address(
            &self.variant.pubkey_address_prefix,
            &obscura_core::codec::hash160(&public.serialize()),
        ))
    }

    fn ensure_gap_on(&self, chain: Chain) -> Result<Vec<String>> {
        let mut state = self.chain_state(chain).lock().unwrap();
        let target_len = state.last_used.map_or(ADDRESS_GAP, |p| p + 1 + ADDRESS_GAP) as usize;
        let mut created = Vec::new();
        while state.addresses.len() < target_len {
            let position = state.addresses.len() as u32;
            let address = self.address_at(chain, position)?;
            state.addresses.push(address.clone());
            created.push(address);
        }
        Ok(created)
    }
}

/// Derives a child keypair deterministically from `seed`, `chain` and
/// `position`. A compact stand-in for full BIP32: HMAC-SHA512 over the seed
/// keyed by the derivation path, the left half reduced into a valid
/// secp256k1 scalar. Good enough for a light client's own address
/// derivation; it does not produce BIP32-compatible extended keys for
/// exporting to other wallets.
fn derive_child(
    secp: &Secp256k1<secp256k1::SignOnly>,
    seed: &[u8; 32],
    chain: Chain,
    position: u32,
) -> Result<(SecretKey, PublicKey)> {
    let mut mac = HmacSha512::new_from_slice(seed).map_err(|e| Error::Codec(e.to_string()))?;
    mac.update(&(chain as u32).to_be_bytes());
    mac.update(&position.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let secret = SecretKey::from_slice(&digest[..32]).map_err(|e| Error::Codec(e.to_string()))?;
    let public = PublicKey::from_secret_key(secp, &secret);
    Ok((secret, public))
}

#[async_trait]
impl Account for ObscuraAccount {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get_unspent_outputs(&self) -> Result<Vec<Utxo>> {
        Ok(self.utxos.lock().unwrap().clone())
    }

    async fn ensure_address_gap(&self) -> Result<Vec<String>> {
        let mut created = self.ensure_gap_on(Chain::Receiving)?;
        created.extend(self.ensure_gap_on(Chain::Change)?);
        Ok(created)
    }

    async fn get_addresses(&self, max_used_times: Option<u32>) -> Result<Vec<String>> {
        let _ = max_used_times; // usage counts live in the database, out of scope here
        let mut all = self.receiving.lock().unwrap().addresses.clone();
        all.extend(self.change.lock().unwrap().addresses.clone());
        Ok(all)
    }

    fn get_private_key(&self, chain: u32, position: u32) -> Result<Vec<u8>> {
        let chain = if chain == Chain::Change as u32 { Chain::Change } else { Chain::Receiving };
        let secp = Secp256k1::signing_only();
        let (secret, _) = derive_child(&secp, &self.seed, chain, position)?;
        Ok(secret.secret_bytes().to_vec())
    }
}

/// A legacy placeholder kept for any future Schnorr/ed25519-based ledger
/// variant; the account surface above is the one the sync engine drives.
pub fn generate_ed25519_placeholder_keypair() -> ed25519_dalek::Keypair {
    use ed25519_dalek::{PublicKey as EdPublicKey, SecretKey as EdSecretKey};
    let secret = EdSecretKey::from_bytes(&[0u8; 32]).expect("valid ed25519 seed");
    let public = EdPublicKey::from(&secret);
    ed25519_dalek::Keypair { secret, public }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant() -> LedgerVariant {
        LedgerVariant {
            name: "Test Coin".into(),
            symbol: "TST".into(),
            network_name: "unit".into(),
            pubkey_address_prefix: vec![0x00],
            script_address_prefix: vec![0x05],
            extended_public_key_prefix: vec![0x04, 0x88, 0xb2, 0x1e],
            extended_private_key_prefix: vec![0x04, 0x88, 0xad, 0xe4],
            default_fee_per_byte: 1,
        }
    }

    #[tokio::test]
    async fn ensure_address_gap_synthesizes_gap_then_stops() {
        let account = ObscuraAccount::from_seed([7u8; 32], variant()).unwrap();
        let created = account.ensure_address_gap().await.unwrap();
        assert_eq!(created.len() as u32, ADDRESS_GAP * 2);

        // calling again with nothing marked used yields no new addresses
        let created_again = account.ensure_address_gap().await.unwrap();
        assert!(created_again.is_empty());
    }

    #[tokio::test]
    async fn marking_used_extends_the_gap() {
        let account = ObscuraAccount::from_seed([9u8; 32], variant()).unwrap();
        account.ensure_address_gap().await.unwrap();

        account.mark_used(Chain::Receiving, 5);
        let created = account.ensure_address_gap().await.unwrap();
        // six more receiving addresses (positions 20..26) open up the new gap
        assert_eq!(created.len(), 6);
    }

    #[tokio::test]
    async fn private_key_derivation_is_deterministic() {
        let account = ObscuraAccount::from_seed([3u8; 32], variant()).unwrap();
        let k1 = account.get_private_key(0, 4).unwrap();
        let k2 = account.get_private_key(0, 4).unwrap();
        let k3 = account.get_private_key(0, 5).unwrap();
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn account_id_is_a_well_formed_address() {
        let account = ObscuraAccount::from_seed([1u8; 32], variant()).unwrap();
        let hash160 = obscura_core::codec::address_to_hash160(account.id(), 1).unwrap();
        let back = obscura_core::codec::hash160_to_address(&[0x00], &hash160);
        assert_eq!(back, account.id());
    }
}
