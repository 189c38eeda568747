//! Ed25519 signing/verification and SHA-256d hashing for the chain state
//! engine.
//!
//! # Signing scheme
//!
//! Transaction inputs are signed using a sighash that commits to the
//! transaction version, lock_time, all input outpoints, and all outputs.
//! Signatures and public keys are excluded from the sighash so each input
//! can be signed independently in any order.

use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::CryptoError;
use crate::types::{Hash256, ScriptPubKey, Transaction};

/// SHA-256d: SHA-256 applied twice. Used for txids, header hashes, and the
/// block/undo file checksums of the on-disk formats.
pub fn sha256d(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    Hash256(Sha256::digest(first).into())
}

/// Ed25519 keypair for signing transactions and block headers.
pub struct KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&bytes),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self::from_secret_bytes(self.secret_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Ed25519 public key, used both to verify input signatures and to verify a
/// PoS block's detached header signature.
#[derive(Clone)]
pub struct PublicKey {
    verifying_key: ed25519_dalek::VerifyingKey,
}

impl PublicKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let vk = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key: vk })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// The hash identifying this key as a `PayToPubkeyHash`/`StakeVault`
    /// script owner.
    pub fn pubkey_hash(&self) -> Hash256 {
        pubkey_hash(&self.to_bytes())
    }

    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<(), CryptoError> {
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        self.verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_bytes().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = <[u8; 32]>::deserialize(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// BLAKE3 pubkey hash from raw public key bytes.
pub fn pubkey_hash(pubkey_bytes: &[u8; 32]) -> Hash256 {
    Hash256(blake3::hash(pubkey_bytes).into())
}

fn encode_script(data: &mut Vec<u8>, script: &ScriptPubKey) {
    match script {
        ScriptPubKey::PayToPubkeyHash(h) => {
            data.push(0);
            data.extend_from_slice(h.as_bytes());
        }
        ScriptPubKey::PayToScriptHash(h) => {
            data.push(1);
            data.extend_from_slice(h.as_bytes());
        }
        ScriptPubKey::StakeVault(h) => {
            data.push(2);
            data.extend_from_slice(h.as_bytes());
        }
        ScriptPubKey::Treasury => data.push(3),
        ScriptPubKey::Charity => data.push(4),
        ScriptPubKey::NullData => data.push(5),
    }
}

/// Signing hash (sighash) for a transaction input: commits to version,
/// lock_time, all input outpoints, and all outputs, excluding signatures
/// and public keys so inputs can be signed independently.
pub fn signing_hash(tx: &Transaction, input_index: usize) -> Result<Hash256, CryptoError> {
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }

    let mut data = Vec::new();
    data.extend_from_slice(&tx.version.to_le_bytes());

    data.extend_from_slice(&(tx.inputs.len() as u64).to_le_bytes());
    for input in &tx.inputs {
        data.extend_from_slice(input.previous_output.txid.as_bytes());
        data.extend_from_slice(&input.previous_output.index.to_le_bytes());
    }

    data.extend_from_slice(&(tx.outputs.len() as u64).to_le_bytes());
    for output in &tx.outputs {
        data.extend_from_slice(&output.value.to_le_bytes());
        encode_script(&mut data, &output.script_pubkey);
    }

    data.extend_from_slice(&tx.lock_time.to_le_bytes());
    data.extend_from_slice(&(input_index as u64).to_le_bytes());

    Ok(Hash256(blake3::hash(&data).into()))
}

/// Sign a transaction input in place.
pub fn sign_transaction_input(
    tx: &mut Transaction,
    input_index: usize,
    keypair: &KeyPair,
) -> Result<(), CryptoError> {
    let sighash = signing_hash(tx, input_index)?;
    let signature = keypair.sign(sighash.as_bytes());
    let pubkey_bytes = keypair.public_key().to_bytes();

    tx.inputs[input_index].signature = signature.to_vec();
    tx.inputs[input_index].public_key = pubkey_bytes.to_vec();
    Ok(())
}

/// Verify a transaction input's signature against the pubkey hash demanded
/// by the coin it spends.
pub fn verify_transaction_input(
    tx: &Transaction,
    input_index: usize,
    expected_pubkey_hash: &Hash256,
) -> Result<(), CryptoError> {
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }

    let input = &tx.inputs[input_index];

    let pk_bytes: [u8; 32] = input
        .public_key
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let pk = PublicKey::from_bytes(&pk_bytes)?;

    if pk.pubkey_hash() != *expected_pubkey_hash {
        return Err(CryptoError::PubkeyHashMismatch);
    }

    let sig_bytes: [u8; 64] = input
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature)?;

    let sighash = signing_hash(tx, input_index)?;
    pk.verify(sighash.as_bytes(), &sig_bytes)
}

/// Verify a PoS block header signature, made by the key owning the kernel
/// output's script.
pub fn verify_block_signature(
    header_hash: &Hash256,
    signature: &[u8],
    kernel_pubkey_hash: &Hash256,
    signer_pubkey: &PublicKey,
) -> Result<(), CryptoError> {
    if signer_pubkey.pubkey_hash() != *kernel_pubkey_hash {
        return Err(CryptoError::PubkeyHashMismatch);
    }
    let sig_bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature)?;
    signer_pubkey.verify(header_hash.as_bytes(), &sig_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COIN;
    use crate::types::{OutPoint, TxInput, TxOutput};

    #[test]
    fn sha256d_is_double_sha256() {
        let data = b"meridian";
        let once = Sha256::digest(data);
        let twice = Sha256::digest(once);
        assert_eq!(sha256d(data).as_bytes(), &<[u8; 32]>::from(twice));
    }

    #[test]
    fn keypair_from_secret_deterministic() {
        let seed = [42u8; 32];
        let kp1 = KeyPair::from_secret_bytes(seed);
        let kp2 = KeyPair::from_secret_bytes(seed);
        assert_eq!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn keypair_debug_hides_secret() {
        let kp = KeyPair::generate();
        let debug = format!("{kp:?}");
        let secret_hex = hex::encode(kp.secret_bytes());
        assert!(!debug.contains(&secret_hex));
    }

    #[test]
    fn pubkey_hash_deterministic_and_key_sensitive() {
        let pk1 = KeyPair::from_secret_bytes([1u8; 32]).public_key();
        let pk2 = KeyPair::from_secret_bytes([2u8; 32]).public_key();
        assert_eq!(pk1.pubkey_hash(), pk1.pubkey_hash());
        assert_ne!(pk1.pubkey_hash(), pk2.pubkey_hash());
    }

    fn unsigned_tx(kp: &KeyPair) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint { txid: Hash256([0x11; 32]), index: 0 },
                signature: vec![],
                public_key: vec![],
            }],
            outputs: vec![TxOutput {
                value: 50 * COIN,
                script_pubkey: ScriptPubKey::PayToPubkeyHash(kp.public_key().pubkey_hash()),
            }],
            lock_time: 0,
        }
    }

    #[test]
    fn signing_hash_excludes_signatures_but_not_outputs() {
        let kp = KeyPair::generate();
        let tx1 = unsigned_tx(&kp);
        let mut tx2 = tx1.clone();
        tx2.inputs[0].signature = vec![0xAA; 64];
        tx2.inputs[0].public_key = vec![0xBB; 32];
        assert_eq!(signing_hash(&tx1, 0).unwrap(), signing_hash(&tx2, 0).unwrap());

        let mut tx3 = tx1.clone();
        tx3.outputs[0].value -= 1;
        assert_ne!(signing_hash(&tx1, 0).unwrap(), signing_hash(&tx3, 0).unwrap());
    }

    #[test]
    fn sign_verify_transaction_input_roundtrip() {
        let kp = KeyPair::generate();
        let mut tx = unsigned_tx(&kp);
        let expected_hash = kp.public_key().pubkey_hash();

        sign_transaction_input(&mut tx, 0, &kp).unwrap();

        assert_eq!(tx.inputs[0].signature.len(), 64);
        assert!(verify_transaction_input(&tx, 0, &expected_hash).is_ok());
    }

    #[test]
    fn verify_tx_wrong_pubkey_hash() {
        let kp = KeyPair::generate();
        let mut tx = unsigned_tx(&kp);
        sign_transaction_input(&mut tx, 0, &kp).unwrap();

        let wrong_hash = Hash256([0xFF; 32]);
        let err = verify_transaction_input(&tx, 0, &wrong_hash).unwrap_err();
        assert_eq!(err, CryptoError::PubkeyHashMismatch);
    }

    #[test]
    fn verify_tx_tampered_output_fails() {
        let kp = KeyPair::generate();
        let mut tx = unsigned_tx(&kp);
        let expected_hash = kp.public_key().pubkey_hash();
        sign_transaction_input(&mut tx, 0, &kp).unwrap();

        tx.outputs[0].value = 999;

        let err = verify_transaction_input(&tx, 0, &expected_hash).unwrap_err();
        assert_eq!(err, CryptoError::VerificationFailed);
    }

    #[test]
    fn verify_block_signature_roundtrip() {
        let kp = KeyPair::generate();
        let header_hash = Hash256([0x42; 32]);
        let sig = kp.sign(header_hash.as_bytes());
        let kernel_hash = kp.public_key().pubkey_hash();

        assert!(verify_block_signature(&header_hash, &sig, &kernel_hash, &kp.public_key()).is_ok());
    }

    #[test]
    fn verify_block_signature_wrong_key_owner() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let header_hash = Hash256([0x42; 32]);
        let sig = kp.sign(header_hash.as_bytes());

        let err = verify_block_signature(
            &header_hash,
            &sig,
            &other.public_key().pubkey_hash(),
            &kp.public_key(),
        )
        .unwrap_err();
        assert_eq!(err, CryptoError::PubkeyHashMismatch);
    }
}
