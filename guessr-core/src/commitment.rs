//! # Commit-Reveal Scheme
//!
//! A bettor commits to a guess without disclosing it:
//!
//! 1. compute `guess_digest(guess, nonce)`, a SHA-256 of the guess and the market nonce;
//! 2. sign the digest's hex string with the Bitcoin signed-message scheme, producing a 65-byte
//!    recoverable signature;
//! 3. submit `commitment_hash(signature)` with the bet.
//!
//! On reveal the engine rebuilds the digest from the disclosed guess and the current nonce,
//! recovers the signer from the signature, and checks that the signer's stored commitment is the
//! hash of that same signature. The nonce changes every lifecycle, so a signature revealed in one
//! market never verifies in the next.

use crate::{error::Result, identity::Identity, MarketError};
use bitcoin::{
    hashes::{sha256, Hash},
    sign_message::{signed_msg_hash, MessageSignature},
};
use secp256k1::{Message, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

/// Size of a serialized recoverable message signature
pub const SIGNATURE_LEN: usize = 65;

/// Digest of a guess bound to a market lifecycle.
///
/// Format: `SHA256(guess as i64 big-endian || nonce as u64 big-endian)`
pub fn guess_digest(guess: i64, nonce: u64) -> sha256::Hash {
    let mut hasher = Sha256::new();
    hasher.update(guess.to_be_bytes());
    hasher.update(nonce.to_be_bytes());
    sha256::Hash::from_byte_array(hasher.finalize().into())
}

/// The text a bettor signs for `guess` at `nonce`: the lowercase hex of [`guess_digest`].
///
/// Any wallet implementing Bitcoin `signmessage` with a P2PKH/P2WPKH key can sign it.
pub fn signing_message(guess: i64, nonce: u64) -> String {
    hex::encode(guess_digest(guess, nonce).to_byte_array())
}

/// Commitment submitted with a bet: SHA-256 of the serialized signature.
pub fn commitment_hash(signature: &MessageSignature) -> sha256::Hash {
    sha256::Hash::hash(&signature.serialize())
}

/// Parse a 65-byte recoverable signature from hex.
pub fn parse_signature(signature_hex: &str) -> Result<MessageSignature> {
    let bytes = hex::decode(signature_hex.trim())?;
    if bytes.len() != SIGNATURE_LEN {
        return Err(MarketError::InvalidProof(format!(
            "Invalid signature length: expected {} bytes, got {}",
            SIGNATURE_LEN,
            bytes.len()
        )));
    }
    MessageSignature::from_slice(&bytes)
        .map_err(|e| MarketError::InvalidProof(format!("Invalid signature format: {}", e)))
}

/// Recover the identity that signed `guess` at `nonce`.
///
/// Fails with [`MarketError::InvalidProof`] when no public key can be recovered. A signature
/// over a different guess or nonce recovers some unrelated identity rather than failing, so
/// callers must compare the result against the expected signer.
pub fn recover_signer(guess: i64, nonce: u64, signature: &MessageSignature) -> Result<Identity> {
    let secp = Secp256k1::verification_only();
    let msg_hash = signed_msg_hash(&signing_message(guess, nonce));
    let public_key = signature
        .recover_pubkey(&secp, msg_hash)
        .map_err(|e| MarketError::InvalidProof(format!("Failed to recover signer: {}", e)))?;
    Ok(Identity::from_public_key(&public_key))
}

/// Sign `guess` at `nonce` (for testing and bettor-side tooling).
///
/// # Returns
/// The recoverable signature to keep secret until the reveal, plus the commitment hash to bet
/// with.
pub fn sign_guess(
    secret_key: &SecretKey,
    guess: i64,
    nonce: u64,
) -> (MessageSignature, sha256::Hash) {
    let secp = Secp256k1::signing_only();
    let msg_hash = signed_msg_hash(&signing_message(guess, nonce));
    let message = Message::from_digest(msg_hash.to_byte_array());
    let signature = MessageSignature::new(secp.sign_ecdsa_recoverable(&message, secret_key), true);
    let commitment = commitment_hash(&signature);
    (signature, commitment)
}
