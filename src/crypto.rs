// Cryptographic utilities for the negotiation core
//
// Blake3 for commitment fingerprints, Ed25519 for reveal signatures.
// All hashes are domain-separated so a commitment can never be replayed
// as a signature payload or vice versa.

use crate::types::Hash;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use std::path::Path;
use tracing::info;

/// Domain separation prefix for bundle commitment fingerprints
const DOMAIN_BUNDLE_COMMIT: &[u8] = b"MEV_BUNDLE_COMMIT_V1:";

/// Domain separation prefix for reveal signatures
const DOMAIN_BUNDLE_REVEAL: &[u8] = b"MEV_BUNDLE_REVEAL_V1:";

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid public key bytes")]
    InvalidPublicKey,

    #[error("signature verification failed")]
    InvalidSignature,
}

// =============================================================================
// COMMITMENT FINGERPRINT
// =============================================================================

/// Fingerprint of an ordered payload list.
///
/// Each payload is length-framed (u64 LE) before hashing, so the commitment
/// is stable under any payload byte content and sensitive to payload
/// boundaries: `[ab, c]` and `[a, bc]` fingerprint differently.
pub fn fingerprint(payloads: &[Vec<u8>]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(DOMAIN_BUNDLE_COMMIT);
    for payload in payloads {
        hasher.update(&(payload.len() as u64).to_le_bytes());
        hasher.update(payload);
    }
    Hash::from_bytes(*hasher.finalize().as_bytes())
}

/// Check a revealed payload list against its commitment
pub fn verify_commit(commit: &Hash, payloads: &[Vec<u8>]) -> bool {
    fingerprint(payloads) == *commit
}

// =============================================================================
// REVEAL SIGNATURES
// =============================================================================

/// Generate a fresh Ed25519 keypair
pub fn generate_keypair() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Load a keypair from file or generate and persist a new one
pub async fn load_or_generate_keypair(path: &Path) -> anyhow::Result<SigningKey> {
    if path.exists() {
        info!("🔑 Loading keypair from {:?}", path);
        load_keypair(path).await
    } else {
        info!("🔑 Generating new keypair at {:?}", path);
        let key = generate_keypair();
        save_keypair(&key, path).await?;
        Ok(key)
    }
}

/// Save a keypair to file (secret key only; the verifying key is derived)
pub async fn save_keypair(key: &SigningKey, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, hex::encode(key.to_bytes())).await?;

    // Owner-only: the file holds a signing secret (Unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = tokio::fs::metadata(path).await?.permissions();
        perms.set_mode(0o600);
        tokio::fs::set_permissions(path, perms).await?;
    }

    Ok(())
}

/// Load a keypair from its hex-encoded secret key
pub async fn load_keypair(path: &Path) -> anyhow::Result<SigningKey> {
    let hex_bytes = tokio::fs::read_to_string(path).await?;
    let bytes = hex::decode(hex_bytes.trim())?;
    let secret: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("secret key must be 32 bytes"))?;
    Ok(SigningKey::from_bytes(&secret))
}

fn reveal_message(commit: &Hash) -> Vec<u8> {
    let mut msg = Vec::with_capacity(DOMAIN_BUNDLE_REVEAL.len() + 32);
    msg.extend_from_slice(DOMAIN_BUNDLE_REVEAL);
    msg.extend_from_slice(commit.as_bytes());
    msg
}

/// Sign a reveal for the given commitment
pub fn sign_reveal(key: &SigningKey, commit: &Hash) -> [u8; 64] {
    key.sign(&reveal_message(commit)).to_bytes()
}

/// Verify a reveal signature against the scout's registered public key
pub fn verify_reveal(
    public_key: &[u8; 32],
    commit: &Hash,
    signature: &[u8; 64],
) -> Result<(), CryptoError> {
    let key = VerifyingKey::from_bytes(public_key).map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = Signature::from_bytes(signature);
    key.verify(&reveal_message(commit), &sig)
        .map_err(|_| CryptoError::InvalidSignature)
}
