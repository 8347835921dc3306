//! Digital signature operations using Ed25519

use ed25519_dalek::{Signer, Verifier};
use monfundme_core::{Address, MonfundmeError, MonfundmeResult, PublicKey, Signature};

use crate::keys::{address_from_public_key, public_key_to_ed25519, KeyPair};

/// Sign a message using Ed25519
pub fn sign(keypair: &KeyPair, message: &[u8]) -> Signature {
    let signature = keypair.signing_key().sign(message);
    Signature::from_bytes(signature.to_bytes())
}

/// Verify a signature using Ed25519
pub fn verify(
    public_key: &PublicKey,
    message: &[u8],
    signature: &Signature,
) -> MonfundmeResult<()> {
    let verifying_key = public_key_to_ed25519(public_key)?;
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());

    verifying_key
        .verify_strict(message, &sig)
        .map_err(|_| MonfundmeError::InvalidSignature)
}

/// Recover the signer's address from a signature over `message`.
///
/// Ed25519 cannot recover a key from a signature alone, so the claimed key
/// travels with it; the address is only returned once the signature checks
/// out against that key.
pub fn recover_signer(
    public_key: &PublicKey,
    message: &[u8],
    signature: &Signature,
) -> MonfundmeResult<Address> {
    verify(public_key, message, signature)?;
    Ok(address_from_public_key(public_key))
}
