//! Threshold signature quorum over proposal outcomes

use monfundme_core::{
    Address, Hash, MonfundmeError, MonfundmeResult, ProposalId, PublicKey, ResultHash, Signature,
};
use monfundme_crypto::hashing::{hash, hash_multiple};
use monfundme_crypto::keys::KeyPair;
use monfundme_crypto::signing::{recover_signer, sign};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

const ATTESTATION_DOMAIN: &[u8] = b"MONFUNDME_ATTESTATION:";
const APPROVAL_PHRASE: &[u8] = b"YES_CREATE_THIS_CAMPAIGN";

/// Result hash that launches the proposal's campaign
pub fn approved_result() -> ResultHash {
    hash(APPROVAL_PHRASE)
}

/// Digest validators attest: both fields fixed-width, in order
pub fn attestation_digest(proposal_id: &ProposalId, result: &ResultHash) -> Hash {
    hash_multiple(&[proposal_id.as_bytes(), result.as_bytes()])
}

/// Bytes actually signed for a digest
pub fn signing_message(digest: &Hash) -> Vec<u8> {
    let mut msg = Vec::with_capacity(ATTESTATION_DOMAIN.len() + 32);
    msg.extend_from_slice(ATTESTATION_DOMAIN);
    msg.extend_from_slice(digest.as_bytes());
    msg
}

/// One validator's signature over an outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub public_key: PublicKey,
    pub signature: Signature,
}

impl Attestation {
    /// Sign `(proposal_id, result)` with a validator key
    pub fn sign(keypair: &KeyPair, proposal_id: &ProposalId, result: &ResultHash) -> Self {
        let digest = attestation_digest(proposal_id, result);
        Self {
            public_key: keypair.public_key(),
            signature: sign(keypair, &signing_message(&digest)),
        }
    }
}

/// Why a single attestation did not count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    InvalidSignature,
    NotAValidator,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedAttestation {
    /// Position in the submitted list
    pub index: usize,
    /// Recovered signer, when recovery succeeded
    pub signer: Option<Address>,
    pub reason: RejectionReason,
}

/// Accepted quorum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumOutcome {
    /// Distinct registered signers, in submission order
    pub signers: Vec<Address>,
    pub rejected: Vec<RejectedAttestation>,
}

/// Count distinct registered signers of `digest` and require `threshold`.
///
/// Bad attestations are rejected one by one and never fail the whole call;
/// only an insufficient count does.
pub fn verify_quorum(
    digest: &Hash,
    attestations: &[Attestation],
    validators: &HashSet<Address>,
    threshold: usize,
) -> MonfundmeResult<QuorumOutcome> {
    if threshold == 0 {
        return Err(MonfundmeError::ConfigError(
            "quorum threshold must be at least 1".into(),
        ));
    }

    let message = signing_message(digest);
    let mut seen = HashSet::new();
    let mut signers = Vec::new();
    let mut rejected = Vec::new();

    for (index, attestation) in attestations.iter().enumerate() {
        let signer = match recover_signer(&attestation.public_key, &message, &attestation.signature)
        {
            Ok(signer) => signer,
            Err(e) => {
                debug!(index, error = %e, "Rejected attestation");
                rejected.push(RejectedAttestation {
                    index,
                    signer: None,
                    reason: RejectionReason::InvalidSignature,
                });
                continue;
            }
        };

        let reason = if !validators.contains(&signer) {
            RejectionReason::NotAValidator
        } else if !seen.insert(signer) {
            RejectionReason::Duplicate
        } else {
            signers.push(signer);
            continue;
        };

        debug!(index, signer = %signer, ?reason, "Rejected attestation");
        rejected.push(RejectedAttestation {
            index,
            signer: Some(signer),
            reason,
        });
    }

    if signers.len() < threshold {
        return Err(MonfundmeError::InvalidSignatureCount {
            valid: signers.len(),
            required: threshold,
        });
    }

    Ok(QuorumOutcome { signers, rejected })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Committee {
        a: KeyPair,
        b: KeyPair,
        c: KeyPair,
        set: HashSet<Address>,
    }

    fn committee() -> Committee {
        let a = KeyPair::from_seed(&[1u8; 32]);
        let b = KeyPair::from_seed(&[2u8; 32]);
        let c = KeyPair::from_seed(&[3u8; 32]);
        let set = [a.address(), b.address(), c.address()].into_iter().collect();
        Committee { a, b, c, set }
    }

    fn proposal() -> (ProposalId, ResultHash, Hash) {
        let id = hash(b"P1");
        let result = approved_result();
        (id, result, attestation_digest(&id, &result))
    }

    #[test]
    fn test_two_of_three() {
        let cm = committee();
        let (id, result, digest) = proposal();

        let sigs = vec![
            Attestation::sign(&cm.a, &id, &result),
            Attestation::sign(&cm.b, &id, &result),
        ];
        let outcome = verify_quorum(&digest, &sigs, &cm.set, 2).unwrap();
        assert_eq!(outcome.signers, vec![cm.a.address(), cm.b.address()]);
        assert!(outcome.rejected.is_empty());
    }

    #[test]
    fn test_single_signature_insufficient() {
        let cm = committee();
        let (id, result, digest) = proposal();

        let sigs = vec![Attestation::sign(&cm.c, &id, &result)];
        let err = verify_quorum(&digest, &sigs, &cm.set, 2).unwrap_err();
        assert!(matches!(
            err,
            MonfundmeError::InvalidSignatureCount { valid: 1, required: 2 }
        ));
    }

    #[test]
    fn test_same_signer_counted_once() {
        let cm = committee();
        let (id, result, digest) = proposal();

        let sig = Attestation::sign(&cm.a, &id, &result);
        let err = verify_quorum(&digest, &[sig.clone(), sig], &cm.set, 2).unwrap_err();
        assert!(matches!(err, MonfundmeError::InvalidSignatureCount { valid: 1, .. }));
    }

    #[test]
    fn test_outsider_not_counted() {
        let cm = committee();
        let (id, result, digest) = proposal();
        let outsider = KeyPair::from_seed(&[9u8; 32]);

        let sigs = vec![
            Attestation::sign(&outsider, &id, &result),
            Attestation::sign(&cm.a, &id, &result),
        ];
        assert!(verify_quorum(&digest, &sigs, &cm.set, 2).is_err());

        let outcome = verify_quorum(&digest, &sigs, &cm.set, 1).unwrap();
        assert_eq!(
            outcome.rejected,
            vec![RejectedAttestation {
                index: 0,
                signer: Some(outsider.address()),
                reason: RejectionReason::NotAValidator,
            }]
        );
    }

    #[test]
    fn test_bad_attestations_rejected_individually() {
        let cm = committee();
        let (id, result, digest) = proposal();

        let mut tampered = Attestation::sign(&cm.c, &id, &result);
        tampered.signature.0[10] ^= 0x01;
        let malformed_key = Attestation {
            public_key: PublicKey::from_bytes([0xFF; 32]),
            signature: Attestation::sign(&cm.c, &id, &result).signature,
        };
        let wrong_result = Attestation::sign(&cm.c, &id, &hash(b"NO"));

        let sigs = vec![
            tampered,
            malformed_key,
            wrong_result,
            Attestation::sign(&cm.a, &id, &result),
            Attestation::sign(&cm.b, &id, &result),
        ];
        let outcome = verify_quorum(&digest, &sigs, &cm.set, 2).unwrap();
        assert_eq!(outcome.signers.len(), 2);
        assert_eq!(outcome.rejected.len(), 3);
        assert!(outcome
            .rejected
            .iter()
            .all(|r| r.reason == RejectionReason::InvalidSignature));
    }

    #[test]
    fn test_digest_binds_both_fields() {
        let id = hash(b"P1");
        assert_ne!(
            attestation_digest(&id, &approved_result()),
            attestation_digest(&id, &hash(b"NO"))
        );
        assert_ne!(
            attestation_digest(&id, &approved_result()),
            attestation_digest(&hash(b"P2"), &approved_result())
        );
        assert_eq!(approved_result(), hash(b"YES_CREATE_THIS_CAMPAIGN"));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let cm = committee();
        let (_, _, digest) = proposal();
        assert!(matches!(
            verify_quorum(&digest, &[], &cm.set, 0),
            Err(MonfundmeError::ConfigError(_))
        ));
    }
}
