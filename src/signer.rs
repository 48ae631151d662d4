//! Operator signing of attestation submissions

use k256::{ecdsa::SigningKey, SecretKey};
use sha3::{Digest, Keccak256};

use crate::accumulator::FinalizedProofRequest;
use crate::error::{PipelineError, Result};
use crate::types::Proof;

pub struct SubmissionSigner {
    signing_key: SigningKey,
    address: String,
}

impl SubmissionSigner {
    /// Create a new signer from private key hex
    pub fn new(private_key_hex: &str) -> Result<Self> {
        let private_key_hex = private_key_hex.trim().trim_start_matches("0x");
        let private_key_bytes = hex::decode(private_key_hex)
            .map_err(|e| PipelineError::Signing(format!("Invalid private key hex: {}", e)))?;

        let secret_key = SecretKey::from_slice(&private_key_bytes)
            .map_err(|e| PipelineError::Signing(format!("Invalid private key: {}", e)))?;

        let signing_key = SigningKey::from(secret_key);

        // Derive Ethereum address from public key
        let public_key = signing_key.verifying_key();
        let public_key_bytes = public_key.to_encoded_point(false);
        let public_key_bytes = &public_key_bytes.as_bytes()[1..]; // Skip the 0x04 prefix

        let hash = Keccak256::digest(public_key_bytes);
        let address = format!("0x{}", hex::encode(&hash[12..]));

        Ok(Self { signing_key, address })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sign the submission digest, returning a 65 byte `r || s || v` signature
    pub fn sign_submission(
        &self,
        request: &FinalizedProofRequest,
        proof: &Proof,
        src_chain_id: u64,
        dst_chain_id: u64,
        callback_address: &str,
    ) -> Result<String> {
        let digest = submission_digest(request, proof, src_chain_id, dst_chain_id, callback_address)?;

        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| PipelineError::Signing(format!("Failed to sign: {}", e)))?;

        let mut sig = vec![0u8; 65];
        sig[..64].copy_from_slice(&signature.to_bytes());
        sig[64] = 27 + recovery_id.to_byte();

        Ok(format!("0x{}", hex::encode(sig)))
    }
}

/// Keccak256 over the request, proof and routing fields in a fixed order
pub fn submission_digest(
    request: &FinalizedProofRequest,
    proof: &Proof,
    src_chain_id: u64,
    dst_chain_id: u64,
    callback_address: &str,
) -> Result<[u8; 32]> {
    let mut hasher = Keccak256::new();

    hasher.update(serde_json::to_vec(request.receipts())?);
    hasher.update(proof.proof.as_bytes());
    hasher.update(src_chain_id.to_be_bytes());
    hasher.update(dst_chain_id.to_be_bytes());
    hasher.update(callback_address.to_ascii_lowercase().as_bytes());

    Ok(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::ProofRequestAccumulator;
    use crate::schema::Schema;
    use crate::types::ReceiptDescriptor;
    use alloy_primitives::B256;

    fn test_private_key() -> String {
        let hash = Keccak256::digest(b"test_seed_for_submission_signer_tests");
        format!("0x{}", hex::encode(hash))
    }

    fn request() -> FinalizedProofRequest {
        let mut acc = ProofRequestAccumulator::new();
        acc.append(
            ReceiptDescriptor {
                tx_hash: B256::repeat_byte(0x42),
                fields: Schema::Volatility.selectors(),
            },
            0,
        )
        .unwrap();
        acc.finalize().unwrap()
    }

    fn proof() -> Proof {
        Proof {
            proof: "0xdeadbeef".to_string(),
            circuit_output: None,
        }
    }

    #[test]
    fn test_signer_creation() {
        let signer = SubmissionSigner::new(&test_private_key()).unwrap();
        assert_eq!(signer.address().len(), 42);
        assert!(signer.address().starts_with("0x"));
    }

    #[test]
    fn test_known_address() {
        // Private key 1 maps to the well known generator address
        let key = format!("{:0>64}", "1");
        let signer = SubmissionSigner::new(&key).unwrap();
        assert_eq!(signer.address(), "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    }

    #[test]
    fn test_invalid_key() {
        assert!(matches!(SubmissionSigner::new("0xnothex"), Err(PipelineError::Signing(_))));
        assert!(matches!(SubmissionSigner::new(&"00".repeat(32)), Err(PipelineError::Signing(_))));
    }

    #[test]
    fn test_deterministic_signing() {
        let signer = SubmissionSigner::new(&test_private_key()).unwrap();
        let callback = "0xEf1c6E67703c7BD7107eed8303Fbe6EC2554BF6B";

        let sig1 = signer.sign_submission(&request(), &proof(), 1, 1, callback).unwrap();
        let sig2 = signer.sign_submission(&request(), &proof(), 1, 1, callback).unwrap();
        assert_eq!(sig1, sig2);
        assert_eq!(sig1.len(), 132); // 0x + 65 bytes * 2

        let other_chain = signer.sign_submission(&request(), &proof(), 1, 2, callback).unwrap();
        assert_ne!(sig1, other_chain);
    }
}
