use std::str::FromStr;

use ethers::types::{Address, Signature};

use crate::error::{AppError, Result};

/// Verifies an Ethereum personal_sign (EIP-191) signature.
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Recovers the signer of `message` from the 65-byte r||s||v signature and
    /// compares it with the claimed wallet address (case-insensitive).
    ///
    /// Returns the recovered address in lowercase 0x form on success.
    ///
    /// Failure modes are distinct so callers can surface the right status:
    /// a signature that cannot even be parsed or recovered is
    /// `InvalidSignatureFormat` (400), while a well-formed signature from the
    /// wrong key is `SignatureMismatch` (403).
    pub fn verify_personal_sign(
        message: &str,
        signature: &str,
        claimed_address: &str,
    ) -> Result<String> {
        let claimed = claimed_address.trim();
        if claimed.is_empty() || signature.is_empty() {
            return Err(AppError::Validation(
                "Wallet address and signature are required".to_string(),
            ));
        }

        let expected = Address::from_str(claimed)
            .map_err(|_| AppError::Validation("Invalid wallet address".to_string()))?;

        // Signature::from_str rejects anything that is not 65 hex-encoded
        // bytes; recover() applies the "\x19Ethereum Signed Message:\n" prefix
        // and keccak hash before secp256k1 recovery.
        let signature = Signature::from_str(signature.trim())
            .map_err(|_| AppError::InvalidSignatureFormat)?;
        let recovered = signature
            .recover(message)
            .map_err(|_| AppError::InvalidSignatureFormat)?;

        if recovered != expected {
            return Err(AppError::SignatureMismatch {
                recovered: format!("0x{}", hex::encode(recovered.as_bytes())),
                expected: format!("0x{}", hex::encode(expected.as_bytes())),
            });
        }

        Ok(format!("0x{}", hex::encode(recovered.as_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::core::rand::thread_rng;
    use ethers::signers::{LocalWallet, Signer};

    async fn signed(message: &str) -> (LocalWallet, String) {
        let wallet = LocalWallet::new(&mut thread_rng());
        let signature = wallet.sign_message(message).await.unwrap();
        (wallet, format!("0x{signature}"))
    }

    #[tokio::test]
    async fn accepts_signature_from_claimed_wallet() {
        let message = "Login to Cash Cow Valley. Nonce: 123e4567";
        let (wallet, sig) = signed(message).await;
        let claimed = format!("0x{}", hex::encode(wallet.address().as_bytes()));

        let recovered =
            SignatureVerifier::verify_personal_sign(message, &sig, &claimed).unwrap();
        assert_eq!(recovered, claimed.to_lowercase());
    }

    #[tokio::test]
    async fn address_comparison_is_case_insensitive() {
        let message = "case test";
        let (wallet, sig) = signed(message).await;
        let claimed = format!("0x{}", hex::encode(wallet.address().as_bytes())).to_uppercase();
        let claimed = format!("0x{}", &claimed[2..]);

        assert!(SignatureVerifier::verify_personal_sign(message, &sig, &claimed).is_ok());
    }

    #[tokio::test]
    async fn wrong_signer_is_a_mismatch_not_a_format_error() {
        let message = "hello";
        let (_, sig) = signed(message).await;
        let other = LocalWallet::new(&mut thread_rng());
        let claimed = format!("0x{}", hex::encode(other.address().as_bytes()));

        match SignatureVerifier::verify_personal_sign(message, &sig, &claimed) {
            Err(AppError::SignatureMismatch { .. }) => {}
            other => panic!("expected SignatureMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tampered_message_is_a_mismatch() {
        let (wallet, sig) = signed("original message").await;
        let claimed = format!("0x{}", hex::encode(wallet.address().as_bytes()));

        match SignatureVerifier::verify_personal_sign("tampered message", &sig, &claimed) {
            Err(AppError::SignatureMismatch { .. }) => {}
            other => panic!("expected SignatureMismatch, got {other:?}"),
        }
    }

    #[test]
    fn malformed_signature_is_a_format_error() {
        let claimed = "0xbb9468c225c35ba3cbe441660ef9de3a66eb772a";
        match SignatureVerifier::verify_personal_sign("hello", "deadbeef", claimed) {
            Err(AppError::InvalidSignatureFormat) => {}
            other => panic!("expected InvalidSignatureFormat, got {other:?}"),
        }
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let result = SignatureVerifier::verify_personal_sign("hello", "", "0xabc");
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
