/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use rsa::{
    pkcs1::DecodeRsaPublicKey, pkcs8::DecodePublicKey, traits::PublicKeyParts, Pkcs1v15Sign,
    RsaPublicKey,
};
use sha1::Sha1;
use sha2::Sha256;

use super::{key::KeyRecord, Algorithm};

/// Signature verification capability.
pub trait VerifySignature {
    /// Returns `true` if `signature` is a valid `algorithm` signature of
    /// `data` under `key`. Unsupported algorithms and unusable keys return
    /// `false`.
    fn verify_signature(
        &self,
        algorithm: Algorithm,
        key: &KeyRecord,
        data: &[u8],
        signature: &[u8],
    ) -> bool;
}

/// RSASSA-PKCS1-v1_5 verifier for `rsa-sha256` and `rsa-sha1`.
#[derive(Debug, Clone)]
pub struct RsaVerifier {
    min_key_bits: usize,
}

impl Default for RsaVerifier {
    fn default() -> Self {
        RsaVerifier { min_key_bits: 1024 }
    }
}

impl RsaVerifier {
    pub fn new() -> Self {
        RsaVerifier::default()
    }

    /// Sets the smallest accepted modulus size in bits (RFC 8301 requires 1024).
    pub fn min_key_bits(mut self, min_key_bits: usize) -> Self {
        self.min_key_bits = min_key_bits;
        self
    }
}

impl VerifySignature for RsaVerifier {
    fn verify_signature(
        &self,
        algorithm: Algorithm,
        key: &KeyRecord,
        data: &[u8],
        signature: &[u8],
    ) -> bool {
        if !key.permits(algorithm) {
            tracing::debug!(%algorithm, "algorithm not permitted by key record");
            return false;
        }

        let scheme = match algorithm {
            Algorithm::RsaSha256 => Pkcs1v15Sign::new::<Sha256>(),
            Algorithm::RsaSha1 => Pkcs1v15Sign::new::<Sha1>(),
            Algorithm::Ed25519Sha256 => {
                tracing::debug!(%algorithm, "unsupported algorithm");
                return false;
            }
        };

        let public_key = match RsaPublicKey::from_public_key_der(&key.public_key)
            .ok()
            .or_else(|| RsaPublicKey::from_pkcs1_der(&key.public_key).ok())
        {
            Some(public_key) => public_key,
            None => {
                tracing::debug!("failed to decode RSA public key");
                return false;
            }
        };

        if public_key.size() * 8 < self.min_key_bits {
            tracing::debug!(
                bits = public_key.size() * 8,
                min_bits = self.min_key_bits,
                "RSA key too short"
            );
            return false;
        }

        public_key
            .verify(
                scheme,
                &algorithm.hash_algorithm().hash(data),
                signature,
            )
            .is_ok()
    }
}
