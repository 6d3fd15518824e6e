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

//! Building blocks shared with DKIM (RFC 6376): tag lists, canonicalization,
//! header selection, key records and signature verification.

use std::fmt::Display;

use sha1::Sha1;
use sha2::{Digest, Sha256};

pub mod canonicalize;
pub mod crypto;
pub mod headers;
pub mod key;
pub mod tags;

/// Signing algorithm of an `a=` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    RsaSha1,
    RsaSha256,
    Ed25519Sha256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Rsa,
    Ed25519,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Canonicalization {
    #[default]
    Simple,
    Relaxed,
}

/// Header and body canonicalization of a `c=` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CanonicalizationPair {
    pub header: Canonicalization,
    pub body: Canonicalization,
}

impl Algorithm {
    /// Parses an `a=` token. Algorithm names are case-insensitive.
    pub fn parse(value: &str) -> crate::Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("rsa-sha256") {
            Ok(Algorithm::RsaSha256)
        } else if value.eq_ignore_ascii_case("rsa-sha1") {
            Ok(Algorithm::RsaSha1)
        } else if value.eq_ignore_ascii_case("ed25519-sha256") {
            Ok(Algorithm::Ed25519Sha256)
        } else {
            Err(crate::Error::UnsupportedAlgorithm)
        }
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        match self {
            Algorithm::RsaSha1 => HashAlgorithm::Sha1,
            Algorithm::RsaSha256 | Algorithm::Ed25519Sha256 => HashAlgorithm::Sha256,
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            Algorithm::RsaSha1 | Algorithm::RsaSha256 => KeyType::Rsa,
            Algorithm::Ed25519Sha256 => KeyType::Ed25519,
        }
    }
}

impl HashAlgorithm {
    pub fn hash(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        }
    }
}

impl Canonicalization {
    fn parse(value: &str) -> crate::Result<Self> {
        if value.eq_ignore_ascii_case("simple") {
            Ok(Canonicalization::Simple)
        } else if value.eq_ignore_ascii_case("relaxed") {
            Ok(Canonicalization::Relaxed)
        } else {
            Err(crate::Error::UnsupportedCanonicalization)
        }
    }
}

impl CanonicalizationPair {
    /// Parses a `c=` value. A missing body part defaults to `simple`.
    pub fn parse(value: &str) -> crate::Result<Self> {
        let value = value.trim();
        Ok(match value.split_once('/') {
            Some((header, body)) => CanonicalizationPair {
                header: Canonicalization::parse(header.trim())?,
                body: Canonicalization::parse(body.trim())?,
            },
            None => CanonicalizationPair {
                header: Canonicalization::parse(value)?,
                body: Canonicalization::Simple,
            },
        })
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::RsaSha1 => write!(f, "rsa-sha1"),
            Algorithm::RsaSha256 => write!(f, "rsa-sha256"),
            Algorithm::Ed25519Sha256 => write!(f, "ed25519-sha256"),
        }
    }
}

impl Display for Canonicalization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Canonicalization::Simple => write!(f, "simple"),
            Canonicalization::Relaxed => write!(f, "relaxed"),
        }
    }
}
