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

//! Authenticated Received Chain (RFC 8617) verification.

use std::fmt::Display;

use crate::message::RawHeader;

pub mod chain;
pub mod group;
pub mod parse;
pub mod results;
pub mod verify;

pub use parse::{Seal, Signature};
pub use results::AuthenticationResults;

pub const ARC_SEAL: &str = "ARC-Seal";
pub const ARC_MESSAGE_SIGNATURE: &str = "ARC-Message-Signature";
pub const ARC_AUTHENTICATION_RESULTS: &str = "ARC-Authentication-Results";

/// Highest instance number a chain may reach.
pub const MAX_INSTANCES: u32 = 50;

bitflags::bitflags! {
    /// Reasons a chain failed validation. Several may be set at once.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ErrorFlags: u32 {
        const INVALID_ARC_SEAL = 1 << 0;
        const DUPLICATE_ARC_SEAL = 1 << 1;
        const MISSING_ARC_SEAL = 1 << 2;
        const INVALID_ARC_MESSAGE_SIGNATURE = 1 << 3;
        const DUPLICATE_ARC_MESSAGE_SIGNATURE = 1 << 4;
        const MISSING_ARC_MESSAGE_SIGNATURE = 1 << 5;
        const INVALID_ARC_AUTHENTICATION_RESULTS = 1 << 6;
        const DUPLICATE_ARC_AUTHENTICATION_RESULTS = 1 << 7;
        const MISSING_ARC_AUTHENTICATION_RESULTS = 1 << 8;
        const INVALID_ARC_SEAL_CHAIN_VALIDATION_VALUE = 1 << 9;
        const MISSING_ARC_SEAL_CHAIN_VALIDATION_VALUE = 1 << 10;
        const MESSAGE_SIGNATURE_VALIDATION_FAILED = 1 << 11;
        const SEAL_VALIDATION_FAILED = 1 << 12;
    }
}

/// Overall verdict for a message's ARC chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainResult {
    /// The message carries no ARC headers or no body.
    None,
    Pass,
    /// See [`ArcValidationResult::chain_errors`] for the cause.
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureResult {
    Pass,
    Fail,
}

/// Value of an `ARC-Seal` `cv=` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainValidation {
    None,
    Pass,
    Fail,
}

/// An ARC header together with its parsed contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcHeader<'x, T> {
    pub header: RawHeader<'x>,
    pub parsed: T,
}

/// The three headers added by one ARC participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcHeaderSet<'x> {
    pub instance: u32,
    pub seal: ArcHeader<'x, Seal<'x>>,
    pub message_signature: ArcHeader<'x, Signature<'x>>,
    pub auth_results: ArcHeader<'x, AuthenticationResults>,
}

/// Verification outcome of a single `ARC-Seal` or `ARC-Message-Signature`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArcHeaderValidationResult<'x> {
    pub header: RawHeader<'x>,
    pub signature: SignatureResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcValidationResult<'x> {
    pub chain: ChainResult,
    /// Why the chain failed. Empty on [`ChainResult::Fail`] only when every
    /// check passed but the newest `ARC-Seal` carries `cv=fail`, that is,
    /// the last sealer already found the chain broken.
    pub chain_errors: ErrorFlags,
    /// Result for the instance 1 `ARC-Message-Signature`.
    pub message_signature: Option<ArcHeaderValidationResult<'x>>,
    /// Results for every `ARC-Seal`, by ascending instance.
    pub seals: Vec<ArcHeaderValidationResult<'x>>,
}

impl ChainValidation {
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("none") {
            Some(ChainValidation::None)
        } else if value.eq_ignore_ascii_case("pass") {
            Some(ChainValidation::Pass)
        } else if value.eq_ignore_ascii_case("fail") {
            Some(ChainValidation::Fail)
        } else {
            None
        }
    }
}

impl From<bool> for SignatureResult {
    fn from(pass: bool) -> Self {
        if pass {
            SignatureResult::Pass
        } else {
            SignatureResult::Fail
        }
    }
}

impl<'x> ArcHeaderValidationResult<'x> {
    pub fn new(header: RawHeader<'x>, signature: SignatureResult) -> Self {
        ArcHeaderValidationResult { header, signature }
    }
}

impl<'x> ArcValidationResult<'x> {
    /// Result for a message that carries no ARC headers.
    pub fn none() -> Self {
        ArcValidationResult {
            chain: ChainResult::None,
            chain_errors: ErrorFlags::empty(),
            message_signature: None,
            seals: Vec::new(),
        }
    }

    /// Result for a chain rejected before any signature was checked.
    pub fn fail(chain_errors: ErrorFlags) -> Self {
        ArcValidationResult {
            chain: ChainResult::Fail,
            chain_errors,
            message_signature: None,
            seals: Vec::new(),
        }
    }
}

impl Display for ChainResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainResult::None => write!(f, "none"),
            ChainResult::Pass => write!(f, "pass"),
            ChainResult::Fail => write!(f, "fail"),
        }
    }
}

impl Display for ChainValidation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainValidation::None => write!(f, "none"),
            ChainValidation::Pass => write!(f, "pass"),
            ChainValidation::Fail => write!(f, "fail"),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::dkim::key::KeyStore;

    pub const SINGLE: &[u8] = include_bytes!("../../resources/arc/single.eml");
    pub const CHAIN: &[u8] = include_bytes!("../../resources/arc/chain.eml");
    pub const RELAXED_SEAL: &[u8] = include_bytes!("../../resources/arc/relaxed_seal.eml");
    pub const WEAK_KEY: &[u8] = include_bytes!("../../resources/arc/weak_key.eml");
    pub const EMPTY_BODY: &[u8] = include_bytes!("../../resources/arc/empty_body.eml");

    pub const TEST_KEY_RECORD: &str = concat!(
        "v=DKIM1; k=rsa; p=MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQDwIRP/UC3SBsEmGqZ9ZJW3/DkMo",
        "GeLnQg1fWn7/zYtIxN2SnFCjxOCKG9v3b4jYfcTNh5ijSsq631uBItLa7od+v/RtdC2UzJ1lWT947qR+Rcac",
        "2gbto/NMqJ0fzfVjH4OuKhitdY9tf6mcwGjaNBcWToIMmPSPDdQPNUYckcQ2QIDAQAB"
    );

    // 512-bit key, below the RFC 8301 minimum.
    pub const WEAK_KEY_RECORD: &str = concat!(
        "v=DKIM1; k=rsa; p=MFwwDQYJKoZIhvcNAQEBBQADSwAwSAJBANLhHmk4TW/3aXBdRIKCoMCO6slsGsLrX9",
        "5tM8apojBQUFZYnRrXaqiykc+yKfGxAHUZKRhjOGmGBla8rheEf0cCAwEAAQ=="
    );

    pub fn key_store() -> KeyStore {
        KeyStore::new()
            .record("default", "example.org", TEST_KEY_RECORD)
            .record("arc", "relay1.example.net", TEST_KEY_RECORD)
            .record("arc", "relay2.example.net", TEST_KEY_RECORD)
            .record("sel2023", "lists.example.com", TEST_KEY_RECORD)
            .record("arc", "example.net", TEST_KEY_RECORD)
            .record("weak", "weak.example.org", WEAK_KEY_RECORD)
    }

    pub fn to_string(message: &[u8]) -> String {
        String::from_utf8(message.to_vec()).unwrap()
    }

    /// Removes the `count` newest ARC sets, which sit on top of the header block.
    pub fn strip_sets(message: &str, count: usize) -> String {
        let mut fields = 0;
        let mut offset = 0;
        for line in message.split_inclusive('\n') {
            if !line.starts_with([' ', '\t']) {
                if fields == count * 3 {
                    break;
                }
                fields += 1;
            }
            offset += line.len();
        }
        message[offset..].to_string()
    }

    #[test]
    fn key_records_match_fixtures() {
        assert!(crate::dkim::key::KeyRecord::parse(TEST_KEY_RECORD).is_ok());
        assert!(crate::dkim::key::KeyRecord::parse(WEAK_KEY_RECORD).is_ok());
    }
}
