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

//! # mail-arc
//!
//! _mail-arc_ is a Rust library to verify Authenticated Received Chain (**ARC**) headers on e-mail messages. It includes the following features:
//!
//! - Authenticated Received Chain (**ARC**; _RFC 8617_) chain validation.
//! - DomainKeys Identified Mail (**DKIM**; _RFC 6376_) tag lists, canonicalization and public key records.
//! - Authentication-Results (_RFC 8601_) parsing of `ARC-Authentication-Results` headers.
//! - RSA-SHA256 and RSA-SHA1 signatures with the _RFC 8301_ minimum key size.
//! - Blocking and async public key resolvers.
//!
//! ## Usage Example
//!
//! Verify the ARC chain of a message using keys held in memory:
//!
//! ```rust
//!     let keys = KeyStore::new().record(
//!         "default",
//!         "example.org",
//!         "v=DKIM1; k=rsa; p=MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQ...",
//!     );
//!
//!     let result = ArcVerifier::new()
//!         .verify(&Message::parse(raw_message), &keys)
//!         .unwrap();
//!
//!     match result.chain {
//!         ChainResult::Pass => println!("ARC chain is valid"),
//!         ChainResult::Fail => println!("ARC chain failed: {:?}", result.chain_errors),
//!         ChainResult::None => println!("No ARC headers found"),
//!     }
//! ```
//!
//! Resolve keys asynchronously and reject malformed ARC headers outright:
//!
//! ```rust
//!     let result = ArcVerifier::new()
//!         .strict(true)
//!         .seal_canonicalization(Canonicalization::Relaxed)
//!         .verify_async(&Message::parse(raw_message), &dns_resolver)
//!         .await;
//! ```
//!
//! ## Testing
//!
//! To run the testsuite:
//!
//! ```bash
//!  $ cargo test
//! ```
//!
//! ## License
//!
//! Licensed under either of
//!
//!  * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//!  * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.
//!
//! ## Copyright
//!
//! Copyright (C) 2020-2022, Stalwart Labs Ltd.
//!
//! See [COPYING] for the license.
//!
//! [COPYING]: https://github.com/stalwartlabs/mail-arc/blob/main/COPYING
//!

#[forbid(unsafe_code)]
pub mod arc;
pub mod dkim;
pub mod message;

use std::fmt::Display;

pub use arc::{verify::ArcVerifier, ArcValidationResult, ChainResult, ErrorFlags};
pub use dkim::key::{KeyRecord, KeyStore, ResolveKey, ResolveKeyAsync};
pub use message::{Message, RawHeader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed header or tag list.
    ParseError,

    /// Base64 decode error
    Base64(base64::DecodeError),

    /// Structurally invalid ARC headers (strict mode only).
    InvalidArcHeaders(ErrorFlags),

    /// A required tag is absent.
    MissingParameters,

    /// The body hash does not match the `bh=` tag.
    FailedBodyHashMatch,

    /// The signature does not verify.
    FailedVerification,

    /// No public key record was found.
    KeyNotFound,

    /// The public key record could not be parsed.
    InvalidKeyRecord,

    /// The public key record has an empty `p=` tag.
    RevokedKey,

    UnsupportedAlgorithm,

    UnsupportedCanonicalization,

    /// Missing or out of range `i=` tag.
    InvalidInstance,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ParseError => write!(f, "Failed to parse header"),
            Error::Base64(e) => write!(f, "Base64 decode error: {}", e),
            Error::InvalidArcHeaders(flags) => write!(f, "Invalid ARC headers: {:?}", flags),
            Error::MissingParameters => write!(f, "Missing required tags"),
            Error::FailedBodyHashMatch => write!(f, "Body hash does not match"),
            Error::FailedVerification => write!(f, "Signature verification failed"),
            Error::KeyNotFound => write!(f, "Public key not found"),
            Error::InvalidKeyRecord => write!(f, "Invalid public key record"),
            Error::RevokedKey => write!(f, "Public key has been revoked"),
            Error::UnsupportedAlgorithm => write!(f, "Unsupported signature algorithm"),
            Error::UnsupportedCanonicalization => {
                write!(f, "Unsupported canonicalization method")
            }
            Error::InvalidInstance => write!(f, "Invalid ARC instance number"),
        }
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Base64(err)
    }
}
