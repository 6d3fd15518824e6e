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

use crate::{
    dkim::{
        canonicalize::{canonicalize_body, canonicalize_header},
        crypto::VerifySignature,
        headers::select_headers,
        key::KeyRecord,
        tags::{decode_base64, remove_signature},
        Algorithm, Canonicalization, CanonicalizationPair,
    },
    message::{Message, RawHeader},
};

use super::{
    ArcHeaderSet, ArcHeaderValidationResult, ArcValidationResult, ChainResult, ChainValidation,
    ErrorFlags, SignatureResult,
};

/// A public key the chain needs, identified by its `s=` and `d=` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRequest<'x> {
    pub selector: &'x str,
    pub domain: &'x str,
}

/// Verifies a structurally valid chain once its keys have been fetched.
pub struct ChainValidator<'x, 'm> {
    message: &'m Message<'x>,
    sets: Vec<ArcHeaderSet<'x>>,
    seal_canonicalization: Canonicalization,
}

impl<'x, 'm> ChainValidator<'x, 'm> {
    /// `sets` must hold instances `1..=n` in ascending order.
    pub fn new(
        message: &'m Message<'x>,
        sets: Vec<ArcHeaderSet<'x>>,
        seal_canonicalization: Canonicalization,
    ) -> Self {
        ChainValidator {
            message,
            sets,
            seal_canonicalization,
        }
    }

    /// Keys to resolve, in the order `AMS(1), AS(1), AMS(2), AS(2), ...`.
    ///
    /// Headers lacking `s=` or `d=` yield `None` and fail verification.
    pub fn key_requests(&self) -> Vec<Option<KeyRequest<'x>>> {
        self.sets
            .iter()
            .flat_map(|set| {
                [
                    request(
                        set.message_signature.parsed.selector,
                        set.message_signature.parsed.domain,
                    ),
                    request(set.seal.parsed.selector, set.seal.parsed.domain),
                ]
            })
            .collect()
    }

    /// Validates the chain given the outcome of each [`KeyRequest`], in the
    /// order returned by [`ChainValidator::key_requests`].
    pub fn validate(
        self,
        keys: Vec<Option<crate::Result<KeyRecord>>>,
        verifier: &impl VerifySignature,
    ) -> ArcValidationResult<'x> {
        let mut flags = ErrorFlags::empty();
        let mut message_signature = None;
        let mut seals = Vec::with_capacity(self.sets.len());
        let mut keys = keys.into_iter();

        for (index, set) in self.sets.iter().enumerate() {
            let ams = &set.message_signature.parsed;
            let result = match self.verify_message_signature(set, keys.next().flatten(), verifier)
            {
                Ok(()) => SignatureResult::Pass,
                Err(err) => {
                    tracing::debug!(
                        instance = set.instance,
                        selector = ams.selector.unwrap_or_default(),
                        domain = ams.domain.unwrap_or_default(),
                        %err,
                        "ARC-Message-Signature verification failed"
                    );
                    flags |= ErrorFlags::MESSAGE_SIGNATURE_VALIDATION_FAILED;
                    SignatureResult::Fail
                }
            };
            if set.instance == 1 {
                message_signature = Some(ArcHeaderValidationResult::new(
                    set.message_signature.header,
                    result,
                ));
            }

            flags |= check_chain_validation(set);

            let seal = &set.seal.parsed;
            let result = match self.verify_seal(index, keys.next().flatten(), verifier) {
                Ok(()) => SignatureResult::Pass,
                Err(err) => {
                    tracing::debug!(
                        instance = set.instance,
                        selector = seal.selector.unwrap_or_default(),
                        domain = seal.domain.unwrap_or_default(),
                        %err,
                        "ARC-Seal verification failed"
                    );
                    flags |= ErrorFlags::SEAL_VALIDATION_FAILED;
                    SignatureResult::Fail
                }
            };
            seals.push(ArcHeaderValidationResult::new(set.seal.header, result));
        }

        let newest_failed = self.sets.last().is_some_and(|set| {
            set.seal.parsed.chain_validation.and_then(ChainValidation::parse)
                == Some(ChainValidation::Fail)
        });
        if newest_failed {
            tracing::debug!("newest ARC-Seal reports cv=fail");
        }

        ArcValidationResult {
            chain: if flags.is_empty() && !newest_failed {
                ChainResult::Pass
            } else {
                ChainResult::Fail
            },
            chain_errors: flags,
            message_signature,
            seals,
        }
    }

    fn verify_message_signature(
        &self,
        set: &ArcHeaderSet<'x>,
        key: Option<crate::Result<KeyRecord>>,
        verifier: &impl VerifySignature,
    ) -> crate::Result<()> {
        let ams = &set.message_signature.parsed;
        let (algorithm, signature, body_hash, headers) =
            match (ams.algorithm, ams.signature, ams.body_hash, ams.headers) {
                (Some(algorithm), Some(signature), Some(body_hash), Some(headers)) => {
                    (algorithm, signature, body_hash, headers)
                }
                _ => return Err(crate::Error::MissingParameters),
            };
        let algorithm = Algorithm::parse(algorithm)?;
        let canonicalization = ams
            .canonicalization
            .map(CanonicalizationPair::parse)
            .transpose()?
            .unwrap_or_default();
        let signature = decode_base64(signature)?;
        let body_hash = decode_base64(body_hash)?;

        let body = canonicalize_body(self.message.body, canonicalization.body);
        if algorithm.hash_algorithm().hash(&body) != body_hash {
            return Err(crate::Error::FailedBodyHashMatch);
        }

        let key = key.ok_or(crate::Error::MissingParameters)??;
        let mut data = Vec::with_capacity(1024);
        for header in select_headers(headers, &self.message.headers)
            .into_iter()
            .flatten()
        {
            canonicalize_header(header, canonicalization.header, &mut data);
        }
        canonicalize_unsigned(&set.message_signature.header, canonicalization.header, &mut data)?;

        if verifier.verify_signature(algorithm, &key, &data, &signature) {
            Ok(())
        } else {
            Err(crate::Error::FailedVerification)
        }
    }

    fn verify_seal(
        &self,
        index: usize,
        key: Option<crate::Result<KeyRecord>>,
        verifier: &impl VerifySignature,
    ) -> crate::Result<()> {
        let set = &self.sets[index];
        let seal = &set.seal.parsed;
        if seal.unknown.iter().any(|(key, _)| *key == "h") {
            // RFC 8617, section 4.1.3
            return Err(crate::Error::ParseError);
        }
        let (algorithm, signature) = match (seal.algorithm, seal.signature) {
            (Some(algorithm), Some(signature)) => (algorithm, signature),
            _ => return Err(crate::Error::MissingParameters),
        };
        let algorithm = Algorithm::parse(algorithm)?;
        let signature = decode_base64(signature)?;
        let key = key.ok_or(crate::Error::MissingParameters)??;

        let canonicalization = self.seal_canonicalization;
        let mut data = Vec::with_capacity(2048);
        for set in &self.sets[..index] {
            canonicalize_header(&set.auth_results.header, canonicalization, &mut data);
            canonicalize_header(&set.message_signature.header, canonicalization, &mut data);
            canonicalize_header(&set.seal.header, canonicalization, &mut data);
        }
        canonicalize_header(&set.auth_results.header, canonicalization, &mut data);
        canonicalize_header(&set.message_signature.header, canonicalization, &mut data);
        canonicalize_unsigned(&set.seal.header, canonicalization, &mut data)?;

        if verifier.verify_signature(algorithm, &key, &data, &signature) {
            Ok(())
        } else {
            Err(crate::Error::FailedVerification)
        }
    }
}

fn request<'x>(selector: Option<&'x str>, domain: Option<&'x str>) -> Option<KeyRequest<'x>> {
    Some(KeyRequest {
        selector: selector?,
        domain: domain?,
    })
}

fn check_chain_validation(set: &ArcHeaderSet<'_>) -> ErrorFlags {
    match set.seal.parsed.chain_validation {
        None => {
            tracing::debug!(instance = set.instance, "ARC-Seal without cv= tag");
            ErrorFlags::MISSING_ARC_SEAL_CHAIN_VALIDATION_VALUE
        }
        Some(value) => match ChainValidation::parse(value) {
            Some(ChainValidation::None) if set.instance == 1 => ErrorFlags::empty(),
            Some(ChainValidation::Pass | ChainValidation::Fail) if set.instance > 1 => {
                ErrorFlags::empty()
            }
            _ => {
                tracing::debug!(instance = set.instance, cv = value, "unexpected cv= value");
                ErrorFlags::INVALID_ARC_SEAL_CHAIN_VALIDATION_VALUE
            }
        },
    }
}

/// Appends the canonical form of a signing header with its `b=` value
/// emptied and without the trailing CRLF.
fn canonicalize_unsigned(
    header: &RawHeader<'_>,
    canonicalization: Canonicalization,
    out: &mut Vec<u8>,
) -> crate::Result<()> {
    let value = remove_signature(header.value_str().ok_or(crate::Error::ParseError)?);
    let mut raw = header.raw[..header.raw.len().saturating_sub(header.value.len())].to_vec();
    raw.extend_from_slice(value.as_bytes());

    canonicalize_header(
        &RawHeader {
            name: header.name,
            value: value.as_bytes(),
            raw: &raw,
            position: header.position,
        },
        canonicalization,
        out,
    );
    out.truncate(out.len() - 2);
    Ok(())
}

#[cfg(test)]
mod test {
    use crate::{
        arc::{
            fixtures,
            group::{group_sets, Grouping},
            ChainResult, ErrorFlags, SignatureResult,
        },
        dkim::{crypto::RsaVerifier, key::ResolveKey, Canonicalization},
        message::Message,
    };

    use super::{canonicalize_unsigned, ChainValidator, KeyRequest};

    fn validator<'x, 'm>(message: &'m Message<'x>) -> ChainValidator<'x, 'm> {
        match group_sets(message, true).unwrap() {
            Grouping::Sets(sets) => ChainValidator::new(message, sets, Canonicalization::Simple),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn key_request_order() {
        let chain = fixtures::to_string(fixtures::CHAIN);
        let message = Message::parse(chain.as_bytes());
        let requests = validator(&message).key_requests();

        assert_eq!(
            requests,
            [
                ("default", "example.org"),
                ("arc", "relay1.example.net"),
                ("arc", "relay2.example.net"),
                ("sel2023", "lists.example.com"),
                ("arc", "example.net"),
            ]
            .into_iter()
            .flat_map(|(selector, domain)| [Some(KeyRequest { selector, domain }); 2])
            .collect::<Vec<_>>()
        );

        // Missing s= leaves a gap that fails verification
        let single = fixtures::to_string(fixtures::SINGLE).replacen(
            "d=example.org; s=default;\r\n\tb=",
            "d=example.org;\r\n\tb=",
            1,
        );
        let message = Message::parse(single.as_bytes());
        let validator = validator(&message);
        let requests = validator.key_requests();
        assert_eq!(
            requests,
            vec![
                Some(KeyRequest {
                    selector: "default",
                    domain: "example.org"
                }),
                None
            ]
        );

        let store = fixtures::key_store();
        let keys = requests
            .into_iter()
            .map(|request| request.map(|r| store.resolve_key(r.selector, r.domain)))
            .collect();
        let result = validator.validate(keys, &RsaVerifier::new());
        assert_eq!(result.chain, ChainResult::Fail);
        assert_eq!(result.chain_errors, ErrorFlags::SEAL_VALIDATION_FAILED);
        assert_eq!(
            result.message_signature.map(|r| r.signature),
            Some(SignatureResult::Pass)
        );
    }

    #[test]
    fn missing_keys_fail_verification() {
        let single = fixtures::to_string(fixtures::SINGLE);
        let message = Message::parse(single.as_bytes());
        let validator = validator(&message);

        let result = validator.validate(
            vec![Some(Err(crate::Error::KeyNotFound)), None],
            &RsaVerifier::new(),
        );
        assert_eq!(result.chain, ChainResult::Fail);
        assert_eq!(
            result.chain_errors,
            ErrorFlags::MESSAGE_SIGNATURE_VALIDATION_FAILED | ErrorFlags::SEAL_VALIDATION_FAILED
        );
        assert_eq!(result.seals.len(), 1);
        assert_eq!(result.seals[0].signature, SignatureResult::Fail);
    }

    #[test]
    fn blank_signature_value() {
        let message = Message::parse(
            b"ARC-Seal: i=1; cv=none; b=abc\r\n\tdef; d=example.org\r\n\r\n",
        );
        let header = &message.headers[0];

        let mut out = Vec::new();
        canonicalize_unsigned(header, Canonicalization::Simple, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ARC-Seal: i=1; cv=none; b=; d=example.org"
        );

        let mut out = Vec::new();
        canonicalize_unsigned(header, Canonicalization::Relaxed, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "arc-seal:i=1; cv=none; b=; d=example.org"
        );
    }
}
