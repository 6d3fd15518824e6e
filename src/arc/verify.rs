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
        crypto::{RsaVerifier, VerifySignature},
        key::{ResolveKey, ResolveKeyAsync},
        Canonicalization,
    },
    message::Message,
};

use super::{
    chain::ChainValidator,
    group::{group_sets, Grouping},
    ArcValidationResult,
};

/// ARC chain verifier.
///
/// ```ignore
/// let result = ArcVerifier::new()
///     .strict(false)
///     .verify(&Message::parse(raw_message), &resolver)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ArcVerifier<V = RsaVerifier> {
    verifier: V,
    strict: bool,
    seal_canonicalization: Canonicalization,
}

enum Prepared<'x, 'm> {
    Done(ArcValidationResult<'x>),
    Validate(ChainValidator<'x, 'm>),
}

impl ArcVerifier {
    /// Creates a verifier backed by [`RsaVerifier`].
    pub fn new() -> Self {
        ArcVerifier::default()
    }
}

impl<V: VerifySignature> ArcVerifier<V> {
    /// Creates a verifier that checks signatures with `verifier`.
    pub fn with_verifier(verifier: V) -> Self {
        ArcVerifier {
            verifier,
            strict: false,
            seal_canonicalization: Canonicalization::default(),
        }
    }

    /// Report structurally invalid ARC headers as
    /// [`crate::Error::InvalidArcHeaders`] rather than as a failed chain.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Header canonicalization used to compute `ARC-Seal` digests.
    pub fn seal_canonicalization(mut self, canonicalization: Canonicalization) -> Self {
        self.seal_canonicalization = canonicalization;
        self
    }

    /// Verifies the ARC chain of `message`, fetching keys from `resolver`.
    pub fn verify<'x>(
        &self,
        message: &Message<'x>,
        resolver: &impl ResolveKey,
    ) -> crate::Result<ArcValidationResult<'x>> {
        let validator = match self.prepare(message)? {
            Prepared::Done(result) => return Ok(result),
            Prepared::Validate(validator) => validator,
        };

        let keys = validator
            .key_requests()
            .into_iter()
            .map(|request| {
                request.map(|request| resolver.resolve_key(request.selector, request.domain))
            })
            .collect();

        Ok(validator.validate(keys, &self.verifier))
    }

    /// Same as [`ArcVerifier::verify`] with an asynchronous key resolver.
    pub async fn verify_async<'x>(
        &self,
        message: &Message<'x>,
        resolver: &impl ResolveKeyAsync,
    ) -> crate::Result<ArcValidationResult<'x>> {
        let validator = match self.prepare(message)? {
            Prepared::Done(result) => return Ok(result),
            Prepared::Validate(validator) => validator,
        };

        let requests = validator.key_requests();
        let mut keys = Vec::with_capacity(requests.len());
        for request in requests {
            keys.push(match request {
                Some(request) => Some(
                    resolver
                        .resolve_key_async(request.selector, request.domain)
                        .await,
                ),
                None => None,
            });
        }

        Ok(validator.validate(keys, &self.verifier))
    }

    fn prepare<'x, 'm>(&self, message: &'m Message<'x>) -> crate::Result<Prepared<'x, 'm>> {
        // Nothing to authenticate
        if message.body.is_empty() {
            tracing::trace!("message has no body");
            return Ok(Prepared::Done(ArcValidationResult::none()));
        }

        Ok(match group_sets(message, self.strict)? {
            Grouping::Empty => Prepared::Done(ArcValidationResult::none()),
            Grouping::Invalid(flags) => {
                tracing::debug!(?flags, "invalid ARC headers");
                Prepared::Done(ArcValidationResult::fail(flags))
            }
            Grouping::Sets(sets) => Prepared::Validate(ChainValidator::new(
                message,
                sets,
                self.seal_canonicalization,
            )),
        })
    }
}
