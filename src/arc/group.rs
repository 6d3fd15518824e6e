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

use std::collections::{btree_map::Entry, BTreeMap};

use crate::message::{Message, RawHeader};

use super::{
    ArcHeader, ArcHeaderSet, AuthenticationResults, ErrorFlags, Seal, Signature,
    ARC_AUTHENTICATION_RESULTS, ARC_MESSAGE_SIGNATURE, ARC_SEAL,
};

/// Outcome of scanning a message for ARC header sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grouping<'x> {
    /// No ARC headers are present.
    Empty,
    /// Complete sets for instances `1..=n`, in ascending order.
    Sets(Vec<ArcHeaderSet<'x>>),
    /// The ARC headers are structurally broken.
    Invalid(ErrorFlags),
}

/// Groups the ARC headers of `message` by instance and checks that each
/// instance up to the highest one has exactly one header of each type.
///
/// With `strict` set, structural errors are returned as
/// [`crate::Error::InvalidArcHeaders`] instead of [`Grouping::Invalid`].
pub fn group_sets<'x>(message: &Message<'x>, strict: bool) -> crate::Result<Grouping<'x>> {
    let mut seals = BTreeMap::new();
    let mut signatures = BTreeMap::new();
    let mut results = BTreeMap::new();
    let mut flags = ErrorFlags::empty();
    let mut has_arc = false;

    for header in &message.headers {
        if header.is(ARC_SEAL) {
            has_arc = true;
            match header.value_str().ok_or(crate::Error::ParseError).and_then(Seal::parse) {
                Ok(seal) => insert(
                    &mut seals,
                    seal.instance,
                    header,
                    seal,
                    ErrorFlags::DUPLICATE_ARC_SEAL,
                    &mut flags,
                ),
                Err(err) => {
                    tracing::debug!(position = header.position, %err, "invalid ARC-Seal");
                    flags |= ErrorFlags::INVALID_ARC_SEAL;
                }
            }
        } else if header.is(ARC_MESSAGE_SIGNATURE) {
            has_arc = true;
            match header
                .value_str()
                .ok_or(crate::Error::ParseError)
                .and_then(Signature::parse)
            {
                Ok(signature) => insert(
                    &mut signatures,
                    signature.instance,
                    header,
                    signature,
                    ErrorFlags::DUPLICATE_ARC_MESSAGE_SIGNATURE,
                    &mut flags,
                ),
                Err(err) => {
                    tracing::debug!(position = header.position, %err, "invalid ARC-Message-Signature");
                    flags |= ErrorFlags::INVALID_ARC_MESSAGE_SIGNATURE;
                }
            }
        } else if header.is(ARC_AUTHENTICATION_RESULTS) {
            has_arc = true;
            match header
                .value_str()
                .ok_or(crate::Error::ParseError)
                .and_then(AuthenticationResults::parse)
            {
                Ok(auth_results) => insert(
                    &mut results,
                    auth_results.instance,
                    header,
                    auth_results,
                    ErrorFlags::DUPLICATE_ARC_AUTHENTICATION_RESULTS,
                    &mut flags,
                ),
                Err(err) => {
                    tracing::debug!(position = header.position, %err, "invalid ARC-Authentication-Results");
                    flags |= ErrorFlags::INVALID_ARC_AUTHENTICATION_RESULTS;
                }
            }
        }
    }

    if !has_arc {
        return Ok(Grouping::Empty);
    }

    // Missing headers are only meaningful once every header was understood
    if flags.is_empty() {
        let max_instance = [
            seals.keys().next_back(),
            signatures.keys().next_back(),
            results.keys().next_back(),
        ]
        .into_iter()
        .flatten()
        .copied()
        .max()
        .unwrap_or(0);

        for instance in 1..=max_instance {
            if !seals.contains_key(&instance) {
                tracing::debug!(instance, "missing ARC-Seal");
                flags |= ErrorFlags::MISSING_ARC_SEAL;
            }
            if !signatures.contains_key(&instance) {
                tracing::debug!(instance, "missing ARC-Message-Signature");
                flags |= ErrorFlags::MISSING_ARC_MESSAGE_SIGNATURE;
            }
            if !results.contains_key(&instance) {
                tracing::debug!(instance, "missing ARC-Authentication-Results");
                flags |= ErrorFlags::MISSING_ARC_AUTHENTICATION_RESULTS;
            }
        }
    }

    if !flags.is_empty() {
        return if strict {
            Err(crate::Error::InvalidArcHeaders(flags))
        } else {
            Ok(Grouping::Invalid(flags))
        };
    }

    let sets = seals
        .into_iter()
        .zip(signatures.into_values())
        .zip(results.into_values())
        .map(|(((instance, seal), message_signature), auth_results)| ArcHeaderSet {
            instance,
            seal,
            message_signature,
            auth_results,
        })
        .collect::<Vec<_>>();
    tracing::trace!(instances = sets.len(), "grouped ARC sets");

    Ok(Grouping::Sets(sets))
}

fn insert<'x, T>(
    map: &mut BTreeMap<u32, ArcHeader<'x, T>>,
    instance: u32,
    header: &RawHeader<'x>,
    parsed: T,
    duplicate: ErrorFlags,
    flags: &mut ErrorFlags,
) {
    match map.entry(instance) {
        Entry::Vacant(entry) => {
            entry.insert(ArcHeader {
                header: *header,
                parsed,
            });
        }
        Entry::Occupied(_) => {
            tracing::debug!(instance, ?duplicate, "duplicate ARC header");
            *flags |= duplicate;
        }
    }
}
