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

use crate::dkim::tags::TagList;

use super::MAX_INSTANCES;

/// Tags of an `ARC-Seal` header.
///
/// Only `i=` is checked while parsing. The remaining tags are validated when
/// the seal is verified, so that a seal lacking them fails verification
/// instead of being rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seal<'x> {
    pub instance: u32,
    pub algorithm: Option<&'x str>,
    pub signature: Option<&'x str>,
    pub chain_validation: Option<&'x str>,
    pub domain: Option<&'x str>,
    pub selector: Option<&'x str>,
    pub timestamp: Option<&'x str>,
    pub unknown: Vec<(&'x str, &'x str)>,
}

/// Tags of an `ARC-Message-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature<'x> {
    pub instance: u32,
    pub algorithm: Option<&'x str>,
    pub signature: Option<&'x str>,
    pub body_hash: Option<&'x str>,
    pub canonicalization: Option<&'x str>,
    pub domain: Option<&'x str>,
    pub selector: Option<&'x str>,
    pub headers: Option<&'x str>,
    pub timestamp: Option<&'x str>,
    pub unknown: Vec<(&'x str, &'x str)>,
}

/// Parses an `i=` value: a decimal number between 1 and [`MAX_INSTANCES`].
pub(crate) fn parse_instance(value: Option<&str>) -> crate::Result<u32> {
    let value = value.ok_or(crate::Error::InvalidInstance)?;
    if value.is_empty() || !value.bytes().all(|ch| ch.is_ascii_digit()) {
        return Err(crate::Error::InvalidInstance);
    }
    match value.parse::<u32>() {
        Ok(instance) if (1..=MAX_INSTANCES).contains(&instance) => Ok(instance),
        _ => Err(crate::Error::InvalidInstance),
    }
}

impl<'x> Seal<'x> {
    pub fn parse(value: &'x str) -> crate::Result<Self> {
        let tags = TagList::parse(value)?;
        let mut seal = Seal {
            instance: parse_instance(tags.get("i"))?,
            algorithm: None,
            signature: None,
            chain_validation: None,
            domain: None,
            selector: None,
            timestamp: None,
            unknown: Vec::new(),
        };

        for (key, value) in tags.iter() {
            match key {
                "i" => (),
                "a" => seal.algorithm = Some(value),
                "b" => seal.signature = Some(value),
                "cv" => seal.chain_validation = Some(value),
                "d" => seal.domain = Some(value),
                "s" => seal.selector = Some(value),
                "t" => seal.timestamp = Some(value),
                _ => seal.unknown.push((key, value)),
            }
        }

        Ok(seal)
    }
}

impl<'x> Signature<'x> {
    pub fn parse(value: &'x str) -> crate::Result<Self> {
        let tags = TagList::parse(value)?;
        let mut signature = Signature {
            instance: parse_instance(tags.get("i"))?,
            algorithm: None,
            signature: None,
            body_hash: None,
            canonicalization: None,
            domain: None,
            selector: None,
            headers: None,
            timestamp: None,
            unknown: Vec::new(),
        };

        for (key, value) in tags.iter() {
            match key {
                "i" => (),
                "a" => signature.algorithm = Some(value),
                "b" => signature.signature = Some(value),
                "bh" => signature.body_hash = Some(value),
                "c" => signature.canonicalization = Some(value),
                "d" => signature.domain = Some(value),
                "s" => signature.selector = Some(value),
                "h" => signature.headers = Some(value),
                "t" => signature.timestamp = Some(value),
                _ => signature.unknown.push((key, value)),
            }
        }

        Ok(signature)
    }
}

#[cfg(test)]
mod test {
    use super::{parse_instance, Seal, Signature};

    #[test]
    fn parse_instance_tag() {
        for (value, expected) in [
            (Some("1"), Some(1)),
            (Some("50"), Some(50)),
            (Some("007"), Some(7)),
            (Some("0"), None),
            (Some("51"), None),
            (Some(""), None),
            (Some("-1"), None),
            (Some("+1"), None),
            (Some("one"), None),
            (Some("1 2"), None),
            (Some("99999999999999999999"), None),
            (None, None),
        ] {
            assert_eq!(parse_instance(value).ok(), expected, "{:?}", value);
        }
    }

    #[test]
    fn parse_seal() {
        let seal = Seal::parse(
            "i=2; a=rsa-sha256; t=1700000000; cv=pass;\r\n\td=example.org; s=arc;\r\n\tb=abc\r\n\tdef; x-ext=1",
        )
        .unwrap();
        assert_eq!(seal.instance, 2);
        assert_eq!(seal.algorithm, Some("rsa-sha256"));
        assert_eq!(seal.chain_validation, Some("pass"));
        assert_eq!(seal.domain, Some("example.org"));
        assert_eq!(seal.selector, Some("arc"));
        assert_eq!(seal.signature, Some("abc\r\n\tdef"));
        assert_eq!(seal.unknown, vec![("x-ext", "1")]);

        // Structural errors
        assert!(Seal::parse("a=rsa-sha256; cv=none").is_err());
        assert!(Seal::parse("i=0; cv=none").is_err());
        assert!(Seal::parse("i=; cv=none").is_err());
        assert!(Seal::parse("i=1; cv=none; cv=pass").is_err());
        assert!(Seal::parse("i=1;; cv=none").is_err());

        // Missing verification tags are not structural errors
        assert!(Seal::parse("i=1").is_ok());
    }

    #[test]
    fn parse_message_signature() {
        let signature = Signature::parse(
            "i=1; a=rsa-sha256; c=relaxed/relaxed; d=example.org; s=default;\r\n\th=from:to; bh=Zm9v; b=YmFy",
        )
        .unwrap();
        assert_eq!(signature.instance, 1);
        assert_eq!(signature.canonicalization, Some("relaxed/relaxed"));
        assert_eq!(signature.headers, Some("from:to"));
        assert_eq!(signature.body_hash, Some("Zm9v"));
        assert_eq!(signature.signature, Some("YmFy"));
        assert!(signature.unknown.is_empty());

        // Tag keys are case-sensitive
        let signature = Signature::parse("i=1; D=example.org; d=example.net").unwrap();
        assert_eq!(signature.domain, Some("example.net"));
        assert_eq!(signature.unknown, vec![("D", "example.org")]);

        assert!(Signature::parse("I=1; d=example.org").is_err());
        assert!(Signature::parse("i=1; d=example.org; d=example.org").is_err());
    }
}
