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

use std::{collections::HashMap, future::Future};

use super::{
    tags::{decode_base64, TagList},
    Algorithm, HashAlgorithm, KeyType,
};

/// A decoded DKIM public key record (RFC 6376, section 3.6.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub key_type: KeyType,
    /// Acceptable hash algorithms, empty when the record allows any.
    pub hash_algorithms: Vec<HashAlgorithm>,
    /// The `t=y` flag: the domain is testing DKIM.
    pub testing: bool,
    /// DER encoded public key from the `p=` tag.
    pub public_key: Vec<u8>,
}

/// Blocking public key retrieval.
pub trait ResolveKey {
    /// Returns the key published for `selector` at `domain`, failing with
    /// [`crate::Error::KeyNotFound`] when no record exists and
    /// [`crate::Error::InvalidKeyRecord`] when it cannot be decoded.
    fn resolve_key(&self, selector: &str, domain: &str) -> crate::Result<KeyRecord>;
}

/// Non-blocking public key retrieval.
pub trait ResolveKeyAsync {
    fn resolve_key_async(
        &self,
        selector: &str,
        domain: &str,
    ) -> impl Future<Output = crate::Result<KeyRecord>> + Send;
}

impl<F> ResolveKey for F
where
    F: Fn(&str, &str) -> crate::Result<KeyRecord>,
{
    fn resolve_key(&self, selector: &str, domain: &str) -> crate::Result<KeyRecord> {
        self(selector, domain)
    }
}

impl KeyRecord {
    /// Decodes a `v=DKIM1; k=rsa; p=...` TXT record.
    pub fn parse(record: &str) -> crate::Result<Self> {
        let tags = TagList::parse(record).map_err(|_| crate::Error::InvalidKeyRecord)?;

        if let Some(version) = tags.get("v") {
            if version != "DKIM1" || tags.iter().next().map(|(key, _)| key) != Some("v") {
                return Err(crate::Error::InvalidKeyRecord);
            }
        }

        let key_type = match tags.get("k") {
            None | Some("rsa") => KeyType::Rsa,
            Some("ed25519") => KeyType::Ed25519,
            Some(_) => return Err(crate::Error::InvalidKeyRecord),
        };

        let hash_algorithms = tags
            .get("h")
            .map(|list| {
                list.split(':')
                    .filter_map(|hash| match hash.trim() {
                        "sha256" => Some(HashAlgorithm::Sha256),
                        "sha1" => Some(HashAlgorithm::Sha1),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if let Some(services) = tags.get("s") {
            if !services
                .split(':')
                .any(|service| matches!(service.trim(), "*" | "email"))
            {
                return Err(crate::Error::InvalidKeyRecord);
            }
        }

        let testing = tags
            .get("t")
            .map_or(false, |flags| flags.split(':').any(|flag| flag.trim() == "y"));

        let public_key = tags.get("p").ok_or(crate::Error::InvalidKeyRecord)?;
        if public_key.trim().is_empty() {
            return Err(crate::Error::RevokedKey);
        }

        Ok(KeyRecord {
            key_type,
            hash_algorithms,
            testing,
            public_key: decode_base64(public_key).map_err(|_| crate::Error::InvalidKeyRecord)?,
        })
    }

    /// Returns `true` if this key may be used with `algorithm`.
    pub fn permits(&self, algorithm: Algorithm) -> bool {
        self.key_type == algorithm.key_type()
            && (self.hash_algorithms.is_empty()
                || self.hash_algorithms.contains(&algorithm.hash_algorithm()))
    }
}

/// In-memory key records indexed by selector and domain.
///
/// Selector and domain are matched exactly as given.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    records: HashMap<String, String>,
}

impl KeyStore {
    pub fn new() -> Self {
        KeyStore::default()
    }

    /// Adds the TXT record published for `selector` at `domain`.
    pub fn record(
        mut self,
        selector: impl AsRef<str>,
        domain: impl AsRef<str>,
        record: impl Into<String>,
    ) -> Self {
        self.insert(selector, domain, record);
        self
    }

    pub fn insert(
        &mut self,
        selector: impl AsRef<str>,
        domain: impl AsRef<str>,
        record: impl Into<String>,
    ) {
        self.records.insert(
            format!("{}._domainkey.{}", selector.as_ref(), domain.as_ref()),
            record.into(),
        );
    }
}

impl ResolveKey for KeyStore {
    fn resolve_key(&self, selector: &str, domain: &str) -> crate::Result<KeyRecord> {
        self.records
            .get(&format!("{}._domainkey.{}", selector, domain))
            .ok_or(crate::Error::KeyNotFound)
            .and_then(|record| KeyRecord::parse(record))
    }
}

impl ResolveKeyAsync for KeyStore {
    fn resolve_key_async(
        &self,
        selector: &str,
        domain: &str,
    ) -> impl Future<Output = crate::Result<KeyRecord>> + Send {
        std::future::ready(self.resolve_key(selector, domain))
    }
}

#[cfg(test)]
mod test {
    use crate::dkim::{Algorithm, HashAlgorithm, KeyType};

    use super::{KeyRecord, KeyStore, ResolveKey};

    #[test]
    fn parse_key_record() {
        for (record, expected) in [
            (
                "v=DKIM1; k=rsa; p=aGVsbG8=",
                Ok((KeyType::Rsa, vec![], false, b"hello".to_vec())),
            ),
            (
                "p=aGVs\r\n bG8=",
                Ok((KeyType::Rsa, vec![], false, b"hello".to_vec())),
            ),
            (
                "v=DKIM1; h=sha256:md5; t=y:s; s=email; p=aGVsbG8=",
                Ok((
                    KeyType::Rsa,
                    vec![HashAlgorithm::Sha256],
                    true,
                    b"hello".to_vec(),
                )),
            ),
            (
                "k=ed25519; s=*; p=aGVsbG8=",
                Ok((KeyType::Ed25519, vec![], false, b"hello".to_vec())),
            ),
            ("v=DKIM1; p=", Err(crate::Error::RevokedKey)),
            ("v=DKIM1; k=rsa", Err(crate::Error::InvalidKeyRecord)),
            ("v=DKIM2; p=aGVsbG8=", Err(crate::Error::InvalidKeyRecord)),
            ("p=aGVsbG8=; v=DKIM1", Err(crate::Error::InvalidKeyRecord)),
            ("k=dsa; p=aGVsbG8=", Err(crate::Error::InvalidKeyRecord)),
            ("s=web; p=aGVsbG8=", Err(crate::Error::InvalidKeyRecord)),
            ("p=!!!", Err(crate::Error::InvalidKeyRecord)),
            ("not a record", Err(crate::Error::InvalidKeyRecord)),
        ] {
            assert_eq!(
                KeyRecord::parse(record).map(|record| (
                    record.key_type,
                    record.hash_algorithms,
                    record.testing,
                    record.public_key
                )),
                expected,
                "{:?}",
                record
            );
        }
    }

    #[test]
    fn key_permits_algorithm() {
        let record = KeyRecord::parse("h=sha256; p=aGVsbG8=").unwrap();
        assert!(record.permits(Algorithm::RsaSha256));
        assert!(!record.permits(Algorithm::RsaSha1));
        assert!(!record.permits(Algorithm::Ed25519Sha256));

        let record = KeyRecord::parse("p=aGVsbG8=").unwrap();
        assert!(record.permits(Algorithm::RsaSha1));
    }

    #[test]
    fn key_store_lookup() {
        let store = KeyStore::new()
            .record("default", "example.org", "v=DKIM1; p=aGVsbG8=")
            .record("broken", "example.org", "v=DKIM1; p=%%%");

        assert!(store.resolve_key("default", "example.org").is_ok());
        assert_eq!(
            store.resolve_key("Default", "example.org"),
            Err(crate::Error::KeyNotFound)
        );
        assert_eq!(
            store.resolve_key("other", "example.org"),
            Err(crate::Error::KeyNotFound)
        );
        assert_eq!(
            store.resolve_key("broken", "example.org"),
            Err(crate::Error::InvalidKeyRecord)
        );
    }

    #[tokio::test]
    async fn key_store_async_lookup() {
        use super::ResolveKeyAsync;

        let store = KeyStore::new().record("default", "example.org", "p=aGVsbG8=");
        assert_eq!(
            store
                .resolve_key_async("default", "example.org")
                .await
                .unwrap()
                .public_key,
            b"hello"
        );
    }
}
