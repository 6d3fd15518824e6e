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

use base64::{engine::general_purpose::STANDARD, Engine};

/// A parsed `tag=value; tag=value` list (RFC 6376, section 3.2).
///
/// Keys are case-sensitive and unique. Values are trimmed but otherwise kept
/// as written, folding included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagList<'x> {
    tags: Vec<(&'x str, &'x str)>,
}

pub(crate) fn is_wsp(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r' | '\n')
}

fn is_key_char(ch: u8) -> bool {
    (0x21..=0x7e).contains(&ch) && ch != b'='
}

impl<'x> TagList<'x> {
    pub fn parse(value: &'x str) -> crate::Result<Self> {
        let mut tags: Vec<(&'x str, &'x str)> = Vec::new();
        let mut segments = value.split(';').peekable();

        while let Some(segment) = segments.next() {
            if segment.trim_matches(is_wsp).is_empty() {
                if segments.peek().is_none() {
                    // Trailing separator
                    break;
                }
                return Err(crate::Error::ParseError);
            }

            let (key, value) = segment.split_once('=').ok_or(crate::Error::ParseError)?;
            let key = key.trim_matches(is_wsp);
            if key.is_empty() || !key.bytes().all(is_key_char) {
                return Err(crate::Error::ParseError);
            } else if tags.iter().any(|(k, _)| *k == key) {
                tracing::trace!(key, "duplicate tag");
                return Err(crate::Error::ParseError);
            }
            tags.push((key, value.trim_matches(is_wsp)));
        }

        Ok(TagList { tags })
    }

    pub fn get(&self, key: &str) -> Option<&'x str> {
        self.tags
            .iter()
            .find_map(|(k, v)| if *k == key { Some(*v) } else { None })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'x str, &'x str)> + '_ {
        self.tags.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Decodes `b=` and `bh=` values, which may contain folding whitespace anywhere.
pub fn decode_base64(value: &str) -> crate::Result<Vec<u8>> {
    let compact = value.chars().filter(|ch| !is_wsp(*ch)).collect::<String>();
    if compact.is_empty() {
        return Err(crate::Error::ParseError);
    }
    Ok(STANDARD.decode(compact.as_bytes())?)
}

/// Returns the tag list with the value of its `b=` tag, and any whitespace
/// around it, removed. Everything else is left untouched.
pub fn remove_signature(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for (num, segment) in value.split(';').enumerate() {
        if num > 0 {
            result.push(';');
        }
        match segment.split_once('=') {
            Some((key, _)) if key.trim_matches(is_wsp) == "b" => {
                result.push_str(key);
                result.push('=');
            }
            _ => result.push_str(segment),
        }
    }
    result
}
