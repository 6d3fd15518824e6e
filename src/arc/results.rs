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

use crate::dkim::tags::is_wsp;

use super::parse::parse_instance;

/// Contents of an `ARC-Authentication-Results` header: an `i=` tag followed
/// by an RFC 8601 authentication results payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResults {
    pub instance: u32,
    pub authserv_id: String,
    /// `(method, result)` pairs, empty for a `none` payload.
    pub results: Vec<(String, String)>,
}

struct Scanner<'x> {
    input: &'x str,
    pos: usize,
}

impl AuthenticationResults {
    pub fn parse(value: &str) -> crate::Result<Self> {
        let (instance, payload) = value.split_once(';').ok_or(crate::Error::ParseError)?;
        let instance = match instance.split_once('=') {
            Some((key, value)) if key.trim_matches(is_wsp) == "i" => {
                parse_instance(Some(value.trim_matches(is_wsp)))?
            }
            _ => return Err(crate::Error::InvalidInstance),
        };

        let payload = strip_comments(payload)?;
        let mut scanner = Scanner {
            input: &payload,
            pos: 0,
        };

        // authserv-id [ version ]
        scanner.skip_wsp();
        let authserv_id = scanner.value().ok_or(crate::Error::ParseError)?;
        scanner.skip_wsp();
        scanner.digits();

        let mut results = Vec::new();
        let mut no_result = false;
        loop {
            scanner.skip_wsp();
            if scanner.is_eof() {
                break;
            } else if !scanner.eat(b';') {
                return Err(crate::Error::ParseError);
            }
            scanner.skip_wsp();
            if scanner.is_eof() {
                break;
            } else if no_result {
                return Err(crate::Error::ParseError);
            }

            // method [ "/" version ] "=" result
            let method = scanner.keyword().ok_or(crate::Error::ParseError)?;
            scanner.skip_wsp();
            if results.is_empty()
                && method.eq_ignore_ascii_case("none")
                && (scanner.is_eof() || scanner.peek() == Some(b';'))
            {
                no_result = true;
                continue;
            }
            if scanner.eat(b'/') {
                scanner.skip_wsp();
                scanner.digits().ok_or(crate::Error::ParseError)?;
                scanner.skip_wsp();
            }
            if !scanner.eat(b'=') {
                return Err(crate::Error::ParseError);
            }
            scanner.skip_wsp();
            let result = scanner.keyword().ok_or(crate::Error::ParseError)?;

            // ptype.property=value, reason=value and bare property=value
            // (action=none and similar, as written by Office 365)
            loop {
                scanner.skip_wsp();
                if scanner.is_eof() || scanner.peek() == Some(b';') {
                    break;
                }
                scanner.keyword().ok_or(crate::Error::ParseError)?;
                scanner.skip_wsp();
                if scanner.peek() != Some(b'=') {
                    if !scanner.eat(b'.') {
                        return Err(crate::Error::ParseError);
                    }
                    scanner.skip_wsp();
                    scanner.keyword().ok_or(crate::Error::ParseError)?;
                    scanner.skip_wsp();
                }
                if !scanner.eat(b'=') {
                    return Err(crate::Error::ParseError);
                }
                scanner.skip_wsp();
                scanner.property_value().ok_or(crate::Error::ParseError)?;
            }

            results.push((method.to_string(), result.to_string()));
        }

        if results.is_empty() && !no_result {
            return Err(crate::Error::ParseError);
        }

        Ok(AuthenticationResults {
            instance,
            authserv_id: authserv_id.to_string(),
            results,
        })
    }
}

/// Replaces each (possibly nested) comment with a single space.
fn strip_comments(value: &str) -> crate::Result<String> {
    let mut result = String::with_capacity(value.len());
    let mut depth = 0;
    let mut quoted = false;
    let mut escaped = false;

    for ch in value.chars() {
        if escaped {
            if depth == 0 {
                result.push(ch);
            }
            escaped = false;
            continue;
        }
        match ch {
            '\\' if quoted || depth > 0 => {
                if depth == 0 {
                    result.push(ch);
                }
                escaped = true;
            }
            '"' if depth == 0 => {
                quoted = !quoted;
                result.push(ch);
            }
            '(' if !quoted => {
                depth += 1;
            }
            ')' if !quoted => {
                if depth == 0 {
                    return Err(crate::Error::ParseError);
                }
                depth -= 1;
                if depth == 0 {
                    result.push(' ');
                }
            }
            _ if depth > 0 => (),
            _ => result.push(ch),
        }
    }

    if depth == 0 && !quoted {
        Ok(result)
    } else {
        Err(crate::Error::ParseError)
    }
}

impl<'x> Scanner<'x> {
    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_wsp(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, f: impl Fn(u8) -> bool) -> Option<&'x str> {
        let start = self.pos;
        while self.peek().map_or(false, &f) {
            self.pos += 1;
        }
        if self.pos > start {
            Some(&self.input[start..self.pos])
        } else {
            None
        }
    }

    fn digits(&mut self) -> Option<&'x str> {
        self.take_while(|ch| ch.is_ascii_digit())
    }

    fn keyword(&mut self) -> Option<&'x str> {
        self.take_while(|ch| ch.is_ascii_alphanumeric() || matches!(ch, b'-' | b'_'))
    }

    fn quoted_string(&mut self) -> Option<&'x str> {
        let start = self.pos;
        if !self.eat(b'"') {
            return None;
        }
        let mut escaped = false;
        while let Some(ch) = self.peek() {
            self.pos += 1;
            match ch {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => return Some(&self.input[start..self.pos]),
                _ => (),
            }
        }
        None
    }

    /// RFC 2045 token or quoted-string.
    fn value(&mut self) -> Option<&'x str> {
        if self.peek() == Some(b'"') {
            self.quoted_string()
        } else {
            self.take_while(|ch| {
                ch > b' '
                    && ch != 0x7f
                    && !matches!(
                        ch,
                        b'(' | b')'
                            | b'<'
                            | b'>'
                            | b'@'
                            | b','
                            | b';'
                            | b':'
                            | b'\\'
                            | b'"'
                            | b'/'
                            | b'['
                            | b']'
                            | b'?'
                            | b'='
                    )
            })
        }
    }

    /// Property values also allow addresses and domains.
    fn property_value(&mut self) -> Option<&'x str> {
        if self.peek() == Some(b'"') {
            self.quoted_string()
        } else {
            self.take_while(|ch| ch > b' ' && ch != 0x7f && !matches!(ch, b';' | b'"'))
        }
    }
}
