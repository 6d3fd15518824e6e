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

/// A header field exactly as it appears in the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHeader<'x> {
    /// Field name, without any whitespace preceding the colon.
    pub name: &'x [u8],
    /// Everything after the colon, folding included, without the final line break.
    pub value: &'x [u8],
    /// The complete field, name through value, without the final line break.
    pub raw: &'x [u8],
    /// Index of the field within the header block, 0 being the topmost one.
    pub position: usize,
}

/// Borrowed view of a message: its header block in document order and its body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message<'x> {
    pub headers: Vec<RawHeader<'x>>,
    pub body: &'x [u8],
}

impl<'x> RawHeader<'x> {
    /// Returns `true` if the field name matches `name`, ignoring case.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.as_bytes())
    }

    /// The field value as UTF-8, if it is valid UTF-8.
    pub fn value_str(&self) -> Option<&'x str> {
        std::str::from_utf8(self.value).ok()
    }
}

impl<'x> Message<'x> {
    /// Creates a message view from headers supplied by an external message model.
    pub fn new(headers: Vec<RawHeader<'x>>, body: &'x [u8]) -> Self {
        Message { headers, body }
    }

    /// Splits a raw RFC 5322 message into its header fields and body.
    ///
    /// Lines may end in CRLF or a bare LF. Lines in the header block that do
    /// not contain a colon are skipped. When no empty line separates the
    /// headers from the body, the body is empty.
    pub fn parse(message: &'x [u8]) -> Self {
        let mut headers = Vec::new();
        let mut body = &message[message.len()..];
        let mut pos = 0;

        while pos < message.len() {
            let (line_end, next) = line_bounds(message, pos);
            if line_end == pos {
                body = &message[next..];
                break;
            }

            // Unfold continuation lines
            let mut field_end = line_end;
            let mut field_next = next;
            while field_next < message.len() && matches!(message[field_next], b' ' | b'\t') {
                let (line_end, next) = line_bounds(message, field_next);
                field_end = line_end;
                field_next = next;
            }

            let field = &message[pos..field_end];
            if let Some(colon) = field.iter().position(|&ch| ch == b':') {
                let mut name = &field[..colon];
                while let [rest @ .., b' ' | b'\t'] = name {
                    name = rest;
                }
                headers.push(RawHeader {
                    name,
                    value: &field[colon + 1..],
                    raw: field,
                    position: headers.len(),
                });
            }
            pos = field_next;
        }

        Message { headers, body }
    }

    /// Iterates over the fields named `name` in document order.
    pub fn headers_named<'y>(&'y self, name: &'y str) -> impl Iterator<Item = &'y RawHeader<'x>> {
        self.headers.iter().filter(move |header| header.is(name))
    }
}

/// Returns the end of the line content starting at `pos` (excluding the line
/// break) and the offset where the next line starts.
fn line_bounds(message: &[u8], pos: usize) -> (usize, usize) {
    match message[pos..].iter().position(|&ch| ch == b'\n') {
        Some(offset) => {
            let lf = pos + offset;
            let end = if lf > pos && message[lf - 1] == b'\r' {
                lf - 1
            } else {
                lf
            };
            (end, lf + 1)
        }
        None => (message.len(), message.len()),
    }
}

#[cfg(test)]
mod test {
    use super::Message;

    #[test]
    fn parse_message() {
        for (message, expected_headers, expected_body) in [
            (
                concat!(
                    "From: hello@stalw.art\r\n",
                    "To: dkim@stalw.art\r\n",
                    "Subject: Testing  DKIM!\r\n\r\n",
                    "Here goes the test\r\n\r\n"
                ),
                vec![
                    ("From", " hello@stalw.art"),
                    ("To", " dkim@stalw.art"),
                    ("Subject", " Testing  DKIM!"),
                ],
                "Here goes the test\r\n\r\n",
            ),
            (
                concat!(
                    "A: X\r\n",
                    "B : Y\t\r\n",
                    "\tZ  \r\n",
                    "\r\n",
                    " C \r\n",
                    "D \t E\r\n"
                ),
                vec![("A", " X"), ("B", " Y\t\r\n\tZ  ")],
                " C \r\nD \t E\r\n",
            ),
            (
                "X-Bare: lf\nX-Folded: a\n b\n\nbody\n",
                vec![("X-Bare", " lf"), ("X-Folded", " a\n b")],
                "body\n",
            ),
            ("Subject: no body\r\n", vec![("Subject", " no body")], ""),
            ("Subject: no newline", vec![("Subject", " no newline")], ""),
            ("no colon here\r\nA: b\r\n\r\n", vec![("A", " b")], ""),
            ("", vec![], ""),
        ] {
            let parsed = Message::parse(message.as_bytes());
            assert_eq!(
                parsed
                    .headers
                    .iter()
                    .map(|h| (
                        std::str::from_utf8(h.name).unwrap(),
                        std::str::from_utf8(h.value).unwrap()
                    ))
                    .collect::<Vec<_>>(),
                expected_headers,
                "{:?}",
                message
            );
            assert_eq!(std::str::from_utf8(parsed.body).unwrap(), expected_body);
            for (pos, header) in parsed.headers.iter().enumerate() {
                assert_eq!(header.position, pos);
            }
        }
    }

    #[test]
    fn raw_field_is_preserved() {
        let message = Message::parse(b"Subject : Hello\r\n  World\r\nto: x\r\n\r\n");
        assert_eq!(message.headers[0].raw, b"Subject : Hello\r\n  World");
        assert!(message.headers[1].is("To"));
        assert_eq!(message.headers_named("SUBJECT").count(), 1);
    }
}
