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

use crate::message::RawHeader;

use super::Canonicalization;

#[derive(Debug, PartialEq, Eq)]
enum Char {
    Start,
    Other,
    Space,
}

/// Appends the canonical form of `header`, terminated by CRLF, to `out`.
pub fn canonicalize_header(
    header: &RawHeader<'_>,
    canonicalization: Canonicalization,
    out: &mut Vec<u8>,
) {
    match canonicalization {
        Canonicalization::Simple => {
            out.extend_from_slice(header.raw);
        }
        Canonicalization::Relaxed => {
            out.extend(header.name.iter().map(|ch| ch.to_ascii_lowercase()));
            out.push(b':');

            let mut last = Char::Start;
            for &ch in header.value {
                match ch {
                    b' ' | b'\t' => {
                        if last != Char::Start {
                            last = Char::Space;
                        }
                    }
                    b'\r' | b'\n' => (),
                    _ => {
                        if last == Char::Space {
                            out.push(b' ');
                        }
                        out.push(ch);
                        last = Char::Other;
                    }
                }
            }
        }
    }
    out.extend_from_slice(b"\r\n");
}

/// Returns the canonical form of a message body.
///
/// Trailing empty lines are removed and every line is terminated by CRLF,
/// bare LF line breaks included. An empty body canonicalizes to a single CRLF
/// in simple mode and to nothing in relaxed mode.
pub fn canonicalize_body(body: &[u8], canonicalization: Canonicalization) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 2);
    let mut line_buf = Vec::with_capacity(128);
    let mut empty_lines = 0;

    let mut lines = body.split(|&ch| ch == b'\n').collect::<Vec<_>>();
    if body.is_empty() || body.ends_with(b"\n") {
        lines.pop();
    }

    for line in lines {
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        line_buf.clear();
        match canonicalization {
            Canonicalization::Simple => line_buf.extend_from_slice(line),
            Canonicalization::Relaxed => {
                let mut last = Char::Other;
                for &ch in line {
                    match ch {
                        b' ' | b'\t' => {
                            last = Char::Space;
                        }
                        _ => {
                            if last == Char::Space {
                                line_buf.push(b' ');
                            }
                            line_buf.push(ch);
                            last = Char::Other;
                        }
                    }
                }
            }
        }

        if line_buf.is_empty() {
            empty_lines += 1;
        } else {
            for _ in 0..empty_lines {
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(&line_buf);
            out.extend_from_slice(b"\r\n");
            empty_lines = 0;
        }
    }

    if out.is_empty() && canonicalization == Canonicalization::Simple {
        out.extend_from_slice(b"\r\n");
    }

    out
}
