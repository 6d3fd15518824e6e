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

use super::tags::is_wsp;

/// Resolves an `h=` list against the header block.
///
/// Each name binds to the bottom-most header of that name not yet claimed by
/// an earlier entry. Names with no remaining instance resolve to `None`.
pub fn select_headers<'x, 'y>(
    h: &str,
    headers: &'y [RawHeader<'x>],
) -> Vec<Option<&'y RawHeader<'x>>> {
    let mut consumed = vec![false; headers.len()];

    h.split(':')
        .map(|name| name.trim_matches(is_wsp))
        .filter(|name| !name.is_empty())
        .map(|name| {
            let (pos, header) = headers
                .iter()
                .enumerate()
                .rev()
                .find(|(pos, header)| !consumed[*pos] && header.is(name))?;
            consumed[pos] = true;
            Some(header)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use crate::message::Message;

    use super::select_headers;

    #[test]
    fn select_bottom_up() {
        let message = Message::parse(
            concat!(
                "Received: first\r\n",
                "From: a@example.org\r\n",
                "Received: second\r\n",
                "Subject: hello\r\n",
                "Received: third\r\n",
                "\r\n",
                "body\r\n"
            )
            .as_bytes(),
        );

        for (h, expected) in [
            ("from:subject", vec![Some(1), Some(3)]),
            ("received", vec![Some(4)]),
            (
                "Received : RECEIVED:\r\n\treceived:received",
                vec![Some(4), Some(2), Some(0), None],
            ),
            ("from:to:from", vec![Some(1), None, None]),
            ("", vec![]),
            (" ", vec![]),
        ] {
            assert_eq!(
                select_headers(h, &message.headers)
                    .into_iter()
                    .map(|header| header.map(|header| header.position))
                    .collect::<Vec<_>>(),
                expected,
                "{:?}",
                h
            );
        }
    }
}
