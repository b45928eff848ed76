//! Tolerant, line-oriented playlist parsing.
//!
//! The parser recognizes exactly one dialect, gated by the `#EXTM3U`
//! marker. Within a recognized document it is deliberately forgiving:
//! anything that is neither a name directive nor a URL with an accepted
//! scheme is dropped without note. The input slice is never modified.

use memchr::memchr;
use thiserror::Error;

/// Marker that must open the document, after leading whitespace.
const FORMAT_MARKER: &[u8] = b"#EXTM3U";

/// Prefix of a name directive line.
const NAME_DIRECTIVE: &[u8] = b"#EXTINF:";

/// One parsed playlist entry, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    /// Stream source URL.
    pub url: String,
    /// Display name from the most recent name directive, if any.
    pub name: Option<String>,
}

/// The payload does not carry the format marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unrecognized playlist format")]
pub struct FormatError;

/// Iterator over `\n`-delimited lines of a byte slice.
///
/// The delimiter is a single line feed; carriage returns are content. A
/// trailing fragment without a final newline still counts as a line.
struct Lines<'a> {
    rest: &'a [u8],
    done: bool,
}

fn lines(data: &[u8]) -> Lines<'_> {
    Lines { rest: data, done: false }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.done {
            return None;
        }
        match memchr(b'\n', self.rest) {
            Some(pos) => {
                let line = &self.rest[..pos];
                self.rest = &self.rest[pos + 1..];
                Some(line)
            }
            None => {
                self.done = true;
                if self.rest.is_empty() {
                    None
                } else {
                    Some(self.rest)
                }
            }
        }
    }
}

/// Strips leading bytes at or below 0x20 (whitespace and control bytes).
fn trim_left(mut bytes: &[u8]) -> &[u8] {
    while let Some((first, rest)) = bytes.split_first() {
        if *first > b' ' {
            break;
        }
        bytes = rest;
    }
    bytes
}

/// URL schemes the network knows how to fetch from.
fn accepted_scheme(url: &[u8]) -> bool {
    url.starts_with(b"file://") || url.starts_with(b"http://") || url.starts_with(b"https://")
}

/// Parses a playlist document into an ordered entry sequence.
///
/// The buffer is checked for the format marker before anything else; a
/// payload without it is rejected with no side effects. The first line is
/// only the marker and is always skipped. A name directive replaces the
/// pending name (or clears it, when the directive has no usable content);
/// each accepted URL line becomes one entry carrying the pending name.
pub fn parse_playlist(data: &[u8]) -> Result<Vec<PlaylistEntry>, FormatError> {
    let body = trim_left(data);
    if !body.starts_with(FORMAT_MARKER) {
        return Err(FormatError);
    }

    let mut entries = Vec::new();
    let mut pending_name: Option<&[u8]> = None;

    for line in lines(body).skip(1) {
        if let Some(directive) = line.strip_prefix(NAME_DIRECTIVE) {
            // Directive content up to the first comma is not a name.
            pending_name = match memchr(b',', directive) {
                Some(comma) => {
                    let name = trim_left(&directive[comma + 1..]);
                    (!name.is_empty()).then_some(name)
                }
                None => None,
            };
            continue;
        }

        let url = trim_left(line);
        if url.is_empty() || !accepted_scheme(url) {
            continue;
        }

        // The pending name survives consumption and rejected candidates:
        // consecutive URL lines under one directive all inherit its name.
        entries.push(PlaylistEntry {
            url: String::from_utf8_lossy(url).into_owned(),
            name: pending_name.map(|name| String::from_utf8_lossy(name).into_owned()),
        });
    }

    Ok(entries)
}
