//! Marker-annotated byte buffers.
//!
//! Property values and include-binary payloads flatten into a `Data`:
//! a plain byte string plus an ordered list of zero-length markers that
//! record label and cross-reference positions for the link-fixup pass
//! outside this core.

/// Kind of an embedded marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// A label attached at this offset
    Label,
    /// A cross-reference by node path
    RefPath,
    /// A cross-reference by handle; a placeholder cell follows
    RefPhandle,
}

/// Zero-length annotation at a byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Byte offset the marker points at
    pub offset: usize,
    /// Marker kind
    pub kind: MarkerKind,
    /// Referenced label text
    pub label: String,
}

/// Byte-string value with embedded markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Data {
    /// Raw bytes in emission order
    pub bytes: Vec<u8>,
    /// Markers ordered by offset
    pub markers: Vec<Marker>,
}

/// Placeholder written where a phandle cell will be fixed up later.
pub const PHANDLE_PLACEHOLDER: u32 = 0xffff_ffff;

impl Data {
    /// Creates an empty value.
    pub fn new() -> Self {
        Data::default()
    }

    /// Appends one byte.
    pub fn append_byte(&mut self, b: u8) {
        self.bytes.push(b);
    }

    /// Appends raw bytes verbatim.
    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Appends one 32-bit cell, big-endian.
    pub fn append_cell(&mut self, cell: u32) {
        self.bytes.extend_from_slice(&cell.to_be_bytes());
    }

    /// Appends one address-width (64-bit) value, big-endian.
    pub fn append_addr(&mut self, addr: u64) {
        self.bytes.extend_from_slice(&addr.to_be_bytes());
    }

    /// Appends a string with escape sequences processed, plus the
    /// terminating NUL byte.
    pub fn append_escaped_string(&mut self, s: &str) {
        self.bytes.extend(unescape(s));
        self.bytes.push(0);
    }

    /// Adds a zero-length marker at the current end of the buffer.
    pub fn add_marker(&mut self, kind: MarkerKind, label: impl Into<String>) {
        self.markers.push(Marker {
            offset: self.bytes.len(),
            kind,
            label: label.into(),
        });
    }

    /// Current length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if no byte was appended yet.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Processes C-style escape sequences into raw bytes.
///
/// Handles the usual single-character escapes plus up to three octal
/// digits and `\x` with up to two hex digits. An unknown escape yields
/// the escaped character itself.
pub fn unescape(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        match chars.next() {
            None => out.push(b'\\'),
            Some('a') => out.push(0x07),
            Some('b') => out.push(0x08),
            Some('t') => out.push(b'\t'),
            Some('n') => out.push(b'\n'),
            Some('v') => out.push(0x0b),
            Some('f') => out.push(0x0c),
            Some('r') => out.push(b'\r'),
            Some('x') => {
                let mut val: u8 = 0;
                let mut seen = 0;
                while seen < 2 {
                    match chars.peek().and_then(|c| c.to_digit(16)) {
                        Some(d) => {
                            val = (val << 4) | d as u8;
                            chars.next();
                            seen += 1;
                        }
                        None => break,
                    }
                }
                if seen > 0 {
                    out.push(val);
                } else {
                    out.push(b'x');
                }
            }
            Some(d @ '0'..='7') => {
                let mut val = d.to_digit(8).unwrap_or(0);
                let mut seen = 1;
                while seen < 3 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            val = (val << 3) | d;
                            chars.next();
                            seen += 1;
                        }
                        None => break,
                    }
                }
                out.push(val as u8);
            }
            Some(other) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_widths() {
        let mut d = Data::new();
        d.append_byte(0x01);
        d.append_cell(0x0203_0405);
        d.append_addr(0x0607_0809_0a0b_0c0d);

        assert_eq!(
            d.bytes,
            [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d]
        );
    }

    #[test]
    fn test_string_gets_terminator() {
        let mut d = Data::new();
        d.append_escaped_string("ab");
        assert_eq!(d.bytes, b"ab\0");
    }

    #[test]
    fn test_marker_records_offset() {
        let mut d = Data::new();
        d.append_cell(1);
        d.add_marker(MarkerKind::RefPhandle, "target");
        d.append_cell(PHANDLE_PLACEHOLDER);

        assert_eq!(d.markers.len(), 1);
        assert_eq!(d.markers[0].offset, 4);
        assert_eq!(d.markers[0].label, "target");
        assert_eq!(&d.bytes[4..], [0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_unescape_single_chars() {
        assert_eq!(unescape(r"a\tb\nc"), b"a\tb\nc");
        assert_eq!(unescape(r#"say \"hi\""#), b"say \"hi\"");
        assert_eq!(unescape(r"back\\slash"), b"back\\slash");
    }

    #[test]
    fn test_unescape_octal_and_hex() {
        assert_eq!(unescape(r"\101\102"), b"AB");
        assert_eq!(unescape(r"\x41\x4a"), b"AJ");
        assert_eq!(unescape(r"\0"), b"\0");
    }

    #[test]
    fn test_unescape_trailing_backslash() {
        assert_eq!(unescape(r"end\"), b"end\\");
    }
}
