#![forbid(unsafe_code)]
//! Tag-length-value scanning and the character codecs used by card records.

pub mod tlv {
    //! Permissive BER-TLV scanner over simple one-byte tags.
    //!
    //! Card data in the wild is frequently padded with `0xFF` or truncated, so
    //! the scanner never fails: a malformed header or a value running past the
    //! end of the buffer simply ends the sequence.

    use core::fmt;

    /// Tag bytes that never start an object (padding / unused space).
    const TAG_PADDING: [u8; 2] = [0x00, 0xFF];
    /// Length prefix announcing a single following length byte (values 0x80..=0xFF).
    const LEN_ONE_BYTE: u8 = 0x81;

    /// One decoded (tag, length, value) object borrowing from the scanned buffer.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Tlv<'a> {
        /// Object tag.
        pub tag: u8,
        /// Object value; its length is the encoded length field.
        pub value: &'a [u8],
    }

    impl<'a> Tlv<'a> {
        /// Length of the value as encoded.
        pub fn len(&self) -> usize {
            self.value.len()
        }

        /// Returns true for a zero-length object.
        pub fn is_empty(&self) -> bool {
            self.value.is_empty()
        }

        /// Re-scans this object's value as a nested TLV sequence.
        pub fn nested(&self) -> TlvReader<'a> {
            TlvReader::new(self.value)
        }
    }

    impl fmt::Debug for Tlv<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Tlv")
                .field("tag", &format_args!("{:#04X}", self.tag))
                .field("len", &self.value.len())
                .finish()
        }
    }

    /// Lazy iterator over the TLV objects of a byte buffer.
    #[derive(Clone)]
    pub struct TlvReader<'a> {
        buf: &'a [u8],
        off: usize,
        done: bool,
    }

    impl<'a> TlvReader<'a> {
        /// Starts scanning at the beginning of `buf`.
        pub fn new(buf: &'a [u8]) -> Self {
            Self {
                buf,
                off: 0,
                done: false,
            }
        }

        /// Returns the number of bytes not yet consumed.
        pub fn remaining(&self) -> usize {
            self.buf.len().saturating_sub(self.off)
        }

        fn parse_next(&mut self) -> Option<Tlv<'a>> {
            let rest = self.buf.get(self.off..)?;
            let (&tag, rest) = rest.split_first()?;
            if TAG_PADDING.contains(&tag) {
                return None;
            }
            let (&first, rest) = rest.split_first()?;
            let (len, header) = if first < 0x80 {
                (first as usize, 2)
            } else if first == LEN_ONE_BYTE {
                let (&len, _) = rest.split_first()?;
                if len < 0x80 {
                    return None;
                }
                (len as usize, 3)
            } else {
                return None;
            };
            let start = self.off + header;
            let end = start.checked_add(len)?;
            let value = self.buf.get(start..end)?;
            self.off = end;
            Some(Tlv { tag, value })
        }
    }

    impl<'a> Iterator for TlvReader<'a> {
        type Item = Tlv<'a>;

        fn next(&mut self) -> Option<Self::Item> {
            if self.done {
                return None;
            }
            let item = self.parse_next();
            if item.is_none() {
                self.done = true;
            }
            item
        }
    }

    impl fmt::Debug for TlvReader<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("TlvReader")
                .field("off", &self.off)
                .field("remaining", &self.remaining())
                .finish()
        }
    }
}

pub mod gsm {
    //! GSM 03.38 default alphabet in its unpacked (one septet per byte) form,
    //! plus the UCS2 alpha-field variants used by address-book records.

    /// Byte that escapes into the extension table.
    pub const ESCAPE: u8 = 0x1B;
    /// Fill byte terminating a text field.
    pub const FILL: u8 = 0xFF;

    const SPACE: u8 = 0x20;

    #[rustfmt::skip]
    const DEFAULT_TABLE: [char; 128] = [
        '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
        'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{FFFF}', 'Æ', 'æ', 'ß', 'É',
        ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
        '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
        '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
        'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
        '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
        'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
    ];

    const EXTENSION_TABLE: [(u8, char); 10] = [
        (0x0A, '\u{0C}'),
        (0x14, '^'),
        (0x28, '{'),
        (0x29, '}'),
        (0x2F, '\\'),
        (0x3C, '['),
        (0x3D, '~'),
        (0x3E, ']'),
        (0x40, '|'),
        (0x65, '€'),
    ];

    fn default_char(code: u8) -> char {
        DEFAULT_TABLE
            .get(code as usize)
            .copied()
            .filter(|c| *c != '\u{FFFF}')
            .unwrap_or(' ')
    }

    fn extension_char(code: u8) -> Option<char> {
        EXTENSION_TABLE
            .iter()
            .find(|(k, _)| *k == code)
            .map(|(_, c)| *c)
    }

    /// Returns the septet sequence for `ch`, or `None` if the alphabet lacks it.
    pub fn encode_char(ch: char) -> Option<([u8; 2], usize)> {
        if ch != '\u{FFFF}' {
            if let Some(pos) = DEFAULT_TABLE.iter().position(|c| *c == ch) {
                return Some(([pos as u8, 0], 1));
            }
        }
        EXTENSION_TABLE
            .iter()
            .find(|(_, c)| *c == ch)
            .map(|(code, _)| ([ESCAPE, *code], 2))
    }

    /// Encodes `text` one septet per byte; characters outside the alphabet become spaces.
    pub fn encode_unpacked(text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len());
        for ch in text.chars() {
            match encode_char(ch) {
                Some((seq, n)) => out.extend_from_slice(&seq[..n]),
                None => out.push(SPACE),
            }
        }
        out
    }

    /// Returns true if every character of `text` has a GSM representation.
    pub fn is_encodable(text: &str) -> bool {
        text.chars().all(|c| encode_char(c).is_some())
    }

    /// Decodes unpacked septets up to the first fill byte.
    pub fn decode_unpacked(src: &[u8]) -> String {
        let mut out = String::with_capacity(src.len());
        let mut iter = src.iter().copied().peekable();
        while let Some(b) = iter.next() {
            match b {
                FILL => break,
                ESCAPE => match iter.peek().copied() {
                    Some(FILL) | None => break,
                    Some(next) => {
                        iter.next();
                        out.push(extension_char(next).unwrap_or_else(|| default_char(next)));
                    }
                },
                b if b < 0x80 => out.push(default_char(b)),
                _ => out.push(' '),
            }
        }
        out
    }

    /// Decodes an alpha field that may be GSM unpacked or one of the three UCS2 schemes.
    ///
    /// `0x80`: UCS2 big-endian until `0xFFFF`. `0x81`/`0x82`: a character count and
    /// a base code point, followed by bytes that are either GSM septets (high bit
    /// clear) or offsets from the base.
    pub fn decode_alpha(src: &[u8]) -> String {
        match src.first().copied() {
            Some(0x80) => decode_ucs2(&src[1..]),
            Some(0x81) if src.len() >= 3 => {
                let base = (src[2] as u32) << 7;
                decode_based(src[1] as usize, base, &src[3..])
            }
            Some(0x82) if src.len() >= 4 => {
                let base = u16::from_be_bytes([src[2], src[3]]) as u32;
                decode_based(src[1] as usize, base, &src[4..])
            }
            _ => decode_unpacked(src),
        }
    }

    fn decode_ucs2(src: &[u8]) -> String {
        let units: Vec<u16> = src
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .take_while(|u| *u != 0xFFFF)
            .collect();
        String::from_utf16_lossy(&units)
    }

    fn decode_based(count: usize, base: u32, body: &[u8]) -> String {
        let mut out = String::with_capacity(count);
        for &b in body.iter().take(count) {
            if b < 0x80 {
                out.push(default_char(b));
            } else {
                let code = base + (b & 0x7F) as u32;
                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            }
        }
        out
    }
}

pub mod bcd {
    //! Called-party BCD numbers: a TON/NPI byte followed by swapped-nibble digits.

    /// TON/NPI byte for an international ISDN number.
    pub const TOA_INTERNATIONAL: u8 = 0x91;
    /// TON/NPI byte for an unknown-type ISDN number.
    pub const TOA_UNKNOWN: u8 = 0x81;
    /// Longest number field (TON/NPI + 10 digit bytes) a record holds.
    pub const MAX_NUMBER_BYTES: usize = 11;

    /// Dialing pause separator as stored in BCD.
    pub const PAUSE: char = ',';
    /// Dialing wait separator as stored in BCD.
    pub const WAIT: char = ';';

    fn nibble_to_char(n: u8) -> Option<char> {
        match n {
            0..=9 => Some((b'0' + n) as char),
            0xA => Some('*'),
            0xB => Some('#'),
            0xC => Some(PAUSE),
            0xD => Some(WAIT),
            _ => None,
        }
    }

    fn char_to_nibble(c: char) -> Option<u8> {
        match c {
            '0'..='9' => Some(c as u8 - b'0'),
            '*' => Some(0xA),
            '#' => Some(0xB),
            PAUSE => Some(0xC),
            WAIT => Some(0xD),
            _ => None,
        }
    }

    /// Decodes a TON/NPI byte plus digit bytes; stops at the first `0xF` nibble.
    pub fn decode_called_party(src: &[u8]) -> String {
        let Some((&toa, digits)) = src.split_first() else {
            return String::new();
        };
        let mut out = String::with_capacity(digits.len() * 2 + 1);
        if toa & 0x70 == 0x10 {
            out.push('+');
        }
        out.push_str(&decode_digits(digits));
        out
    }

    /// Decodes swapped-nibble digits without a TON/NPI byte, up to the first `0xF` nibble.
    pub fn decode_digits(src: &[u8]) -> String {
        let mut out = String::with_capacity(src.len() * 2);
        'outer: for &b in src {
            for n in [b & 0x0F, b >> 4] {
                if n == 0x0F {
                    break 'outer;
                }
                if let Some(c) = nibble_to_char(n) {
                    out.push(c);
                }
            }
        }
        out
    }

    /// Encodes a dialable number; any `+` marks it international and is dropped.
    ///
    /// Returns `None` when the number has no digits or holds a character with
    /// no BCD representation.
    pub fn encode_called_party(number: &str) -> Option<Vec<u8>> {
        let international = number.contains('+');
        let nibbles = number
            .chars()
            .filter(|c| *c != '+')
            .map(char_to_nibble)
            .collect::<Option<Vec<u8>>>()?;
        if nibbles.is_empty() {
            return None;
        }
        let mut out = Vec::with_capacity(1 + nibbles.len().div_ceil(2));
        out.push(if international {
            TOA_INTERNATIONAL
        } else {
            TOA_UNKNOWN
        });
        for pair in nibbles.chunks(2) {
            let lo = pair[0];
            let hi = pair.get(1).copied().unwrap_or(0x0F);
            out.push((hi << 4) | lo);
        }
        Some(out)
    }

    /// Decodes the number field whose length byte sits at `len_at` in `record`.
    ///
    /// A zero or fill length yields an empty number; a length beyond
    /// [`MAX_NUMBER_BYTES`] or past the record end is rejected as empty.
    pub fn decode_number_field(record: &[u8], len_at: usize) -> String {
        let Some(&len) = record.get(len_at) else {
            return String::new();
        };
        let len = len as usize;
        if len == 0 || len == 0xFF || len > MAX_NUMBER_BYTES {
            return String::new();
        }
        match record.get(len_at + 1..len_at + 1 + len) {
            Some(field) => decode_called_party(field),
            None => String::new(),
        }
    }
}
