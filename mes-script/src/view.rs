//! Script container parsing.
//!
//! Layout (little-endian), stride-4 titles:
//! - 0x00: i32 label_count
//! - 0x04: [label_count] i32 labels
//! - label_count * 4 + 4: version (1 or 2 bytes, 3 when the word at 0x04 is `3`)
//! - then the opcode stream ("asmbin") up to EOF
//!
//! Stride-6 titles put the version at `label_count * 6 + 4` (3 bytes) and
//! always keep the labels at 0x08.
//!
//! A view never fails to construct. Anything it cannot make sense of leaves
//! the affected region empty, and [`ScriptView::is_parsed`] reports whether
//! the opcode stream was tokenized.

use byteorder::{ByteOrder, LittleEndian};

use crate::profile::{
    query_by_name, query_by_sniff, query_by_version, FormatProfile, HeaderLayout, TokenKind,
    WIDE_HEADER_MARKER,
};

/// A `(start, length)` byte window into the owning buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Region {
    pub offset: usize,
    pub len: usize,
}

impl Region {
    pub const EMPTY: Region = Region { offset: 0, len: 0 };

    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The region's bytes, or an empty slice when it does not fit `data`.
    pub fn slice<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        data.get(self.offset..self.end()).unwrap_or(&[])
    }
}

/// One instruction of the opcode stream. `offset` is relative to the asmbin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub offset: usize,
    pub length: usize,
    pub opcode: u8,
    pub kind: TokenKind,
}

/// A token together with the bytes it covers.
#[derive(Debug, Clone, Copy)]
pub struct TokenRef<'a> {
    token: &'a Token,
    bytes: &'a [u8],
}

impl<'a> TokenRef<'a> {
    #[inline]
    pub fn token(&self) -> &'a Token {
        self.token
    }

    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.token.offset
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.token.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.token.length == 0
    }

    #[inline]
    pub fn opcode(&self) -> u8 {
        self.token.opcode
    }

    #[inline]
    pub fn kind(&self) -> TokenKind {
        self.token.kind
    }

    pub fn fixed2(&self) -> Option<[u8; 2]> {
        if self.kind() != TokenKind::Fixed2 {
            return None;
        }
        let args = self.bytes.get(1..3)?;
        Some([args[0], args[1]])
    }

    /// The fixed byte and the string (without NUL) of a tail-string token.
    pub fn tail_string(&self) -> Option<(u8, &'a [u8])> {
        if self.kind() != TokenKind::FixedTailString {
            return None;
        }
        let arg = *self.bytes.get(1)?;
        let s = self.bytes.get(2..self.bytes.len().checked_sub(1)?)?;
        Some((arg, s))
    }

    /// The raw payload (without NUL) of a plain or enciphered string token.
    pub fn string(&self) -> Option<&'a [u8]> {
        match self.kind() {
            TokenKind::PlainString | TokenKind::CipherString => {
                self.bytes.get(1..self.bytes.len().checked_sub(1)?)
            }
            _ => None,
        }
    }

    pub fn uint16x4(&self) -> Option<[u16; 4]> {
        if self.kind() != TokenKind::FixedUint16x4 {
            return None;
        }
        let args = self.bytes.get(1..9)?;
        let mut out = [0u16; 4];
        LittleEndian::read_u16_into(args, &mut out);
        Some(out)
    }

    /// The C string that starts right after the opcode, for any string-bearing shape.
    pub fn text_payload(&self) -> Option<&'a [u8]> {
        match self.kind() {
            TokenKind::Fixed2 | TokenKind::FixedUint16x4 => None,
            _ => {
                let rest = self.bytes.get(1..)?;
                let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
                Some(&rest[..end])
            }
        }
    }
}

/// A parsed `.mes` script. Owns its buffer; all regions index into it.
#[derive(Debug, Clone)]
pub struct ScriptView {
    raw: Vec<u8>,
    profile: Option<&'static FormatProfile>,
    version: u16,
    version_width: usize,
    asmbin: Region,
    labels: Region,
    tokens: Vec<Token>,
}

impl ScriptView {
    /// Parse `raw`, sniffing the title when `profile` is `None`.
    pub fn parse(raw: Vec<u8>, profile: Option<&'static FormatProfile>) -> Self {
        let mut view = ScriptView {
            raw,
            profile: None,
            version: 0,
            version_width: 0,
            asmbin: Region::EMPTY,
            labels: Region::EMPTY,
            tokens: Vec::new(),
        };

        let Some(profile) = profile.or_else(|| query_by_sniff(&view.raw)) else {
            log::debug!("no format profile matches this script");
            return view;
        };
        view.profile = Some(profile);

        match profile.layout {
            HeaderLayout::Stride4 => view.init_stride4(profile),
            HeaderLayout::Stride6 => view.init_stride6(),
        }

        view.tokens = tokenize(view.asmbin.slice(&view.raw), profile).unwrap_or_default();
        view
    }

    pub fn with_name(raw: Vec<u8>, name: &str) -> Self {
        Self::parse(raw, query_by_name(name))
    }

    pub fn with_version(raw: Vec<u8>, version: u16) -> Self {
        Self::parse(raw, query_by_version(version))
    }

    fn header_words(&self) -> Option<(usize, i32)> {
        let label_count = usize::try_from(read_i32(&self.raw, 0)?).ok()?;
        let marker = read_i32(&self.raw, 4).unwrap_or(0);
        Some((label_count, marker))
    }

    fn init_stride4(&mut self, profile: &FormatProfile) {
        let Some((label_count, marker)) = self.header_words() else {
            return;
        };
        let Some(header) = label_count.checked_mul(4).and_then(|n| n.checked_add(4)) else {
            return;
        };
        let size = self.raw.len();
        if size <= header {
            return;
        }

        let wide = marker == WIDE_HEADER_MARKER;
        let width = if wide {
            3
        } else if profile.has_single_byte_version() {
            1
        } else {
            2
        };
        if size <= header + width {
            return;
        }

        self.version = if width == 1 {
            u16::from(self.raw[header])
        } else {
            LittleEndian::read_u16(&self.raw[header..header + 2])
        };
        self.version_width = width;
        self.asmbin = Region {
            offset: header + width,
            len: size - header - width,
        };
        // with the table moved to 0x08 the first slot is taken by the marker
        self.labels = if wide {
            Region {
                offset: 8,
                len: label_count.saturating_sub(1) * 4,
            }
        } else {
            Region {
                offset: 4,
                len: label_count * 4,
            }
        };
    }

    fn init_stride6(&mut self) {
        let Some((label_count, _)) = self.header_words() else {
            return;
        };
        let Some(header) = label_count.checked_mul(6).and_then(|n| n.checked_add(4)) else {
            return;
        };
        let size = self.raw.len();
        if size <= header + 3 {
            return;
        }

        self.version = LittleEndian::read_u16(&self.raw[header..header + 2]);
        self.version_width = 3;
        self.asmbin = Region {
            offset: header + 3,
            len: size - header - 3,
        };
        self.labels = Region {
            offset: 8,
            len: header.saturating_sub(8) / 4 * 4,
        };
    }

    #[inline]
    pub fn is_parsed(&self) -> bool {
        !self.tokens.is_empty()
    }

    #[inline]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }

    #[inline]
    pub fn profile(&self) -> Option<&'static FormatProfile> {
        self.profile
    }

    #[inline]
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Width of the version field, which is also the label anchor distance
    /// for stride-4 tables at 0x04.
    #[inline]
    pub fn version_width(&self) -> usize {
        self.version_width
    }

    #[inline]
    pub fn asmbin(&self) -> &[u8] {
        self.asmbin.slice(&self.raw)
    }

    #[inline]
    pub fn asmbin_offset(&self) -> usize {
        self.asmbin.offset
    }

    #[inline]
    pub fn labels_offset(&self) -> usize {
        self.labels.offset
    }

    #[inline]
    pub fn label_count(&self) -> usize {
        self.labels.len / 4
    }

    pub fn label(&self, index: usize) -> Option<i32> {
        if index >= self.label_count() {
            return None;
        }
        read_i32(&self.raw, self.labels.offset + index * 4)
    }

    pub fn labels(&self) -> Vec<i32> {
        let bytes = self.labels.slice(&self.raw);
        let mut out = vec![0i32; bytes.len() / 4];
        LittleEndian::read_i32_into(&bytes[..out.len() * 4], &mut out);
        out
    }

    #[inline]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn token_bytes(&self, token: &Token) -> &[u8] {
        self.asmbin()
            .get(token.offset..token.offset + token.length)
            .unwrap_or(&[])
    }

    pub fn token_refs(&self) -> impl Iterator<Item = TokenRef<'_>> + '_ {
        self.tokens.iter().map(|token| TokenRef {
            token,
            bytes: self.token_bytes(token),
        })
    }
}

fn read_i32(data: &[u8], offset: usize) -> Option<i32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(LittleEndian::read_i32(bytes))
}

fn cstr_len(data: &[u8], start: usize) -> Option<usize> {
    data.get(start..)?.iter().position(|&b| b == 0)
}

/// Split the opcode stream into tokens. All or nothing: `None` as soon as one
/// opcode is unclassifiable or runs past the end of the stream.
fn tokenize(asmbin: &[u8], profile: &FormatProfile) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut offset = 0usize;

    while offset < asmbin.len() {
        let opcode = asmbin[offset];
        let Some(kind) = profile.classify(opcode) else {
            log::debug!(
                "{}: unknown opcode 0x{opcode:02X} at asmbin+0x{offset:X}",
                profile.name
            );
            return None;
        };

        let length = match kind {
            TokenKind::Fixed2 => Some(3),
            TokenKind::FixedTailString => cstr_len(asmbin, offset + 2).map(|n| 2 + n + 1),
            TokenKind::PlainString | TokenKind::CipherString => {
                cstr_len(asmbin, offset + 1).map(|n| 1 + n + 1)
            }
            TokenKind::FixedUint16x4 => Some(9),
        }
        .filter(|&length| offset + length <= asmbin.len());

        let Some(length) = length else {
            log::debug!(
                "{}: truncated {kind} token 0x{opcode:02X} at asmbin+0x{offset:X}",
                profile.name
            );
            return None;
        };

        tokens.push(Token {
            offset,
            length,
            opcode,
            kind,
        });
        offset += length;
    }

    Some(tokens)
}
