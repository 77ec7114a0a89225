//! `#ADV_TXT` scripts.
//!
//! ```text
//! 0x00  "#ADV_TXT"
//! 0x08  i32 entry_count
//! 0x0C  [entry_count] u16
//! ....  records separated by 0A 0D
//! ```
//!
//! The body is taken to start at `8 + entry_count * 2`, which is where the
//! engine itself starts reading.
//!
//! A text record is an opcode byte followed by UTF-16 code units stored
//! low byte first.

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::codec::{index_entries, TextEntry};
use crate::error::CodecError;
use crate::view::Region;

pub const MAGIC: [u8; 8] = *b"#ADV_TXT";
pub const DELIMITER: [u8; 2] = [0x0A, 0x0D];

const HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvTxtProfile {
    pub name: String,
    pub text_opcodes: Vec<u8>,
}

impl AdvTxtProfile {
    pub fn new(name: impl Into<String>, text_opcodes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            text_opcodes: text_opcodes.into(),
        }
    }

    #[inline]
    pub fn is_text_opcode(&self, opcode: u8) -> bool {
        self.text_opcodes.contains(&opcode)
    }
}

/// Known advtxt titles.
///
/// Titles listed as supported but without their own profile fall back to
/// the default profile.
#[derive(Debug, Clone)]
pub struct AdvTxtRegistry {
    default: AdvTxtProfile,
    profiles: Vec<AdvTxtProfile>,
    supported: Vec<String>,
}

impl Default for AdvTxtRegistry {
    fn default() -> Self {
        Self {
            default: AdvTxtProfile::new(Self::DEFAULT_NAME, [0x00]),
            profiles: vec![
                AdvTxtProfile::new("utaeho4", [0x00, 0x1A]),
                AdvTxtProfile::new("suikademo", [0x00, 0x16]),
            ],
            supported: ["utaeho4", "infantaria", "suikademo"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl AdvTxtRegistry {
    pub const DEFAULT_NAME: &'static str = "advtxt";

    pub fn default_profile(&self) -> &AdvTxtProfile {
        &self.default
    }

    /// Look up a title. An empty name selects the default profile.
    pub fn get(&self, name: &str) -> Option<AdvTxtProfile> {
        if name.is_empty() || name.eq_ignore_ascii_case(Self::DEFAULT_NAME) {
            return Some(self.default.clone());
        }
        if let Some(profile) = self
            .profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
        {
            return Some(profile.clone());
        }
        self.is_supported(name)
            .then(|| AdvTxtProfile::new(name, self.default.text_opcodes.clone()))
    }

    pub fn is_supported(&self, name: &str) -> bool {
        self.supported.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    /// Add or replace a profile; the title becomes supported.
    pub fn register(&mut self, profile: AdvTxtProfile) {
        if !self.is_supported(&profile.name) {
            self.supported.push(profile.name.clone());
        }
        match self.profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(slot) => *slot = profile,
            None => self.profiles.push(profile),
        }
    }

    pub fn profiles(&self) -> impl Iterator<Item = &AdvTxtProfile> {
        std::iter::once(&self.default).chain(self.profiles.iter())
    }

    pub fn supported_names(&self) -> impl Iterator<Item = &str> {
        self.supported.iter().map(String::as_str)
    }
}

pub fn is_advtxt(data: &[u8]) -> bool {
    data.len() >= HEADER_SIZE && data[..MAGIC.len()] == MAGIC
}

/// Read swapped byte pairs up to the first pair whose leading byte is 0.
pub fn decode_pairs(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    for pair in payload.chunks(2) {
        if pair[0] == 0 {
            break;
        }
        if let Some(&hi) = pair.get(1) {
            out.push(hi);
        }
        out.push(pair[0]);
    }
    out
}

pub fn encode_pairs(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for pair in text.chunks(2) {
        if let [hi, lo] = *pair {
            out.push(lo);
            out.push(hi);
        } else {
            out.extend_from_slice(pair);
        }
    }
    out
}

/// A record between delimiters. `offset` is relative to the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvTxtToken {
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone)]
pub struct AdvTxtView {
    raw: Vec<u8>,
    profile: AdvTxtProfile,
    entry_count: u32,
    body: Region,
    tokens: Vec<AdvTxtToken>,
    /// Start of the bytes after the last delimiter, relative to the body.
    tail: usize,
}

impl AdvTxtView {
    pub fn parse(raw: Vec<u8>, profile: AdvTxtProfile) -> Self {
        let mut view = AdvTxtView {
            raw,
            profile,
            entry_count: 0,
            body: Region::EMPTY,
            tokens: Vec::new(),
            tail: 0,
        };
        if !is_advtxt(&view.raw) {
            return view;
        }

        let Ok(entry_count) = u32::try_from(LittleEndian::read_i32(&view.raw[8..12])) else {
            return view;
        };
        let Some(start) = (entry_count as usize)
            .checked_mul(2)
            .and_then(|n| n.checked_add(8))
            .filter(|&start| start <= view.raw.len())
        else {
            log::debug!("advtxt entry table runs past the end of the file");
            return view;
        };

        view.entry_count = entry_count;
        view.body = Region {
            offset: start,
            len: view.raw.len() - start,
        };

        let body = view.body.slice(&view.raw);
        let mut current = 0usize;
        let mut tokens = Vec::new();
        while current < body.len() {
            let Some(found) = body[current..]
                .windows(DELIMITER.len())
                .position(|w| w == DELIMITER)
            else {
                break;
            };
            tokens.push(AdvTxtToken {
                offset: current,
                length: found,
            });
            current += found + DELIMITER.len();
        }
        view.tail = current.min(body.len());
        view.tokens = tokens;
        view
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
    pub fn profile(&self) -> &AdvTxtProfile {
        &self.profile
    }

    #[inline]
    pub fn entry_count(&self) -> u32 {
        self.entry_count
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        self.body.slice(&self.raw)
    }

    #[inline]
    pub fn body_offset(&self) -> usize {
        self.body.offset
    }

    #[inline]
    pub fn tokens(&self) -> &[AdvTxtToken] {
        &self.tokens
    }

    pub fn token_bytes(&self, token: &AdvTxtToken) -> &[u8] {
        self.body()
            .get(token.offset..token.offset + token.length)
            .unwrap_or(&[])
    }

    /// Bytes after the last delimiter, kept as-is on reimport.
    pub fn tail(&self) -> &[u8] {
        self.body().get(self.tail..).unwrap_or(&[])
    }

    fn text_base(&self, absolute_offset: bool) -> i32 {
        if absolute_offset {
            self.body.offset as i32
        } else {
            0
        }
    }

    fn text_token(&self, token: &AdvTxtToken) -> Option<u8> {
        let bytes = self.token_bytes(token);
        match bytes {
            [opcode, _, ..] if self.profile.is_text_opcode(*opcode) => Some(*opcode),
            _ => None,
        }
    }

    /// Text is returned as UTF-16BE.
    pub fn extract(&self, absolute_offset: bool) -> Vec<TextEntry> {
        let base = self.text_base(absolute_offset);
        self.tokens
            .iter()
            .filter(|token| self.text_token(token).is_some())
            .map(|token| TextEntry {
                offset: token.offset as i32 + base,
                text: decode_pairs(&self.token_bytes(token)[1..]),
            })
            .collect()
    }

    pub fn reimport(
        &self,
        entries: &[TextEntry],
        absolute_offset: bool,
    ) -> Result<AdvTxtView, CodecError> {
        if entries.is_empty() {
            return Err(CodecError::NoEntries);
        }
        if !self.is_parsed() {
            return Err(CodecError::NotParsed);
        }

        let base = self.text_base(absolute_offset);
        let replacements = index_entries(entries);
        let mut raw = Vec::with_capacity(self.raw.len());
        raw.extend_from_slice(&self.raw[..self.body.offset]);

        for token in &self.tokens {
            let key = token.offset as i32 + base;
            match (self.text_token(token), replacements.get(&key)) {
                (Some(opcode), Some(text)) => {
                    raw.push(opcode);
                    raw.extend_from_slice(&encode_pairs(text));
                }
                _ => raw.extend_from_slice(self.token_bytes(token)),
            }
            raw.extend_from_slice(&DELIMITER);
        }
        raw.extend_from_slice(self.tail());

        let rebuilt = AdvTxtView::parse(raw, self.profile.clone());
        if rebuilt.tokens.len() != self.tokens.len() {
            log::debug!(
                "{}: rebuilt advtxt has {} records, expected {}",
                self.profile.name,
                rebuilt.tokens.len(),
                self.tokens.len()
            );
            return Err(CodecError::Reparse);
        }
        Ok(rebuilt)
    }
}
