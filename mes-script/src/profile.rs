//! Per-title binary layout parameters.
//!
//! Every supported title ships its own opcode numbering. A [`FormatProfile`]
//! records the five opcode ranges that decide how long each instruction is,
//! the single-byte key of the string cipher, and which header layout the
//! title's scripts use.

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;
use strum::{Display, EnumIter, EnumString};

/// How the header in front of the opcode stream is sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HeaderLayout {
    /// `label_count * 4 + 4` header bytes, then a 1..=3 byte version field.
    Stride4,
    /// `label_count * 6 + 4` header bytes, then a 3 byte version field.
    Stride6,
}

/// Instruction shapes, in classification precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// `[op] [u8] [u8]`
    Fixed2,
    /// `[op] [u8] [cstr]`
    FixedTailString,
    /// `[op] [cstr]`
    PlainString,
    /// `[op] [enciphered cstr]`
    CipherString,
    /// `[op] [u16] [u16] [u16] [u16]`
    FixedUint16x4,
}

/// An inclusive opcode range. `0xFF..=0xFF` marks a section the title does not use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OpcodeRange {
    pub beg: u8,
    pub end: u8,
}

impl OpcodeRange {
    pub const DISABLED: OpcodeRange = OpcodeRange { beg: 0xFF, end: 0xFF };

    pub const fn new(beg: u8, end: u8) -> Self {
        Self { beg, end }
    }

    #[inline]
    pub const fn is_disabled(self) -> bool {
        self.beg == 0xFF && self.end == 0xFF
    }

    #[inline]
    pub const fn contains(self, opcode: u8) -> bool {
        !self.is_disabled() && opcode >= self.beg && opcode <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatProfile {
    pub name: &'static str,
    pub layout: HeaderLayout,
    /// Version signature stored right before the opcode stream.
    /// A zero high byte means the title stores a single version byte.
    pub version: u16,
    pub fixed2: OpcodeRange,
    pub fixed_tail_string: OpcodeRange,
    pub plain_string: OpcodeRange,
    pub cipher_string: OpcodeRange,
    pub fixed_uint16x4: OpcodeRange,
    pub cipher_key: u8,
    /// Opcodes whose string payload is scene text but is not enciphered.
    pub plain_text_opcodes: &'static [u8],
}

impl FormatProfile {
    /// Classify `opcode` against the five sections in precedence order.
    pub fn classify(&self, opcode: u8) -> Option<TokenKind> {
        if self.fixed2.contains(opcode) {
            Some(TokenKind::Fixed2)
        } else if self.fixed_tail_string.contains(opcode) {
            Some(TokenKind::FixedTailString)
        } else if self.plain_string.contains(opcode) {
            Some(TokenKind::PlainString)
        } else if self.cipher_string.contains(opcode) {
            Some(TokenKind::CipherString)
        } else if self.fixed_uint16x4.contains(opcode) {
            Some(TokenKind::FixedUint16x4)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_cipher_string(&self, opcode: u8) -> bool {
        self.cipher_string.contains(opcode)
    }

    #[inline]
    pub fn is_plain_text(&self, opcode: u8) -> bool {
        opcode != 0x00 && self.plain_text_opcodes.contains(&opcode)
    }

    #[inline]
    pub fn has_single_byte_version(&self) -> bool {
        self.version & 0xFF00 == 0
    }

    /// Compare a version value read from a file (always read as 16 bits).
    pub fn matches_version(&self, version: u16) -> bool {
        if self.has_single_byte_version() {
            version & 0x00FF == self.version
        } else {
            version == self.version
        }
    }
}

const fn r(beg: u8, end: u8) -> OpcodeRange {
    OpcodeRange::new(beg, end)
}

const OFF: OpcodeRange = OpcodeRange::DISABLED;

macro_rules! profile {
    ($name:literal, $layout:ident, $version:literal,
     $f2:expr, $fts:expr, $ps:expr, $cs:expr, $u16:expr, [$($op:literal),*], $key:literal) => {
        FormatProfile {
            name: $name,
            layout: HeaderLayout::$layout,
            version: $version,
            fixed2: $f2,
            fixed_tail_string: $fts,
            plain_string: $ps,
            cipher_string: $cs,
            fixed_uint16x4: $u16,
            cipher_key: $key,
            plain_text_opcodes: &[$($op),*],
        }
    };
}

#[rustfmt::skip]
pub static PROFILES: &[FormatProfile] = &[
    //        name          layout   version  fixed2           tail string      plain string     cipher string    uint16x4         text ops  key
    profile!("ffexa",      Stride4, 0x7B69, r(0x00, 0x28), r(0x29, 0x2E), r(0x2F, 0x49), r(0x4A, 0x4D), r(0x4E, 0xFF), [0x43], 0x20),
    profile!("ffexs",      Stride4, 0x7B6B, r(0x00, 0x28), r(0x29, 0x2E), r(0x2F, 0x4B), r(0x4C, 0x4F), r(0x50, 0xFF), [0x43], 0x20),
    profile!("ef",         Stride4, 0x466A, r(0x00, 0x28), r(0x2A, 0x2F), r(0x30, 0x4A), r(0x4B, 0x4E), r(0x4F, 0xFF), [0x46], 0x20),
    profile!("dcos",       Stride4, 0x315D, r(0x00, 0x2B), OFF,           r(0x2C, 0x45), r(0x46, 0x49), r(0x4A, 0xFF), [0x42], 0x20),
    profile!("ktlep",      Stride4, 0x6E69, r(0x00, 0x28), r(0x29, 0x2E), r(0x2F, 0x49), r(0x4A, 0x4D), r(0x4E, 0xFF), [0x45], 0x20),
    profile!("dcws",       Stride4, 0x656C, r(0x00, 0x2B), r(0x2C, 0x31), r(0x32, 0x4C), r(0x4D, 0x50), r(0x51, 0xFF), [0x48], 0x20),
    profile!("dcsv",       Stride4, 0x636C, r(0x00, 0x2B), r(0x2C, 0x31), r(0x32, 0x4C), r(0x4D, 0x50), r(0x51, 0xFF), [0x46], 0x20),
    profile!("dcpc",       Stride4, 0x3D63, r(0x00, 0x2C), OFF,           r(0x2D, 0x49), r(0x4A, 0x4D), r(0x4E, 0xFF), [0x44], 0x20),
    profile!("dcmems",     Stride4, 0x315D, r(0x00, 0x2B), OFF,           r(0x2C, 0x45), r(0x46, 0x49), r(0x4A, 0xFF), [0x42], 0x20),
    profile!("dcdx",       Stride4, 0x7769, r(0x00, 0x28), r(0x29, 0x2E), r(0x2F, 0x49), r(0x4A, 0x4D), r(0x4E, 0xFF), [0x45], 0x20),
    profile!("dcas",       Stride4, 0x4E69, r(0x00, 0x28), r(0x29, 0x2E), r(0x2F, 0x49), r(0x4A, 0x4D), r(0x4E, 0xFF), [0x43], 0x20),
    profile!("dcbs",       Stride4, 0x3163, r(0x00, 0x2B), OFF,           r(0x2C, 0x48), r(0x49, 0x4C), r(0x4D, 0xFF), [],     0x20),
    profile!("dc2fl",      Stride4, 0x9C69, r(0x00, 0x28), r(0x29, 0x2E), r(0x2F, 0x49), r(0x4A, 0x4D), r(0x4E, 0xFF), [0x45], 0x20),
    profile!("dc2bs",      Stride4, 0x316C, r(0x00, 0x2B), r(0x2C, 0x31), r(0x32, 0x4C), r(0x4D, 0x50), r(0x51, 0xFF), [],     0x20),
    profile!("dc2dm",      Stride4, 0x9D72, r(0x00, 0x29), r(0x2A, 0x31), r(0x32, 0x4C), r(0x4D, 0x50), r(0x51, 0xFF), [0x44], 0x20),
    profile!("dc2fy",      Stride4, 0x3866, r(0x00, 0x2E), OFF,           r(0x2F, 0x4B), r(0x4C, 0x4F), r(0x50, 0xFF), [0x48], 0x20),
    profile!("dc2cckko",   Stride4, 0x026C, r(0x00, 0x2B), r(0x2C, 0x31), r(0x32, 0x4C), r(0x4D, 0x50), r(0x51, 0xFF), [],     0x20),
    profile!("dc2ccotm",   Stride4, 0x016C, r(0x00, 0x2B), r(0x2C, 0x31), r(0x32, 0x4C), r(0x4D, 0x50), r(0x51, 0xFF), [],     0x20),
    profile!("dc2sc",      Stride4, 0x3B69, r(0x00, 0x28), r(0x29, 0x2E), r(0x2F, 0x49), r(0x4A, 0x4D), r(0x4E, 0xFF), [0x45], 0x20),
    profile!("dc2ty",      Stride4, 0x5F69, r(0x00, 0x28), r(0x29, 0x2E), r(0x2F, 0x49), r(0x4A, 0x4D), r(0x4E, 0xFF), [],     0x20),
    profile!("dc2pc",      Stride4, 0x5769, r(0x00, 0x28), r(0x29, 0x2E), r(0x2F, 0x49), r(0x4A, 0x4D), r(0x4E, 0xFF), [0x45], 0x20),
    profile!("dc3rx",      Stride4, 0x9772, r(0x00, 0x2B), r(0x2C, 0x33), r(0x34, 0x4E), r(0x4F, 0x52), r(0x53, 0xFF), [0x45], 0x20),
    profile!("dc3pp",      Stride4, 0x9872, r(0x00, 0x2A), r(0x2B, 0x32), r(0x33, 0x4E), r(0x4F, 0x51), r(0x52, 0xFF), [0x45], 0x20),
    profile!("dc3wy",      Stride6, 0xA09F, r(0x00, 0x38), r(0x39, 0x41), r(0x42, 0x5F), r(0x60, 0x63), r(0x64, 0xFF), [0x55], 0x20),
    profile!("dc3dd",      Stride6, 0xA5A8, r(0x00, 0x38), r(0x39, 0x43), r(0x44, 0x62), r(0x63, 0x67), r(0x68, 0xFF), [0x58], 0x20),
    profile!("dc4",        Stride6, 0xAAB6, r(0x00, 0x3A), r(0x3B, 0x47), r(0x48, 0x68), r(0x69, 0x6D), r(0x6E, 0xFF), [0x5D], 0x20),
    profile!("dc4ph",      Stride6, 0xABB6, r(0x00, 0x3A), r(0x3B, 0x47), r(0x48, 0x68), r(0x69, 0x6D), r(0x6E, 0xFF), [0x5D], 0x20),
    profile!("ds",         Stride6, 0x9F9A, r(0x00, 0x38), r(0x39, 0x4A), r(0x41, 0x5E), r(0x5F, 0x62), r(0x63, 0xFF), [0x54], 0x20),
    profile!("dsif",       Stride6, 0xA1A1, r(0x00, 0x39), r(0x3A, 0x42), r(0x43, 0x60), r(0x61, 0x64), r(0x65, 0xFF), [0x56], 0x20),
    profile!("tmpl",       Stride6, 0xA6B4, r(0x00, 0x3B), r(0x3A, 0x46), r(0x46, 0x67), r(0x68, 0x6E), r(0x6D, 0xFF), [0x5C], 0x20),
    profile!("nightshade", Stride4, 0x0871, r(0x00, 0x2B), r(0x2C, 0x33), r(0x34, 0x4E), r(0x4F, 0x52), r(0x53, 0xFF), [0x43], 0x01),
    profile!("puripa",     Stride4, 0x5B6C, r(0x00, 0x28), r(0x29, 0x2F), r(0x30, 0x4A), r(0x4B, 0x4E), r(0x4F, 0xFF), [0x46], 0x20),
    profile!("uni",        Stride4, 0x746A, r(0x00, 0x2B), r(0x2A, 0x2F), r(0x30, 0x4A), r(0x4B, 0x4E), r(0x4F, 0xFF), [0x46], 0x20),
];

pub fn query_by_name(name: &str) -> Option<&'static FormatProfile> {
    if name.is_empty() {
        return None;
    }
    PROFILES.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

pub fn query_by_version(version: u16) -> Option<&'static FormatProfile> {
    PROFILES.iter().find(|p| p.version == version)
}

/// Guess the title of a raw script buffer from its version signature.
pub fn query_by_sniff(data: &[u8]) -> Option<&'static FormatProfile> {
    sniff_in(PROFILES, data)
}

/// Header marker value that moves the label table to byte 8.
pub(crate) const WIDE_HEADER_MARKER: i32 = 0x03;

/// Both header formulas start from the leading label count; the version
/// field sits right after the computed header size.
pub(crate) fn sniff_in<'a>(table: &'a [FormatProfile], data: &[u8]) -> Option<&'a FormatProfile> {
    if data.len() < 8 {
        return None;
    }
    let label_count = LittleEndian::read_i32(&data[0..4]);
    let marker = LittleEndian::read_i32(&data[4..8]);
    if label_count < 0 {
        return None;
    }

    let read_version = |stride: usize| -> Option<u16> {
        let off = (label_count as usize).checked_mul(stride)?.checked_add(4)?;
        let bytes = data.get(off..off.checked_add(2)?)?;
        Some(LittleEndian::read_u16(bytes))
    };

    let stride4 = read_version(4).map(|v| (HeaderLayout::Stride4, v));
    let stride6 = read_version(6).map(|v| (HeaderLayout::Stride6, v));
    let candidates = if marker == WIDE_HEADER_MARKER {
        [stride6, stride4]
    } else {
        [stride4, stride6]
    };

    candidates.into_iter().flatten().find_map(|(layout, version)| {
        table
            .iter()
            .find(|p| p.layout == layout && p.matches_version(version))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn opcode_ranges_are_inclusive_and_disable() {
        let range = OpcodeRange::new(0x4A, 0x4D);
        assert!(range.contains(0x4A));
        assert!(range.contains(0x4D));
        assert!(!range.contains(0x4E));
        assert!(!OpcodeRange::DISABLED.contains(0xFF));
        assert!(OpcodeRange::new(0x4E, 0xFF).contains(0xFF));
    }

    #[test]
    fn classify_follows_precedence() {
        let p = query_by_name("ffexa").unwrap();
        assert_eq!(p.classify(0x00), Some(TokenKind::Fixed2));
        assert_eq!(p.classify(0x29), Some(TokenKind::FixedTailString));
        assert_eq!(p.classify(0x43), Some(TokenKind::PlainString));
        assert_eq!(p.classify(0x4B), Some(TokenKind::CipherString));
        assert_eq!(p.classify(0xFF), Some(TokenKind::FixedUint16x4));

        // tmpl overlaps its ranges; the earlier section wins
        let p = query_by_name("tmpl").unwrap();
        assert_eq!(p.classify(0x3A), Some(TokenKind::Fixed2));
        assert_eq!(p.classify(0x46), Some(TokenKind::FixedTailString));
        assert_eq!(p.classify(0x6D), Some(TokenKind::CipherString));
    }

    #[test]
    fn classify_rejects_gaps() {
        // ef leaves 0x29 unassigned
        let p = query_by_name("ef").unwrap();
        assert_eq!(p.classify(0x29), None);
    }

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = PROFILES.iter().map(|p| p.name).collect();
        assert_eq!(names.len(), PROFILES.len());
    }

    #[test]
    fn lookup_by_name_and_version() {
        assert_eq!(query_by_name("DC4").map(|p| p.name), Some("dc4"));
        assert!(query_by_name("").is_none());
        assert!(query_by_name("nope").is_none());
        assert_eq!(query_by_version(0x9D72).map(|p| p.name), Some("dc2dm"));
        // first entry wins for shared signatures
        assert_eq!(query_by_version(0x315D).map(|p| p.name), Some("dcos"));
        assert!(query_by_version(0x1234).is_none());
    }

    #[test]
    fn plain_text_opcodes_ignore_zero() {
        let mut p = query_by_name("ffexa").unwrap().clone();
        assert!(p.is_plain_text(0x43));
        assert!(!p.is_plain_text(0x44));
        p.plain_text_opcodes = &[0x00, 0x43];
        assert!(!p.is_plain_text(0x00));
    }

    #[test]
    fn sniff_stride4() {
        // one label, then version 0x7B69 at 4 * 1 + 4
        let data = [0x01, 0, 0, 0, 0x09, 0, 0, 0, 0x69, 0x7B, 0x01, 0x00, 0x00];
        assert_eq!(query_by_sniff(&data).map(|p| p.name), Some("ffexa"));
    }

    #[test]
    fn sniff_stride6_prefers_marker() {
        // two labels: 2 * 6 + 4 = 16
        let mut data = vec![0x02, 0, 0, 0, 0x03, 0, 0, 0];
        data.extend_from_slice(&[0; 8]);
        data.extend_from_slice(&[0xB6, 0xAA, 0x00, 0x03, 0x00, 0x00]);
        assert_eq!(query_by_sniff(&data).map(|p| p.name), Some("dc4"));
    }

    #[test]
    fn sniff_single_byte_version() {
        let mut custom = query_by_name("ffexa").unwrap().clone();
        custom.name = "legacy";
        custom.version = 0x0042;
        let table = [custom];
        // high byte of the 16-bit read is the first opcode, not part of the version
        let data = [0x01, 0, 0, 0, 0x09, 0, 0, 0, 0x42, 0x01, 0x00, 0x00];
        assert_eq!(sniff_in(&table, &data).map(|p| p.name), Some("legacy"));
    }

    #[test]
    fn sniff_rejects_garbage() {
        assert!(query_by_sniff(&[]).is_none());
        assert!(query_by_sniff(&[0xFF; 7]).is_none());
        assert!(query_by_sniff(&[0xFF, 0xFF, 0xFF, 0x7F, 0, 0, 0, 0]).is_none());
        assert!(query_by_sniff(&[0x01, 0, 0, 0, 0, 0, 0, 0, 0x34, 0x12]).is_none());
    }
}
