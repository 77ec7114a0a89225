use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::CodecError;
use crate::profile::TokenKind;
use crate::view::ScriptView;

/// A piece of script text keyed by the offset of the token that carries it.
///
/// `text` is in the script's own code page, without the trailing NUL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextEntry {
    pub offset: i32,
    pub text: Vec<u8>,
}

impl TextEntry {
    pub fn new(offset: i32, text: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            text: text.into(),
        }
    }
}

pub fn decipher(bytes: &[u8], key: u8) -> Vec<u8> {
    bytes.iter().map(|b| b.wrapping_add(key)).collect()
}

pub fn encipher(bytes: &[u8], key: u8) -> Vec<u8> {
    bytes.iter().map(|b| b.wrapping_sub(key)).collect()
}

/// Index entries by offset; the first entry for an offset wins.
pub(crate) fn index_entries(entries: &[TextEntry]) -> HashMap<i32, &[u8]> {
    let mut map = HashMap::with_capacity(entries.len());
    for entry in entries {
        map.entry(entry.offset).or_insert(entry.text.as_slice());
    }
    map
}

impl ScriptView {
    fn text_base(&self, absolute_offset: bool) -> i32 {
        if absolute_offset {
            self.asmbin_offset() as i32
        } else {
            0
        }
    }

    /// Pull every text-bearing token out of the script.
    ///
    /// Enciphered strings are deciphered with the title's key, plain text
    /// opcodes are returned as stored. Order follows the opcode stream.
    pub fn extract(&self, absolute_offset: bool) -> Vec<TextEntry> {
        let Some(profile) = self.profile() else {
            return Vec::new();
        };
        let base = self.text_base(absolute_offset);

        self.token_refs()
            .filter_map(|token| {
                let text = if token.kind() == TokenKind::CipherString {
                    decipher(token.string()?, profile.cipher_key)
                } else if profile.is_plain_text(token.opcode()) {
                    token.text_payload()?.to_vec()
                } else {
                    return None;
                };
                Some(TextEntry {
                    offset: token.offset() as i32 + base,
                    text,
                })
            })
            .collect()
    }

    /// Rebuild the script with `entries` substituted in, fixing up the label
    /// table for the new instruction offsets.
    ///
    /// Entries whose offset matches no text token are ignored.
    pub fn reimport(
        &self,
        entries: &[TextEntry],
        absolute_offset: bool,
    ) -> Result<ScriptView, CodecError> {
        if entries.is_empty() {
            return Err(CodecError::NoEntries);
        }
        let profile = match self.profile() {
            Some(profile) if self.is_parsed() => profile,
            _ => return Err(CodecError::NotParsed),
        };

        let base = self.text_base(absolute_offset);
        let replacements = index_entries(entries);
        let anchor = self.version_width();
        let labels_at_4 = self.labels_offset() == 4;
        let labels_at_8 = self.labels_offset() == 8;
        let mut labels = self.labels();
        let mut label_index = 0usize;
        let mut body = Vec::with_capacity(self.asmbin().len());

        for token in self.token_refs() {
            // stride-4 labels point `anchor` bytes past the start of their instruction
            if labels_at_4
                && label_index < labels.len()
                && (token.offset() + anchor) as i64 == i64::from(labels[label_index])
            {
                labels[label_index] = (body.len() + anchor) as i32;
                label_index += 1;
            }

            let key = token.offset() as i32 + base;
            let payload = match replacements.get(&key) {
                Some(text) if token.kind() == TokenKind::CipherString => {
                    Some(encipher(text, profile.cipher_key))
                }
                Some(text)
                    if profile.is_plain_text(token.opcode())
                        && token.text_payload().is_some() =>
                {
                    Some(text.to_vec())
                }
                _ => None,
            };

            if let Some(payload) = payload {
                if payload.contains(&0) {
                    return Err(CodecError::InteriorNul { offset: key });
                }
                body.push(token.opcode());
                body.extend_from_slice(&payload);
                body.push(0);
                continue;
            }

            // wide tables record the end of each block terminator
            if labels_at_8 && matches!(token.opcode(), 0x03 | 0x04) && label_index < labels.len() {
                let end = (body.len() + token.len()) as u32;
                let flags = labels[label_index] as u32 & 0xFF00_0000;
                labels[label_index] = (flags | end) as i32;
                label_index += 1;
            }
            body.extend_from_slice(token.bytes());
        }

        let mut raw = Vec::with_capacity(self.asmbin_offset() + body.len());
        raw.extend_from_slice(&self.raw()[..self.asmbin_offset()]);
        for (i, label) in labels.iter().enumerate() {
            let at = self.labels_offset() + i * 4;
            LittleEndian::write_i32(&mut raw[at..at + 4], *label);
        }
        raw.extend_from_slice(&body);

        let rebuilt = ScriptView::parse(raw, Some(profile));
        if rebuilt.tokens().len() != self.tokens().len() {
            log::debug!(
                "{}: rebuilt script has {} tokens, expected {}",
                profile.name,
                rebuilt.tokens().len(),
                self.tokens().len()
            );
            return Err(CodecError::Reparse);
        }
        Ok(rebuilt)
    }
}
