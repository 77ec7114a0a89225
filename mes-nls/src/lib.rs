use anyhow::{anyhow, bail, Result};
use encoding_rs::{Encoding as RsEncoding, GBK, SHIFT_JIS, UTF_16BE, UTF_8};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

pub trait TextDecoder {
    fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str>;
}

/// Code pages MES scripts and their text dumps are stored in.
///
/// The numeric ids are the Windows code page numbers used by the
/// `#UseCodePage` key of the tool configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodePage {
    #[default]
    ShiftJis,
    /// Decoded as GB18030 (superset), encoded as GBK.
    Gbk,
    Utf8,
    /// Two bytes per character; the advtxt variant stores its text this way.
    Utf16Be,
}

impl CodePage {
    pub const fn id(self) -> u32 {
        match self {
            CodePage::ShiftJis => 932,
            CodePage::Gbk => 936,
            CodePage::Utf8 => 65001,
            CodePage::Utf16Be => 1201,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            932 => Some(CodePage::ShiftJis),
            936 => Some(CodePage::Gbk),
            65001 => Some(CodePage::Utf8),
            1201 => Some(CodePage::Utf16Be),
            _ => None,
        }
    }

    #[inline]
    pub fn as_encoding_rs(self) -> &'static RsEncoding {
        match self {
            CodePage::ShiftJis => SHIFT_JIS,
            CodePage::Gbk => GBK,
            CodePage::Utf8 => UTF_8,
            CodePage::Utf16Be => UTF_16BE,
        }
    }

    /// Encode a Rust string to bytes using this code page.
    /// This is "best effort": unrepresentable chars will be replaced.
    pub fn encode<'a>(self, s: &'a str) -> Cow<'a, [u8]> {
        match self {
            CodePage::Utf8 => Cow::Borrowed(s.as_bytes()),
            // encoding_rs never encodes into UTF-16, so do it by hand.
            CodePage::Utf16Be => Cow::Owned(s.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            CodePage::ShiftJis | CodePage::Gbk => {
                let (cow, _, had_errors) = self.as_encoding_rs().encode(s);
                if had_errors {
                    log::warn!("{s:?} has characters code page {} cannot encode", self.id());
                }
                cow
            }
        }
    }

    /// Same as encode(), but always returns an owned Vec<u8>.
    pub fn encode_owned(self, s: &str) -> Vec<u8> {
        self.encode(s).into_owned()
    }

    /// Encode, failing instead of substituting characters the code page lacks.
    pub fn encode_strict(self, s: &str) -> Result<Vec<u8>> {
        match self {
            CodePage::Utf8 | CodePage::Utf16Be => Ok(self.encode_owned(s)),
            CodePage::ShiftJis | CodePage::Gbk => {
                let (cow, _, had_errors) = self.as_encoding_rs().encode(s);
                if had_errors {
                    let missing: String = s
                        .chars()
                        .filter(|c| {
                            let mut buf = [0u8; 4];
                            self.as_encoding_rs().encode(c.encode_utf8(&mut buf)).2
                        })
                        .collect();
                    bail!("code page {} cannot encode {missing:?} in {s:?}", self.id());
                }
                Ok(cow.into_owned())
            }
        }
    }
}

impl TextDecoder for CodePage {
    fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self {
            CodePage::Utf8 => match std::str::from_utf8(bytes) {
                Ok(s) => Cow::Borrowed(s),
                Err(_) => Cow::Owned(String::from_utf8_lossy(bytes).into_owned()),
            },
            CodePage::ShiftJis | CodePage::Gbk | CodePage::Utf16Be => {
                let (cow, had_errors) = self.as_encoding_rs().decode_without_bom_handling(bytes);
                if had_errors {
                    log::warn!("lossy decode of {} bytes with code page {}", bytes.len(), self.id());
                }
                cow
            }
        }
    }
}

impl fmt::Display for CodePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for CodePage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "sjis" | "shiftjis" | "shift_jis" | "shift-jis" | "cp932" | "932" => Ok(CodePage::ShiftJis),
            "gbk" | "gb2312" | "gb18030" | "cp936" | "936" => Ok(CodePage::Gbk),
            "utf8" | "utf-8" | "65001" => Ok(CodePage::Utf8),
            "utf16be" | "utf-16be" | "1201" => Ok(CodePage::Utf16Be),
            other => Err(anyhow!("unknown code page: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_decode_invalid_is_lossy() {
        let cp = CodePage::Utf8;
        assert_eq!(cp.decode(b"hello"), "hello");
        assert_eq!(cp.decode(&[b'a', 0xFF]), "a\u{FFFD}");
    }

    #[test]
    fn strict_encode_names_missing_chars() {
        let cp = CodePage::ShiftJis;
        assert_eq!(cp.encode_strict("あ").unwrap(), vec![0x82, 0xA0]);
        let err = cp.encode_strict("あ한い").unwrap_err().to_string();
        assert!(err.contains("\"한\""), "{err}");
        assert!(err.contains("932"), "{err}");

        // lossy encode still produces bytes
        assert!(!cp.encode_owned("한").is_empty());
        assert_eq!(CodePage::Utf16Be.encode_strict("한").unwrap(), vec![0xD5, 0x5C]);
    }

    #[test]
    fn encode_roundtrip_ascii_shiftjis() {
        let cp = CodePage::ShiftJis;
        let s = "ABCxyz123";
        let b = cp.encode_owned(s);
        assert_eq!(cp.decode(&b), s);
    }

    #[test]
    fn shiftjis_kana() {
        let cp = CodePage::ShiftJis;
        assert_eq!(cp.encode_owned("あ"), vec![0x82, 0xA0]);
        assert_eq!(cp.decode(&[0x82, 0xA0]), "あ");
    }

    #[test]
    fn gbk_hanzi() {
        let cp = CodePage::Gbk;
        assert_eq!(cp.encode_owned("中"), vec![0xD6, 0xD0]);
        assert_eq!(cp.decode(&[0xD6, 0xD0]), "中");
    }

    #[test]
    fn utf16be_is_two_bytes_per_char() {
        let cp = CodePage::Utf16Be;
        let b = cp.encode_owned("Aあ");
        assert_eq!(b, vec![0x00, 0x41, 0x30, 0x42]);
        assert_eq!(cp.decode(&b), "Aあ");
    }

    #[test]
    fn ids_and_names() {
        for cp in [CodePage::ShiftJis, CodePage::Gbk, CodePage::Utf8, CodePage::Utf16Be] {
            assert_eq!(CodePage::from_id(cp.id()), Some(cp));
            assert_eq!(cp.to_string().parse::<CodePage>().unwrap(), cp);
        }
        assert_eq!("SJIS".parse::<CodePage>().unwrap(), CodePage::ShiftJis);
        assert!("latin1".parse::<CodePage>().is_err());
        assert_eq!(CodePage::from_id(1252), None);
    }
}
