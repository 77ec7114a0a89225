//! Extracted-text files.
//!
//! Each entry is written as an offset line, a commented copy of the original
//! text and an editable copy:
//!
//! ```text
//! #0x1A4
//! ★◎  001  ◎★//original
//! ★◎  001  ◎★original
//! ```

const OFFSET_PREFIX: &str = "#0x";
const LINE_MARKER: &str = "◎★";
const COMMENT: &str = "//";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpEntry {
    pub offset: i32,
    pub text: String,
}

impl DumpEntry {
    pub fn new(offset: i32, text: impl Into<String>) -> Self {
        Self {
            offset,
            text: text.into(),
        }
    }
}

/// Empty texts are skipped but still consume their index.
pub fn write_dump(entries: &[DumpEntry]) -> String {
    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        if entry.text.is_empty() {
            continue;
        }
        let text = entry.text.replace('\n', "\\n");
        let index = i + 1;
        out.push_str(&format!("{OFFSET_PREFIX}{:X}\n", entry.offset));
        out.push_str(&format!("★◎  {index:03}  {LINE_MARKER}{COMMENT}{text}\n"));
        out.push_str(&format!("★◎  {index:03}  {LINE_MARKER}{text}\n\n"));
    }
    out
}

/// Collect the editable line following each offset line.
pub fn parse_dump(content: &str) -> Vec<DumpEntry> {
    let mut entries = Vec::new();
    let mut pending: Option<i32> = None;

    for line in content.trim_start_matches('\u{feff}').lines() {
        if line.is_empty() {
            continue;
        }

        if let Some(hex) = line.strip_prefix(OFFSET_PREFIX) {
            pending = parse_hex_prefix(hex);
            if pending.is_none() {
                log::warn!("bad offset line: {line}");
            }
            continue;
        }

        let Some(offset) = pending else {
            continue;
        };
        let Some(pos) = line.find(LINE_MARKER) else {
            continue;
        };
        let text = &line[pos + LINE_MARKER.len()..];
        if text.starts_with(COMMENT) {
            continue;
        }

        entries.push(DumpEntry::new(offset, text));
        pending = None;
    }

    entries
}

fn parse_hex_prefix(s: &str) -> Option<i32> {
    let end = s
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(s.len());
    u32::from_str_radix(&s[..end], 16).ok().map(|v| v as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn write_layout() {
        let entries = [
            DumpEntry::new(0x1A4, "こんにちは"),
            DumpEntry::new(0x1B0, ""),
            DumpEntry::new(0x200, "line1\nline2"),
        ];
        insta::assert_snapshot!(write_dump(&entries), @r"
        #0x1A4
        ★◎  001  ◎★//こんにちは
        ★◎  001  ◎★こんにちは

        #0x200
        ★◎  003  ◎★//line1\nline2
        ★◎  003  ◎★line1\nline2
        ");
    }

    #[test]
    fn parse_editable_lines() {
        let content = "stray ◎★text\n\
                       #0x1A4\r\n\
                       ★◎  001  ◎★//こんにちは\r\n\
                       ★◎  001  ◎★やあ\r\n\
                       ★◎  001  ◎★ignored, offset consumed\n\
                       \n\
                       #0xzz\n\
                       ★◎  002  ◎★dropped\n\
                       #0x200\n\
                       ★◎  003  ◎★a // b\n";
        assert_eq!(
            parse_dump(content),
            vec![DumpEntry::new(0x1A4, "やあ"), DumpEntry::new(0x200, "a // b")]
        );
    }

    #[test]
    fn written_dump_parses_back() {
        let entries = vec![DumpEntry::new(3, "Hi"), DumpEntry::new(-1, "x")];
        assert_eq!(parse_dump(&write_dump(&entries)), entries);
    }
}
