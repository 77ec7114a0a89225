use std::fs;

use anyhow::{Context, Result};
use pretty_assertions::assert_eq;

use mes_script::codec::encipher;
use mes_script::profile::{query_by_sniff, PROFILES};
use mes_script::{AdvTxtRegistry, FormatProfile, HeaderLayout, ScriptVariant, ScriptView, TextEntry};

/// fixed2, cipher "Hello", fixed2 (label target), optional plain text record.
fn build(profile: &FormatProfile) -> Vec<u8> {
    let mut raw = Vec::new();
    match profile.layout {
        HeaderLayout::Stride4 => {
            raw.extend_from_slice(&1i32.to_le_bytes());
            raw.extend_from_slice(&12i32.to_le_bytes());
            raw.extend_from_slice(&profile.version.to_le_bytes());
        }
        HeaderLayout::Stride6 => {
            raw.extend_from_slice(&2i32.to_le_bytes());
            raw.extend_from_slice(&3i32.to_le_bytes());
            raw.extend_from_slice(&0x0100_0003i32.to_le_bytes());
            raw.extend_from_slice(&13i32.to_le_bytes());
            raw.extend_from_slice(&profile.version.to_le_bytes());
            raw.push(0x00);
        }
    }

    raw.extend_from_slice(&[0x03, 0x01, 0x02]);
    raw.push(profile.cipher_string.beg);
    raw.extend_from_slice(&encipher(b"Hello", profile.cipher_key));
    raw.push(0x00);
    raw.extend_from_slice(&[0x04, 0x00, 0x00]);
    if let Some(&op) = profile.plain_text_opcodes.first() {
        raw.extend_from_slice(&[op, b'a', b'b', b'c', 0x00]);
    }
    raw
}

#[test]
fn every_title_roundtrips() -> Result<()> {
    for profile in PROFILES {
        let raw = build(profile);
        let view = ScriptView::parse(raw.clone(), Some(profile));
        assert!(view.is_parsed(), "{}", profile.name);

        let sniffed = query_by_sniff(&raw).with_context(|| profile.name.to_string())?;
        assert_eq!(sniffed.layout, profile.layout);
        assert_eq!(sniffed.version, profile.version);

        let entries = view.extract(false);
        assert_eq!(entries[0], TextEntry::new(3, *b"Hello"), "{}", profile.name);
        assert_eq!(entries.len(), 1 + profile.plain_text_opcodes.len().min(1));

        let same = view.reimport(&entries, false)?;
        assert_eq!(same.raw(), raw.as_slice(), "{}", profile.name);

        let rebuilt = view.reimport(&[TextEntry::new(3, *b"HelloWorld")], false)?;
        assert_eq!(rebuilt.extract(false)[0].text, b"HelloWorld");
        let expected = match profile.layout {
            HeaderLayout::Stride4 => vec![17],
            HeaderLayout::Stride6 => vec![0x0100_0003, 18],
        };
        assert_eq!(rebuilt.labels(), expected, "{}", profile.name);
        assert_eq!(rebuilt.asmbin().len(), view.asmbin().len() + 5);
    }
    Ok(())
}

#[test]
fn testcase_roundtrip_is_identity() -> Result<()> {
    let path = "testcase/sample.mes";
    let Ok(bytes) = fs::read(path) else {
        println!("skipping missing testcase: {}", path);
        return Ok(());
    };

    let script = ScriptVariant::load(bytes.clone(), None, &AdvTxtRegistry::default());
    assert!(script.is_parsed());
    let rebuilt = script.reimport(&script.extract(true), true)?;
    assert_eq!(rebuilt.raw(), bytes.as_slice());
    Ok(())
}
