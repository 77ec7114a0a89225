use std::fs;

use anyhow::Result;
use pretty_assertions::assert_eq;

use mes_nls::{CodePage, TextDecoder};
use mes_text::{parse_dump, write_dump, DumpEntry, LineWrapFormatter, ToolConfig};

const CONFIG: &str = "\
#InputPath
scripts

#UseCodePage
932

#Text-MinLength
4

#Text-MaxLength
6

#Before-Replaces
[...]:[…]

#After-Replaces
[]:[]
";

#[test]
fn edited_dump_is_formatted_with_directory_config() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(ToolConfig::path_in(dir.path()), CONFIG)?;
    let config = ToolConfig::read_dir(dir.path())?;
    assert_eq!(config.text.code_page, CodePage::ShiftJis);
    assert_eq!(config.text.before_replaces, vec![("...".to_string(), "…".to_string())]);

    let dump = write_dump(&[
        DumpEntry::new(0x10, "あいうえおかきく"),
        DumpEntry::new(0x24, ""),
        DumpEntry::new(0x30, "はい..."),
    ]);
    let path = dir.path().join("a.txt");
    fs::write(&path, dump.replace("◎★あいうえおかきく\n", "◎★さしすせそたちつ\n"))?;

    let entries = parse_dump(&fs::read_to_string(&path)?);
    let offsets: Vec<_> = entries.iter().map(|e| e.offset).collect();
    assert_eq!(offsets, vec![0x10, 0x30]);

    let formatter = LineWrapFormatter::new(config.text.clone());
    assert_eq!(formatter.format(&entries[0].text), "さしすせ\nそたちつ");

    let encoded = formatter.format_encoded(&entries[1].text)?;
    assert_eq!(CodePage::ShiftJis.decode(&encoded), "はい…");
    Ok(())
}

#[test]
fn unencodable_text_is_reported() -> Result<()> {
    let config = ToolConfig::parse(CONFIG);
    let formatter = LineWrapFormatter::new(config.text);
    let err = formatter.format_encoded("안녕").unwrap_err();
    assert!(format!("{err:#}").contains("932"));

    let wide = formatter.with_code_page(CodePage::Utf16Be);
    assert_eq!(wide.format_encoded("안")?, vec![0xC5, 0x48]);
    Ok(())
}
