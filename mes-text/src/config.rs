//! The `.MesTextTool` file written next to exported text.
//!
//! ```text
//! #InputPath
//! D:\Game\Advdata\MES
//!
//! #UseCodePage
//! 936
//!
//! #Text-MinLength
//! 22
//!
//! #Text-MaxLength
//! 24
//!
//! #Before-Replaces
//! [from]:[to]
//!
//! #After-Replaces
//! []:[]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mes_nls::CodePage;

use crate::format::FormatterConfig;

pub const CONFIG_FILE_NAME: &str = ".MesTextTool";

const KEY_INPUT_PATH: &str = "#InputPath";
const KEY_CODE_PAGE: &str = "#UseCodePage";
const KEY_MIN_LENGTH: &str = "#Text-MinLength";
const KEY_MAX_LENGTH: &str = "#Text-MaxLength";
const KEY_BEFORE_REPLACES: &str = "#Before-Replaces";
const KEY_AFTER_REPLACES: &str = "#After-Replaces";

const EMPTY_REPLACE: &str = "[]:[]";
const PLACEHOLDER_INPUT_PATH: &str = "D:\\YourGames\\Name\\Advdata\\MES";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    InputPath,
    CodePage,
    MinLength,
    MaxLength,
    BeforeReplaces,
    AfterReplaces,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolConfig {
    /// Directory holding the original scripts.
    pub input_path: Option<PathBuf>,
    pub text: FormatterConfig,
}

impl ToolConfig {
    pub fn with_input_path(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: Some(input_path.into()),
            ..Self::default()
        }
    }

    /// Lenient parse: unknown lines are skipped, missing keys keep their defaults.
    pub fn parse(content: &str) -> Self {
        let mut config = ToolConfig::default();
        let mut section = Section::None;

        for line in content.trim_start_matches('\u{feff}').lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }

            let header = match line {
                KEY_INPUT_PATH => Some(Section::InputPath),
                KEY_CODE_PAGE => Some(Section::CodePage),
                KEY_MIN_LENGTH => Some(Section::MinLength),
                KEY_MAX_LENGTH => Some(Section::MaxLength),
                KEY_BEFORE_REPLACES => Some(Section::BeforeReplaces),
                KEY_AFTER_REPLACES => Some(Section::AfterReplaces),
                _ => None,
            };
            if let Some(header) = header {
                section = header;
                continue;
            }

            match section {
                Section::None => {}
                Section::InputPath => {
                    let path = line.trim();
                    if !path.is_empty() {
                        config.input_path = Some(PathBuf::from(path));
                        section = Section::None;
                    }
                }
                Section::CodePage | Section::MinLength | Section::MaxLength => {
                    let Ok(value) = line.trim().parse::<i32>() else {
                        continue;
                    };
                    match section {
                        Section::CodePage => {
                            match u32::try_from(value).ok().and_then(CodePage::from_id) {
                                Some(cp) => config.text.code_page = cp,
                                None => log::warn!(
                                    "unsupported code page {value} in {CONFIG_FILE_NAME}, keeping {}",
                                    config.text.code_page
                                ),
                            }
                        }
                        Section::MinLength => config.text.text_min_length = value,
                        _ => config.text.text_max_length = value,
                    }
                    section = Section::None;
                }
                Section::BeforeReplaces => {
                    if let Some(pair) = parse_replace(line) {
                        config.text.before_replaces.push(pair);
                    }
                }
                Section::AfterReplaces => {
                    if let Some(pair) = parse_replace(line) {
                        config.text.after_replaces.push(pair);
                    }
                }
            }
        }

        config
    }

    pub fn render(&self) -> String {
        let input_path = self
            .input_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| PLACEHOLDER_INPUT_PATH.to_string());

        let mut out = String::new();
        out.push_str(&format!("{KEY_INPUT_PATH}\n{input_path}\n\n"));
        out.push_str(&format!("{KEY_CODE_PAGE}\n{}\n\n", self.text.code_page.id()));
        out.push_str(&format!("{KEY_MIN_LENGTH}\n{}\n\n", self.text.text_min_length));
        out.push_str(&format!("{KEY_MAX_LENGTH}\n{}\n\n", self.text.text_max_length));
        render_replaces(&mut out, KEY_BEFORE_REPLACES, &self.text.before_replaces);
        render_replaces(&mut out, KEY_AFTER_REPLACES, &self.text.after_replaces);
        out
    }

    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILE_NAME)
    }

    pub fn exists(dir: &Path) -> bool {
        Self::path_in(dir).is_file()
    }

    pub fn read_dir(dir: &Path) -> Result<Self> {
        let path = Self::path_in(dir);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    pub fn write_dir(&self, dir: &Path) -> Result<PathBuf> {
        let path = Self::path_in(dir);
        fs::write(&path, self.render())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// `[key]:[value]`; the key must not be empty.
fn parse_replace(line: &str) -> Option<(String, String)> {
    if !line.starts_with('[') || !line.ends_with(']') {
        return None;
    }
    let split = line.rfind("]:[")?;
    if split <= 1 {
        return None;
    }
    let key = &line[1..split];
    let value = &line[split + 3..line.len() - 1];
    Some((key.to_string(), value.to_string()))
}

fn render_replaces(out: &mut String, key: &str, replaces: &[(String, String)]) {
    out.push_str(key);
    out.push('\n');
    if replaces.is_empty() {
        out.push_str(EMPTY_REPLACE);
        out.push_str("\n\n");
        return;
    }
    for (from, to) in replaces {
        out.push_str(&format!("[{from}]:[{to}]\n"));
    }
    out.push_str("\n\n");
}
