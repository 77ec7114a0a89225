use std::collections::BTreeMap;

use mes_nls::CodePage;
use mes_script::{AdvTxtProfile, AdvTxtRegistry, HeaderLayout, ScriptVariant, TokenKind};
use serde::Serialize;
use strum::IntoEnumIterator;

/// Summary printed by the `info` command.
#[derive(Debug, Serialize)]
pub struct ScriptInfo {
    pub file: String,
    pub container: &'static str,
    pub title: Option<String>,
    pub layout: Option<HeaderLayout>,
    pub version: Option<String>,
    pub text_code_page: CodePage,
    pub body_offset: usize,
    pub body_len: usize,
    pub label_count: usize,
    pub token_count: usize,
    pub text_count: usize,
    /// MES only; advtxt records are not classified.
    pub tokens_by_kind: BTreeMap<String, usize>,
}

impl ScriptInfo {
    pub fn collect(file: &str, script: &ScriptVariant, code_page: CodePage) -> Self {
        let text_count = script.extract(false).len();
        let text_code_page = script.text_code_page(code_page);
        match script {
            ScriptVariant::Mes(view) => {
                let mut tokens_by_kind: BTreeMap<String, usize> =
                    TokenKind::iter().map(|k| (k.to_string(), 0)).collect();
                for token in view.tokens() {
                    *tokens_by_kind.entry(token.kind.to_string()).or_default() += 1;
                }
                ScriptInfo {
                    file: file.to_string(),
                    container: "mes",
                    title: view.profile().map(|p| p.name.to_string()),
                    layout: view.profile().map(|p| p.layout),
                    version: view.profile().map(|_| format!("0x{:04X}", view.version())),
                    text_code_page,
                    body_offset: view.asmbin_offset(),
                    body_len: view.asmbin().len(),
                    label_count: view.label_count(),
                    token_count: view.tokens().len(),
                    text_count,
                    tokens_by_kind,
                }
            }
            ScriptVariant::AdvTxt(view) => ScriptInfo {
                file: file.to_string(),
                container: "advtxt",
                title: Some(view.profile().name.clone()),
                layout: None,
                version: None,
                text_code_page,
                body_offset: view.body_offset(),
                body_len: view.body().len(),
                label_count: 0,
                token_count: view.tokens().len(),
                text_count,
                tokens_by_kind: BTreeMap::new(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TitleEntry {
    pub name: &'static str,
    pub layout: HeaderLayout,
    pub version: String,
}

/// Everything the `titles` command lists.
#[derive(Debug, Serialize)]
pub struct TitleList {
    pub mes: Vec<TitleEntry>,
    pub advtxt: Vec<AdvTxtProfile>,
    pub advtxt_supported: Vec<String>,
}

impl TitleList {
    pub fn collect(registry: &AdvTxtRegistry) -> Self {
        TitleList {
            mes: mes_script::profile::PROFILES
                .iter()
                .map(|p| TitleEntry {
                    name: p.name,
                    layout: p.layout,
                    version: format!("0x{:04X}", p.version),
                })
                .collect(),
            advtxt: registry.profiles().cloned().collect(),
            advtxt_supported: registry.supported_names().map(String::from).collect(),
        }
    }
}
