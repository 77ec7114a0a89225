use mes_nls::CodePage;

use crate::advtxt::{is_advtxt, AdvTxtRegistry, AdvTxtView};
use crate::codec::TextEntry;
use crate::error::CodecError;
use crate::profile::query_by_name;
use crate::view::ScriptView;

/// A loaded script of either container kind.
#[derive(Debug, Clone)]
pub enum ScriptVariant {
    Mes(ScriptView),
    AdvTxt(AdvTxtView),
}

impl ScriptVariant {
    /// Pick the container from the buffer's magic, then the title profile.
    ///
    /// With no title (or one the MES table does not know) the MES profile is
    /// sniffed from the header.
    pub fn load(raw: Vec<u8>, title: Option<&str>, registry: &AdvTxtRegistry) -> Self {
        let title = title.filter(|t| !t.is_empty());

        if is_advtxt(&raw) {
            let profile = match title.and_then(|t| registry.get(t)) {
                Some(profile) => profile,
                None => {
                    if let Some(t) = title {
                        log::warn!("{t} is not an advtxt title, using the default profile");
                    }
                    registry.default_profile().clone()
                }
            };
            return ScriptVariant::AdvTxt(AdvTxtView::parse(raw, profile));
        }

        let profile = title.and_then(query_by_name);
        if let (Some(t), None) = (title, profile) {
            log::warn!("unknown title {t}, detecting from the script header");
        }
        ScriptVariant::Mes(ScriptView::parse(raw, profile))
    }

    pub fn is_parsed(&self) -> bool {
        match self {
            ScriptVariant::Mes(view) => view.is_parsed(),
            ScriptVariant::AdvTxt(view) => view.is_parsed(),
        }
    }

    /// Title of the profile in use, if any was resolved.
    pub fn title(&self) -> Option<&str> {
        match self {
            ScriptVariant::Mes(view) => view.profile().map(|p| p.name),
            ScriptVariant::AdvTxt(view) => Some(view.profile().name.as_str()),
        }
    }

    pub fn raw(&self) -> &[u8] {
        match self {
            ScriptVariant::Mes(view) => view.raw(),
            ScriptVariant::AdvTxt(view) => view.raw(),
        }
    }

    pub fn into_raw(self) -> Vec<u8> {
        match self {
            ScriptVariant::Mes(view) => view.into_raw(),
            ScriptVariant::AdvTxt(view) => view.into_raw(),
        }
    }

    /// Code page the extracted text is stored in. advtxt text is always UTF-16BE.
    pub fn text_code_page(&self, script_code_page: CodePage) -> CodePage {
        match self {
            ScriptVariant::Mes(_) => script_code_page,
            ScriptVariant::AdvTxt(_) => CodePage::Utf16Be,
        }
    }

    pub fn extract(&self, absolute_offset: bool) -> Vec<TextEntry> {
        match self {
            ScriptVariant::Mes(view) => view.extract(absolute_offset),
            ScriptVariant::AdvTxt(view) => view.extract(absolute_offset),
        }
    }

    pub fn reimport(
        &self,
        entries: &[TextEntry],
        absolute_offset: bool,
    ) -> Result<ScriptVariant, CodecError> {
        Ok(match self {
            ScriptVariant::Mes(view) => ScriptVariant::Mes(view.reimport(entries, absolute_offset)?),
            ScriptVariant::AdvTxt(view) => {
                ScriptVariant::AdvTxt(view.reimport(entries, absolute_offset)?)
            }
        })
    }
}
