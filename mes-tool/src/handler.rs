use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use mes_nls::{CodePage, TextDecoder};
use mes_script::{AdvTxtRegistry, ScriptVariant, TextEntry};
use mes_text::{parse_dump, write_dump, DumpEntry, LineWrapFormatter, ToolConfig};

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files written.
    pub succeeded: Vec<PathBuf>,
    /// Inputs that were skipped, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    fn record(&mut self, input: &Path, result: Result<PathBuf>) {
        match result {
            Ok(output) => {
                log::info!("{} -> {}", input.display(), output.display());
                self.succeeded.push(output);
            }
            Err(e) => {
                log::warn!("skipped {}: {e:#}", input.display());
                self.failed.push((input.to_path_buf(), format!("{e:#}")));
            }
        }
    }

    fn finish(self, what: &str) -> Result<Self> {
        if self.succeeded.is_empty() {
            bail!(
                "{what}: no file was processed ({} skipped)",
                self.failed.len()
            );
        }
        log::info!(
            "{what}: {} succeeded, {} skipped",
            self.succeeded.len(),
            self.failed.len()
        );
        Ok(self)
    }
}

/// Runs export or import over a directory of scripts or extracted texts.
pub struct ScriptsHandler {
    input: PathBuf,
    output: PathBuf,
    title: Option<String>,
    code_page: CodePage,
    registry: AdvTxtRegistry,
}

impl ScriptsHandler {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            title: None,
            code_page: CodePage::ShiftJis,
            registry: AdvTxtRegistry::default(),
        }
    }

    /// Force a title instead of detecting it per file.
    pub fn title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    /// Code page of the text inside the scripts, used on export.
    pub fn code_page(mut self, code_page: CodePage) -> Self {
        self.code_page = code_page;
        self
    }

    pub fn registry(mut self, registry: AdvTxtRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Import when the input holds a `.MesTextTool`, export otherwise.
    pub fn process(&self) -> Result<BatchReport> {
        if ToolConfig::exists(&self.input) {
            log::info!("found {}, importing", ToolConfig::path_in(&self.input).display());
            self.import_all()
        } else if self.input.exists() {
            self.export_all()
        } else {
            bail!("input path does not exist: {}", self.input.display());
        }
    }

    fn load(&self, raw: Vec<u8>) -> ScriptVariant {
        ScriptVariant::load(raw, self.title.as_deref(), &self.registry)
    }

    pub fn export_all(&self) -> Result<BatchReport> {
        let (files, input_dir) = if self.input.is_dir() {
            (list_files(&self.input, "mes")?, self.input.clone())
        } else if self.input.is_file() {
            let parent = self
                .input
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (vec![self.input.clone()], parent)
        } else {
            bail!("input path does not exist: {}", self.input.display());
        };

        let mut report = BatchReport::default();
        let mut titles = BTreeSet::new();
        for file in &files {
            let result = self.export_one(file).map(|(title, output)| {
                titles.insert(title);
                output
            });
            report.record(file, result);
        }

        let config = ToolConfig::with_input_path(input_dir);
        for title in &titles {
            config.write_dir(&self.output.join(format!("{title}_text")))?;
        }

        report.finish("export")
    }

    fn export_one(&self, file: &Path) -> Result<(String, PathBuf)> {
        if !has_extension(file, "mes") {
            bail!("not a .mes file");
        }
        let stem = file_stem(file)?;
        let raw = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

        let script = self.load(raw);
        if !script.is_parsed() {
            bail!("unrecognized script format");
        }
        let title = script
            .title()
            .context("script has no title")?
            .to_string();

        let code_page = script.text_code_page(self.code_page);
        let entries: Vec<DumpEntry> = script
            .extract(true)
            .into_iter()
            .map(|e| DumpEntry::new(e.offset, code_page.decode(&e.text)))
            .collect();

        let dir = self.output.join(format!("{title}_text"));
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let output = dir.join(format!("{stem}.txt"));
        fs::write(&output, write_dump(&entries))
            .with_context(|| format!("Failed to write {}", output.display()))?;

        Ok((title, output))
    }

    pub fn import_all(&self) -> Result<BatchReport> {
        let config = ToolConfig::read_dir(&self.input)?;
        let Some(mes_dir) = config.input_path.as_deref() else {
            bail!("{} has no #InputPath", ToolConfig::path_in(&self.input).display());
        };
        if !mes_dir.is_dir() {
            bail!("the directory for .mes files does not exist: {}", mes_dir.display());
        }

        let formatter = LineWrapFormatter::new(config.text.clone());
        let mut report = BatchReport::default();
        for file in list_files(&self.input, "txt")? {
            let result = self.import_one(&file, mes_dir, &formatter);
            report.record(&file, result);
        }

        report.finish("import")
    }

    fn import_one(&self, file: &Path, mes_dir: &Path, formatter: &LineWrapFormatter) -> Result<PathBuf> {
        let stem = file_stem(file)?;
        let Some(mes_path) = find_script(mes_dir, &stem)? else {
            bail!("no matching script {stem}.mes in {}", mes_dir.display());
        };

        let raw = fs::read(&mes_path)
            .with_context(|| format!("Failed to read {}", mes_path.display()))?;
        let script = self.load(raw);
        if !script.is_parsed() {
            bail!("unrecognized script format: {}", mes_path.display());
        }

        let content = fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let formatter = formatter.with_code_page(script.text_code_page(formatter.config().code_page));
        // an entry the code page cannot hold keeps the script's original text
        let entries: Vec<TextEntry> = parse_dump(&content)
            .iter()
            .filter_map(|e| match formatter.format_encoded(&e.text) {
                Ok(text) => Some(TextEntry::new(e.offset, text)),
                Err(err) => {
                    log::warn!("{} #0x{:X}: {err:#}, keeping the original text", file.display(), e.offset);
                    None
                }
            })
            .collect();
        if entries.is_empty() {
            bail!("no text entries");
        }

        let rebuilt = script
            .reimport(&entries, true)
            .with_context(|| format!("Failed to rebuild {}", mes_path.display()))?;
        let title = rebuilt.title().context("script has no title")?;

        let dir = self.output.join(format!("{title}_mes"));
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let output = dir.join(format!("{stem}.mes"));
        fs::write(&output, rebuilt.raw())
            .with_context(|| format!("Failed to write {}", output.display()))?;

        Ok(output)
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .with_context(|| format!("no file name in {}", path.display()))
}

fn find_script(dir: &Path, stem: &str) -> Result<Option<PathBuf>> {
    let exact = dir.join(format!("{stem}.mes"));
    if exact.is_file() {
        return Ok(Some(exact));
    }
    Ok(list_files(dir, "mes")?
        .into_iter()
        .find(|p| p.file_stem().is_some_and(|s| s.to_string_lossy() == stem)))
}

/// Files directly inside `dir` with the given extension, any case, sorted.
fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let dir_str = dir
        .to_str()
        .with_context(|| format!("path is not UTF-8: {}", dir.display()))?;
    let pattern = format!("{}/*.{extension}", glob::Pattern::escape(dir_str));
    let options = glob::MatchOptions {
        case_sensitive: false,
        ..Default::default()
    };

    let mut files = Vec::new();
    for entry in glob::glob_with(&pattern, options)? {
        let path = entry?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mes_script::advtxt::{DELIMITER, MAGIC};
    use mes_script::ScriptView;
    use pretty_assertions::assert_eq;

    /// ffexa: label -> fixed2 @7, cipher "Hi" @3, plain "abc" @10.
    fn ffexa_script() -> Vec<u8> {
        let mut raw = vec![0x01, 0x00, 0x00, 0x00];
        raw.extend_from_slice(&9i32.to_le_bytes());
        raw.extend_from_slice(&[0x69, 0x7B]);
        raw.extend_from_slice(&[0x01, 0xAA, 0xBB]);
        raw.extend_from_slice(&[0x4B, 0x28, 0x49, 0x00]);
        raw.extend_from_slice(&[0x02, 0x00, 0x00]);
        raw.extend_from_slice(&[0x43, b'a', b'b', b'c', 0x00]);
        raw
    }

    fn advtxt_script() -> Vec<u8> {
        let mut raw = MAGIC.to_vec();
        raw.extend_from_slice(&2i32.to_le_bytes());
        raw.extend_from_slice(&[0x00, 0x48, 0x00, 0x69, 0x00]);
        raw.extend_from_slice(&DELIMITER);
        raw
    }

    #[test]
    fn export_then_import() -> Result<()> {
        let input = tempfile::tempdir()?;
        let texts = tempfile::tempdir()?;
        let rebuilt = tempfile::tempdir()?;
        fs::write(input.path().join("sample.MES"), ffexa_script())?;
        fs::write(input.path().join("notes.txt"), "not a script")?;

        let report = ScriptsHandler::new(input.path(), texts.path()).process()?;
        let text_dir = texts.path().join("ffexa_text");
        let dump_path = text_dir.join("sample.txt");
        assert_eq!(report.succeeded, vec![dump_path.clone()]);
        assert!(ToolConfig::exists(&text_dir));
        assert_eq!(
            ToolConfig::read_dir(&text_dir)?.input_path.as_deref(),
            Some(input.path())
        );

        let dump = fs::read_to_string(&dump_path)?;
        assert_eq!(
            dump,
            "#0xD\n★◎  001  ◎★//Hi\n★◎  001  ◎★Hi\n\n#0x14\n★◎  002  ◎★//abc\n★◎  002  ◎★abc\n\n"
        );
        fs::write(&dump_path, dump.replace("◎★Hi\n", "◎★Hello\n"))?;

        let report = ScriptsHandler::new(&text_dir, rebuilt.path()).process()?;
        let output = rebuilt.path().join("ffexa_mes").join("sample.mes");
        assert_eq!(report.succeeded, vec![output.clone()]);
        assert!(report.failed.is_empty());

        let view = ScriptView::parse(fs::read(&output)?, None);
        assert_eq!(view.labels(), vec![12]);
        let texts: Vec<_> = view.extract(false).into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec![b"Hello".to_vec(), b"abc".to_vec()]);
        Ok(())
    }

    #[test]
    fn advtxt_text_is_utf16() -> Result<()> {
        let input = tempfile::tempdir()?;
        let texts = tempfile::tempdir()?;
        let rebuilt = tempfile::tempdir()?;
        fs::write(input.path().join("adv.mes"), advtxt_script())?;

        ScriptsHandler::new(input.path(), texts.path()).export_all()?;
        let text_dir = texts.path().join("advtxt_text");
        let dump_path = text_dir.join("adv.txt");
        let dump = fs::read_to_string(&dump_path)?;
        assert!(dump.starts_with("#0xC\n★◎  001  ◎★//Hi\n"));
        fs::write(&dump_path, dump.replace("◎★Hi\n", "◎★Yo\n"))?;

        ScriptsHandler::new(&text_dir, rebuilt.path()).import_all()?;
        let raw = fs::read(rebuilt.path().join("advtxt_mes").join("adv.mes"))?;
        assert_eq!(&raw[12..], &[0x00, 0x59, 0x00, 0x6F, 0x00, 0x0A, 0x0D]);
        Ok(())
    }

    #[test]
    fn forced_title_and_single_file() -> Result<()> {
        let input = tempfile::tempdir()?;
        let texts = tempfile::tempdir()?;
        let file = input.path().join("one.mes");
        fs::write(&file, ffexa_script())?;

        let report = ScriptsHandler::new(&file, texts.path())
            .title(Some("ktlep".into()))
            .export_all()?;
        assert_eq!(
            report.succeeded,
            vec![texts.path().join("ktlep_text").join("one.txt")]
        );
        Ok(())
    }

    #[test]
    fn nothing_processed_is_an_error() -> Result<()> {
        let input = tempfile::tempdir()?;
        let out = tempfile::tempdir()?;
        fs::write(input.path().join("bad.mes"), [0xFFu8; 16])?;
        assert!(ScriptsHandler::new(input.path(), out.path()).process().is_err());

        let missing = input.path().join("missing");
        assert!(ScriptsHandler::new(&missing, out.path()).process().is_err());
        Ok(())
    }

    #[test]
    fn import_skips_unmatched_texts() -> Result<()> {
        let scripts = tempfile::tempdir()?;
        let texts = tempfile::tempdir()?;
        let out = tempfile::tempdir()?;
        fs::write(scripts.path().join("a.mes"), ffexa_script())?;
        ToolConfig::with_input_path(scripts.path()).write_dir(texts.path())?;
        fs::write(texts.path().join("a.txt"), "#0xD\n★◎  001  ◎★Yo\n")?;
        fs::write(texts.path().join("b.txt"), "#0xD\n★◎  001  ◎★Yo\n")?;
        fs::write(texts.path().join("c.txt"), "")?;
        fs::copy(scripts.path().join("a.mes"), scripts.path().join("c.mes"))?;

        let report = ScriptsHandler::new(texts.path(), out.path()).import_all()?;
        assert_eq!(report.succeeded.len(), 1);
        let failed: Vec<_> = report
            .failed
            .iter()
            .map(|(p, _)| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(failed, vec!["b.txt", "c.txt"]);
        Ok(())
    }

    #[test]
    fn unencodable_entry_keeps_original_text() -> Result<()> {
        let scripts = tempfile::tempdir()?;
        let texts = tempfile::tempdir()?;
        let out = tempfile::tempdir()?;
        fs::write(scripts.path().join("a.mes"), ffexa_script())?;
        ToolConfig::with_input_path(scripts.path()).write_dir(texts.path())?;
        fs::write(
            texts.path().join("a.txt"),
            "#0xD\n★◎  001  ◎★Yo\n\n#0x14\n★◎  002  ◎★한\n",
        )?;

        let report = ScriptsHandler::new(texts.path(), out.path()).import_all()?;
        assert!(report.failed.is_empty());
        let view = ScriptView::parse(fs::read(&report.succeeded[0])?, None);
        let texts: Vec<_> = view.extract(false).into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec![b"Yo".to_vec(), b"abc".to_vec()]);
        Ok(())
    }

    #[test]
    fn extension_match_ignores_case() {
        assert!(has_extension(Path::new("a/B.MeS"), "mes"));
        assert!(!has_extension(Path::new("a/b.mes.bak"), "mes"));
        assert!(!has_extension(Path::new("a/mes"), "mes"));
    }
}
