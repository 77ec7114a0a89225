use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use mes_nls::CodePage;
use mes_script::profile::query_by_name;
use mes_script::{AdvTxtRegistry, ScriptVariant};

mod handler;
mod info;

use crate::handler::ScriptsHandler;
use crate::info::{ScriptInfo, TitleList};

#[derive(ClapParser, Debug)]
#[command(version, about = "MES script text extractor and importer")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Title profile to use instead of detecting it
    #[arg(short, long, global = true)]
    title: Option<String>,

    /// Code page of the text inside the scripts [default: 932]
    #[arg(short, long, global = true)]
    code_page: Option<CodePage>,

    /// Directory the `<title>_text` / `<title>_mes` folders are created in
    #[arg(short, long, global = true, default_value = ".")]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import if the directory holds a .MesTextTool file, export otherwise
    Process { input: PathBuf },
    /// Extract the text of every .mes script
    Export { input: PathBuf },
    /// Rebuild scripts from edited text files
    Import { input: PathBuf },
    /// Print a YAML summary of one script
    Info { input: PathBuf },
    /// List the known titles
    Titles,
}

/// Title and code page hints from the executable name, e.g. `mestexttool_dc4_cp936`.
fn hints_from_name(stem: &str, registry: &AdvTxtRegistry) -> (Option<String>, Option<CodePage>) {
    let mut title = None;
    let mut code_page = None;
    for part in stem.rsplit(['.', '-', '_']) {
        if title.is_none() {
            title = query_by_name(part)
                .map(|p| p.name.to_string())
                .or_else(|| registry.is_supported(part).then(|| part.to_string()));
        }
        if code_page.is_none() {
            code_page = part
                .strip_prefix("cp")
                .and_then(|id| id.parse::<u32>().ok())
                .and_then(CodePage::from_id);
        }
    }
    (title, code_page)
}

fn exe_hints(registry: &AdvTxtRegistry) -> (Option<String>, Option<CodePage>) {
    std::env::args_os()
        .next()
        .map(PathBuf::from)
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .map(|stem| hints_from_name(&stem, registry))
        .unwrap_or_default()
}

fn print_info(
    input: &Path,
    title: Option<&str>,
    code_page: CodePage,
    registry: &AdvTxtRegistry,
) -> Result<()> {
    let raw = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let script = ScriptVariant::load(raw, title, registry);
    let info = ScriptInfo::collect(&input.display().to_string(), &script, code_page);
    print!("{}", serde_yaml::to_string(&info)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.log { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(level));

    let registry = AdvTxtRegistry::default();
    let (hint_title, hint_code_page) = exe_hints(&registry);
    let title = args.title.or(hint_title);
    let code_page = args.code_page.or(hint_code_page).unwrap_or(CodePage::ShiftJis);
    if let Some(title) = &title {
        log::debug!("title: {title}");
    }

    let handler = |input: PathBuf| {
        ScriptsHandler::new(input, args.output.clone())
            .title(title.clone())
            .code_page(code_page)
            .registry(registry.clone())
    };

    match args.command {
        Command::Process { input } => {
            handler(input).process()?;
        }
        Command::Export { input } => {
            handler(input).export_all()?;
        }
        Command::Import { input } => {
            handler(input).import_all()?;
        }
        Command::Info { input } => print_info(&input, title.as_deref(), code_page, &registry)?,
        Command::Titles => print!("{}", serde_yaml::to_string(&TitleList::collect(&registry))?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn name_hints() {
        let registry = AdvTxtRegistry::default();
        assert_eq!(
            hints_from_name("MesTextTool_dc4_cp936", &registry),
            (Some("dc4".to_string()), Some(CodePage::Gbk))
        );
        assert_eq!(
            hints_from_name("mestexttool-utaeho4", &registry),
            (Some("utaeho4".to_string()), None)
        );
        assert_eq!(hints_from_name("mestexttool", &registry), (None, None));
        assert_eq!(hints_from_name("tool_cp1252", &registry), (None, None));
    }

    #[test]
    fn cli_parses() {
        let args = Args::try_parse_from(["mestexttool", "export", "in", "-c", "gbk", "-o", "out"])
            .unwrap();
        assert!(matches!(args.command, Command::Export { .. }));
        assert_eq!(args.code_page, Some(CodePage::Gbk));
        assert_eq!(args.output, PathBuf::from("out"));
        assert!(!args.log);
    }
}
