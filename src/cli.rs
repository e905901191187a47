//! Command-line surface of the `aiwidget` binary: argument parsing and the
//! file helpers the commands share.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use tempfile::NamedTempFile;

use crate::{
    config::{errors::{ERR_CLI_IO, ERR_CLI_USAGE}, service::parse_base_url, ServiceConfig},
    render::{RenderProps, WidgetRenderBoundary},
    sandbox::SandboxExecutor,
};

pub const DEFAULT_PAGE_PATH: &str = "widgets.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Generate {
        base_url: Option<String>,
        out: PathBuf,
        dark: bool,
        show_details: bool,
    },
    Render {
        file: PathBuf,
        export: Option<String>,
        dark: bool,
        out: Option<PathBuf>,
    },
    Compile {
        file: PathBuf,
        export: Option<String>,
    },
    Help,
}

pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some((cmd, rest)) = args.split_first() else {
        return Err(anyhow!("{ERR_CLI_USAGE}: missing command"));
    };
    match cmd.as_str() {
        "generate" => parse_generate(rest),
        "render" => parse_render(rest),
        "compile" => parse_compile(rest),
        "--help" | "-h" | "help" => Ok(Command::Help),
        other => Err(anyhow!("{ERR_CLI_USAGE}: unknown command '{other}'")),
    }
}

fn parse_generate(args: &[String]) -> Result<Command> {
    let mut base_url = None;
    let mut out = PathBuf::from(DEFAULT_PAGE_PATH);
    let mut dark = false;
    let mut show_details = false;
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "--base-url" => {
                idx += 1;
                let raw = args
                    .get(idx)
                    .with_context(|| format!("{ERR_CLI_USAGE}: --base-url expects a URL"))?;
                parse_base_url(raw)
                    .with_context(|| format!("{ERR_CLI_USAGE}: invalid --base-url '{raw}'"))?;
                base_url = Some(raw.clone());
            }
            "--out" => {
                idx += 1;
                let path = args
                    .get(idx)
                    .with_context(|| format!("{ERR_CLI_USAGE}: --out expects a file path"))?;
                out = PathBuf::from(path);
            }
            "--dark" => dark = true,
            "--show-details" => show_details = true,
            flag => {
                return Err(anyhow!("{ERR_CLI_USAGE}: unexpected flag '{flag}' for generate command"));
            }
        }
        idx += 1;
    }
    Ok(Command::Generate {
        base_url,
        out,
        dark,
        show_details,
    })
}

fn parse_render(args: &[String]) -> Result<Command> {
    let mut file = None;
    let mut export = None;
    let mut dark = false;
    let mut out = None;
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "--export" => {
                idx += 1;
                let name = args
                    .get(idx)
                    .with_context(|| format!("{ERR_CLI_USAGE}: --export expects a name"))?;
                export = Some(name.clone());
            }
            "--out" => {
                idx += 1;
                let path = args
                    .get(idx)
                    .with_context(|| format!("{ERR_CLI_USAGE}: --out expects a file path"))?;
                out = Some(PathBuf::from(path));
            }
            "--dark" => dark = true,
            flag if flag.starts_with("--") => {
                return Err(anyhow!("{ERR_CLI_USAGE}: unexpected flag '{flag}' for render command"));
            }
            path => file = Some(PathBuf::from(path)),
        }
        idx += 1;
    }
    let file = file.with_context(|| format!("{ERR_CLI_USAGE}: render expects a source file"))?;
    Ok(Command::Render {
        file,
        export,
        dark,
        out,
    })
}

fn parse_compile(args: &[String]) -> Result<Command> {
    let mut file = None;
    let mut export = None;
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "--export" => {
                idx += 1;
                let name = args
                    .get(idx)
                    .with_context(|| format!("{ERR_CLI_USAGE}: --export expects a name"))?;
                export = Some(name.clone());
            }
            flag if flag.starts_with("--") => {
                return Err(anyhow!("{ERR_CLI_USAGE}: unexpected flag '{flag}' for compile command"));
            }
            path => file = Some(PathBuf::from(path)),
        }
        idx += 1;
    }
    let file = file.with_context(|| format!("{ERR_CLI_USAGE}: compile expects a source file"))?;
    Ok(Command::Compile { file, export })
}

pub fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("{ERR_CLI_IO}: failed to read {}", path.display()))
}

/// Replace `path` in one step so a browser reloading it never sees a
/// half-written page.
pub fn write_page(path: &Path, html: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("{ERR_CLI_IO}: failed to create a temp file in {}", dir.display()))?;
    tmp.write_all(html.as_bytes())
        .with_context(|| format!("{ERR_CLI_IO}: failed to write {}", tmp.path().display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("{ERR_CLI_IO}: failed to replace {}", path.display()))?;
    Ok(())
}

/// Compile, execute and render one local widget file to an HTML fragment.
/// Widget failures come back as the diagnostic panel, not as an error.
pub fn render_file(path: &Path, export: &str, config: &ServiceConfig, dark: bool) -> Result<String> {
    let source = read_source(path)?;
    let mut boundary = WidgetRenderBoundary::new(SandboxExecutor::default(), &source, export);
    boundary.set_show_details(true);
    Ok(boundary.render(&RenderProps::new(config.headers.clone(), dark)))
}

pub fn usage() -> &'static str {
    "Usage:\n  \
     aiwidget generate [--base-url URL] [--out FILE] [--dark] [--show-details]\n  \
     aiwidget render FILE [--export NAME] [--dark] [--out FILE]\n  \
     aiwidget compile FILE [--export NAME]\n  \
     aiwidget --help"
}
