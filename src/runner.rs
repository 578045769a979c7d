use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use crate::cli::{Cli, Command};
use crate::config::{self, Layout};
use crate::error::EntryKind;
use crate::materialize::{Materializer, Report, materialize};
use crate::tree::Tree;
use crate::{outline, presets};

#[derive(Clone, Debug, Eq, PartialEq)]
enum LayoutSource {
    Explicit(Utf8PathBuf),
    Preset(String),
    Discovered(Utf8PathBuf),
    Default,
}

impl LayoutSource {
    fn describe(&self) -> String {
        match self {
            LayoutSource::Explicit(path) => format!("layout {}", path),
            LayoutSource::Preset(name) => format!("preset `{}`", name),
            LayoutSource::Discovered(path) => format!("layout {} (discovered)", path),
            LayoutSource::Default => format!("preset `{}` (default)", presets::DEFAULT),
        }
    }

    /// Directory a relative layout `base` is anchored to, if not the working directory.
    fn anchor(&self) -> Option<&Utf8Path> {
        match self {
            LayoutSource::Explicit(path) | LayoutSource::Discovered(path) => path.parent(),
            LayoutSource::Preset(_) | LayoutSource::Default => None,
        }
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let ctx = CliContext::from(&cli);

    match cli.command.unwrap_or(Command::Apply) {
        Command::Presets => handle_presets(),
        Command::Apply => {
            let state = AppState::new(ctx, discover_layout()?)?;
            handle_apply(&state)
        }
        Command::Show { json } => {
            let state = AppState::new(ctx, discover_layout()?)?;
            handle_show(&state, json)
        }
    }
}

fn handle_presets() -> Result<()> {
    println!("Built-in layouts:");
    for name in presets::names() {
        let layout = presets::load(&name)?;
        let base = layout.base.unwrap_or_else(|| Utf8PathBuf::from("."));
        let paths = layout.structure.paths(&base);
        let files = paths.iter().filter(|entry| entry.kind == EntryKind::File).count();
        let default = if name == presets::DEFAULT { ", default" } else { "" };
        println!(
            "  - {} ({} directories, {} files in {}/{})",
            name,
            paths.len() - files,
            files,
            base,
            default
        );
    }
    Ok(())
}

fn handle_apply(state: &AppState) -> Result<()> {
    info!(
        "materializing {} into {}",
        state.source.describe(),
        state.base
    );
    if state.tree.is_empty() {
        warn!("{} describes no entries", state.source.describe());
    }

    if state.ctx.dry_run {
        let report = Materializer::new(&state.base)
            .dry_run(true)
            .run(&state.tree)
            .with_context(|| format!("planning layout in {}", state.base))?;
        print!("{}", dry_run_summary(&state.base, &report));
        return Ok(());
    }

    let report = materialize(&state.base, &state.tree)
        .with_context(|| format!("materializing layout into {}", state.base))?;
    info!("{} entries were already present", report.existing());
    println!("{}", completion_message(&state.base, &report));
    Ok(())
}

fn handle_show(state: &AppState, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(&state.tree).context("serializing layout to JSON")?;
        println!("{}", rendered);
    } else {
        print!("{}", outline::render(&state.base, &state.tree));
    }
    Ok(())
}

fn completion_message(base: &Utf8Path, report: &Report) -> String {
    format!(
        "✅ {} structure created successfully ({} directories, {} files created).",
        base,
        report.directories_created(),
        report.files_created()
    )
}

fn dry_run_summary(base: &Utf8Path, report: &Report) -> String {
    if report.created().is_empty() {
        return format!("(dry-run) nothing to create under {}\n", base);
    }

    let mut out = String::new();
    for entry in report.created() {
        out.push_str(&format!("  would create {} {}\n", entry.kind, entry.path));
    }
    out.push_str(&format!(
        "(dry-run) {} directories and {} files would be created under {}\n",
        report.directories_created(),
        report.files_created(),
        base
    ));
    out
}

/// `skel.toml` found from the working directory upwards, if any.
fn discover_layout() -> Result<Option<Utf8PathBuf>> {
    let cwd = std::env::current_dir().context("determining current directory")?;
    let cwd = Utf8PathBuf::from_path_buf(cwd)
        .map_err(|_| anyhow!("current directory must be valid UTF-8"))?;
    Ok(config::discover(&cwd))
}

fn utf8(path: &Path, what: &str) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).map_err(|_| anyhow!("{} must be valid UTF-8", what))
}

#[derive(Clone, Debug)]
struct CliContext {
    file: Option<PathBuf>,
    preset: Option<String>,
    base: Option<PathBuf>,
    dry_run: bool,
}

impl CliContext {
    fn resolve_layout(&self, discovered: Option<Utf8PathBuf>) -> Result<(LayoutSource, Layout)> {
        if self.file.is_some() && self.preset.is_some() {
            bail!("--file and --preset cannot be used together");
        }

        if let Some(path) = &self.file {
            let path = utf8(path, "layout path")?;
            let layout = config::load_from_path(&path)?;
            return Ok((LayoutSource::Explicit(path), layout));
        }

        if let Some(name) = &self.preset {
            let layout = presets::load(name)?;
            return Ok((LayoutSource::Preset(name.clone()), layout));
        }

        if let Some(path) = discovered {
            let layout = config::load_from_path(&path)?;
            return Ok((LayoutSource::Discovered(path), layout));
        }

        Ok((LayoutSource::Default, presets::load(presets::DEFAULT)?))
    }

    /// `--base` (relative to the working directory), else the layout's own
    /// base (relative to its file), else the working directory.
    fn resolve_base(&self, source: &LayoutSource, layout: &Layout) -> Result<Utf8PathBuf> {
        if let Some(base) = &self.base {
            return config::expand_base(&utf8(base, "base path")?);
        }

        let Some(base) = &layout.base else {
            return Ok(Utf8PathBuf::from("."));
        };
        let base = config::expand_base(base)?;
        Ok(match source.anchor() {
            Some(anchor) if base.is_relative() => anchor.join(base),
            _ => base,
        })
    }
}

impl From<&Cli> for CliContext {
    fn from(cli: &Cli) -> Self {
        Self {
            file: cli.file.clone(),
            preset: cli.preset.clone(),
            base: cli.base.clone(),
            dry_run: cli.dry_run,
        }
    }
}

struct AppState {
    ctx: CliContext,
    source: LayoutSource,
    base: Utf8PathBuf,
    tree: Tree,
}

impl AppState {
    fn new(ctx: CliContext, discovered: Option<Utf8PathBuf>) -> Result<Self> {
        let (source, layout) = ctx.resolve_layout(discovered)?;
        let base = ctx.resolve_base(&source, &layout)?;
        Ok(Self {
            ctx,
            source,
            base,
            tree: layout.structure,
        })
    }
}
