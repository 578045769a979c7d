use std::fs;

use anyhow::{Context, Result, anyhow, bail};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::tree::Tree;

/// File name looked up from the working directory upwards when no layout is given.
pub const DISCOVERY_FILE: &str = "skel.toml";

/// A skeleton to materialize: where it goes and what it contains.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Layout {
    /// Default base path; `--base` overrides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<Utf8PathBuf>,
    #[serde(default)]
    pub structure: Tree,
}

/// Load a layout file, picking the format from its extension.
pub fn load_from_path(path: &Utf8Path) -> Result<Layout> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading layout {}", path))?;
    let parsed = match path.extension() {
        Some("toml") => parse_toml(&raw),
        Some("json") => parse_json(&raw),
        other => bail!(
            "unsupported layout format `{}` for {}; use .toml or .json",
            other.unwrap_or(""),
            path
        ),
    };
    parsed.with_context(|| format!("parsing layout {}", path))
}

pub fn parse_toml(raw: &str) -> Result<Layout> {
    Ok(toml::from_str(raw)?)
}

pub fn parse_json(raw: &str) -> Result<Layout> {
    Ok(serde_json::from_str(raw)?)
}

/// Nearest `skel.toml` in `start` or one of its ancestors.
pub fn discover(start: &Utf8Path) -> Option<Utf8PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(DISCOVERY_FILE))
        .find(|candidate| candidate.is_file())
}

/// Expand a leading `~` component to the user's home directory.
pub fn expand_base(path: &Utf8Path) -> Result<Utf8PathBuf> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_owned());
    };
    let home = dirs::home_dir().ok_or_else(|| anyhow!("unable to determine home directory"))?;
    let home = Utf8PathBuf::from_path_buf(home)
        .map_err(|_| anyhow!("home directory path must be valid UTF-8"))?;
    Ok(if rest.as_str().is_empty() {
        home
    } else {
        home.join(rest)
    })
}
