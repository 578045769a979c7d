use anyhow::{Context, Result, anyhow};
use rust_embed::RustEmbed;

use crate::config::{self, Layout};

#[derive(RustEmbed)]
#[folder = "presets"]
struct Presets;

/// Layout used when nothing else is selected.
pub const DEFAULT: &str = "express-backend";

/// Names of the built-in layouts, sorted.
pub fn names() -> Vec<String> {
    let mut names: Vec<String> = Presets::iter()
        .filter_map(|file| file.strip_suffix(".toml").map(str::to_owned))
        .collect();
    names.sort();
    names
}

pub fn load(name: &str) -> Result<Layout> {
    let file = Presets::get(&format!("{name}.toml")).ok_or_else(|| {
        anyhow!(
            "unknown preset `{}` (available: {})",
            name,
            names().join(", ")
        )
    })?;
    let raw = std::str::from_utf8(file.data.as_ref())
        .with_context(|| format!("decoding embedded preset `{}`", name))?;
    config::parse_toml(raw).with_context(|| format!("parsing embedded preset `{}`", name))
}
