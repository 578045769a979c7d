use std::collections::{BTreeMap, BTreeSet};

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{EntryKind, MaterializeError, MaterializeResult};

/// Key of one entry in a tree level.
///
/// In layout files the empty string stands for [`Slot::Current`]: its contents
/// are placed in the directory the level already describes, not in a new
/// subdirectory. Ordering puts `Current` before any named slot.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Slot {
    Current,
    Named(String),
}

impl Slot {
    pub fn from_key(key: &str) -> Self {
        if key.is_empty() {
            Slot::Current
        } else {
            Slot::Named(key.to_owned())
        }
    }

    pub fn as_key(&self) -> &str {
        match self {
            Slot::Current => "",
            Slot::Named(name) => name,
        }
    }

    /// Directory this slot's contents live in, relative to `base`.
    pub fn resolve(&self, base: &Utf8Path) -> Utf8PathBuf {
        match self {
            Slot::Current => base.to_owned(),
            Slot::Named(name) => base.join(name),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Contents {
    /// Plain files created directly in the slot's directory.
    Files(Vec<String>),
    /// Nested structure rooted at the slot's directory.
    Branch(Tree),
}

/// Declarative directory skeleton.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Contents>",
    into = "BTreeMap<String, Contents>"
)]
pub struct Tree {
    entries: BTreeMap<Slot, Contents>,
}

/// A path the tree implies, with the kind of entry expected there.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathEntry {
    pub path: Utf8PathBuf,
    pub kind: EntryKind,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert contents under `slot`, returning whatever was there before.
    pub fn insert(&mut self, slot: Slot, contents: Contents) -> Option<Contents> {
        self.entries.insert(slot, contents)
    }

    pub fn with_files<I, S>(mut self, key: &str, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let files = files.into_iter().map(Into::into).collect();
        self.insert(Slot::from_key(key), Contents::Files(files));
        self
    }

    pub fn with_branch(mut self, key: &str, child: Tree) -> Self {
        self.insert(Slot::from_key(key), Contents::Branch(child));
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Slot, &Contents)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check every directory and file name before anything touches disk.
    ///
    /// Directory keys may span several components (`src/config`) but must stay
    /// relative and below their level. File names must be a single component
    /// on this host. `base` only feeds the error message so the offending
    /// entry is reported where it would land.
    pub fn validate(&self, base: &Utf8Path) -> MaterializeResult<()> {
        for (slot, contents) in &self.entries {
            if let Slot::Named(name) = slot {
                check_dir_key(name).map_err(|reason| {
                    MaterializeError::invalid(&base.join(name), reason)
                })?;
            }
            let current = slot.resolve(base);
            match contents {
                Contents::Branch(child) => child.validate(&current)?,
                Contents::Files(files) => {
                    for file in files {
                        check_file_name(file).map_err(|reason| {
                            MaterializeError::invalid(&current.join(file), reason)
                        })?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Every path the tree implies under `base`, in traversal order.
    ///
    /// Each path appears once even when several `Current` slots point at the
    /// same directory.
    pub fn paths(&self, base: &Utf8Path) -> Vec<PathEntry> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        self.collect_paths(base, &mut seen, &mut out);
        out
    }

    fn collect_paths(
        &self,
        base: &Utf8Path,
        seen: &mut BTreeSet<Utf8PathBuf>,
        out: &mut Vec<PathEntry>,
    ) {
        for (slot, contents) in &self.entries {
            let current = slot.resolve(base);
            if seen.insert(current.clone()) {
                out.push(PathEntry {
                    path: current.clone(),
                    kind: EntryKind::Directory,
                });
            }
            match contents {
                Contents::Branch(child) => child.collect_paths(&current, seen, out),
                Contents::Files(files) => {
                    for file in files {
                        let path = current.join(file);
                        if seen.insert(path.clone()) {
                            out.push(PathEntry {
                                path,
                                kind: EntryKind::File,
                            });
                        }
                    }
                }
            }
        }
    }
}

fn check_dir_key(key: &str) -> Result<(), &'static str> {
    if key.contains('\0') {
        return Err("name contains a NUL byte");
    }
    let mut normal = 0;
    for component in Utf8Path::new(key).components() {
        match component {
            Utf8Component::Normal(_) => normal += 1,
            Utf8Component::CurDir | Utf8Component::ParentDir => {
                return Err("relative components are not allowed");
            }
            Utf8Component::RootDir | Utf8Component::Prefix(_) => {
                return Err("directory keys must be relative");
            }
        }
    }
    if normal == 0 {
        return Err("name is empty");
    }
    Ok(())
}

fn check_file_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name is empty");
    }
    if name == "." || name == ".." {
        return Err("relative components are not allowed");
    }
    if name.chars().any(std::path::is_separator) {
        return Err("name contains a path separator");
    }
    if name.contains('\0') {
        return Err("name contains a NUL byte");
    }
    Ok(())
}

impl From<BTreeMap<String, Contents>> for Tree {
    fn from(raw: BTreeMap<String, Contents>) -> Self {
        let entries = raw
            .into_iter()
            .map(|(key, contents)| (Slot::from_key(&key), contents))
            .collect();
        Self { entries }
    }
}

impl From<Tree> for BTreeMap<String, Contents> {
    fn from(tree: Tree) -> Self {
        tree.entries
            .into_iter()
            .map(|(slot, contents)| (slot.as_key().to_owned(), contents))
            .collect()
    }
}
