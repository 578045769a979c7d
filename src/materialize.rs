//! Turns a [`Tree`] into directories and empty files on disk.
//!
//! The walk is additive: missing entries are created, existing ones are never
//! opened for writing, truncated or removed. A failure stops the walk where it
//! happened and whatever was already created stays on disk.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use crate::error::{EntryKind, MaterializeError, MaterializeResult};
use crate::tree::{Contents, PathEntry, Tree};

/// What a run created (or would create, for a dry run).
#[derive(Debug, Default)]
pub struct Report {
    created: Vec<PathEntry>,
    existing: usize,
}

impl Report {
    /// Created entries in creation order, parents before children.
    pub fn created(&self) -> &[PathEntry] {
        &self.created
    }

    pub fn directories_created(&self) -> usize {
        self.count(EntryKind::Directory)
    }

    pub fn files_created(&self) -> usize {
        self.count(EntryKind::File)
    }

    /// Entries the tree names that were already present.
    pub fn existing(&self) -> usize {
        self.existing
    }

    fn count(&self, kind: EntryKind) -> usize {
        self.created.iter().filter(|entry| entry.kind == kind).count()
    }
}

/// Create every missing directory and file of `tree` under `base`.
pub fn materialize(base: &Utf8Path, tree: &Tree) -> MaterializeResult<Report> {
    Materializer::new(base).run(tree)
}

pub struct Materializer {
    base: Utf8PathBuf,
    dry_run: bool,
}

impl Materializer {
    pub fn new(base: impl Into<Utf8PathBuf>) -> Self {
        Self {
            base: base.into(),
            dry_run: false,
        }
    }

    /// Walk without writing; the report lists what would be created.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn run(&self, tree: &Tree) -> MaterializeResult<Report> {
        tree.validate(&self.base)?;

        let mut walk = Walk {
            dry_run: self.dry_run,
            known: HashMap::new(),
            report: Report::default(),
        };
        walk.tree(&self.base, tree)?;
        Ok(walk.report)
    }
}

struct Walk {
    dry_run: bool,
    // Entries handled earlier in this run. Dry runs rely on it to see their
    // own planned directories.
    known: HashMap<Utf8PathBuf, EntryKind>,
    report: Report,
}

impl Walk {
    fn tree(&mut self, base: &Utf8Path, tree: &Tree) -> MaterializeResult<()> {
        for (slot, contents) in tree.entries() {
            let current = slot.resolve(base);
            self.ensure_dir(&current)?;
            match contents {
                Contents::Branch(child) => self.tree(&current, child)?,
                Contents::Files(files) => {
                    for file in files {
                        self.ensure_file(&current.join(file))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn ensure_dir(&mut self, path: &Utf8Path) -> MaterializeResult<()> {
        if self.known.get(path) == Some(&EntryKind::Directory) {
            return Ok(());
        }

        // Walk up until an existing directory, collecting what is missing so
        // each created ancestor gets reported.
        let mut missing = Vec::new();
        let mut cursor = Some(path);
        while let Some(dir) = cursor {
            if dir.as_str().is_empty() {
                break;
            }
            match self.kind_at(dir)? {
                Some(EntryKind::Directory) => break,
                Some(found) => {
                    return Err(MaterializeError::Conflict {
                        path: dir.to_owned(),
                        expected: EntryKind::Directory,
                        found,
                    });
                }
                None => missing.push(dir.to_owned()),
            }
            cursor = dir.parent();
        }

        if missing.is_empty() {
            debug!("directory {} already exists", path);
            self.report.existing += 1;
            self.known.insert(path.to_owned(), EntryKind::Directory);
            return Ok(());
        }

        if !self.dry_run {
            fs::create_dir_all(path).map_err(|err| MaterializeError::from_io(path, err))?;
        }
        for dir in missing.into_iter().rev() {
            info!("created directory {}", dir);
            self.record(dir, EntryKind::Directory);
        }
        Ok(())
    }

    fn ensure_file(&mut self, path: &Utf8Path) -> MaterializeResult<()> {
        if self.known.get(path) == Some(&EntryKind::File) {
            return Ok(());
        }

        match self.kind_at(path)? {
            Some(EntryKind::Directory) => {
                return Err(MaterializeError::Conflict {
                    path: path.to_owned(),
                    expected: EntryKind::File,
                    found: EntryKind::Directory,
                });
            }
            Some(_) => {
                debug!("file {} already exists", path);
                self.report.existing += 1;
                self.known.insert(path.to_owned(), EntryKind::File);
                return Ok(());
            }
            None => {}
        }

        if !self.dry_run {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(_) => {}
                // Dangling symlinks look absent to `metadata` but still occupy the name.
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("file {} already exists", path);
                    self.report.existing += 1;
                    self.known.insert(path.to_owned(), EntryKind::File);
                    return Ok(());
                }
                Err(err) => return Err(MaterializeError::from_io(path, err)),
            }
        }
        info!("created file {}", path);
        self.record(path.to_owned(), EntryKind::File);
        Ok(())
    }

    /// Kind of entry at `path`, if any.
    fn kind_at(&self, path: &Utf8Path) -> MaterializeResult<Option<EntryKind>> {
        if let Some(kind) = self.known.get(path) {
            return Ok(Some(*kind));
        }
        match fs::metadata(path) {
            Ok(metadata) => Ok(Some(EntryKind::of(&metadata))),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) =>
            {
                Ok(None)
            }
            Err(err) => Err(MaterializeError::from_io(path, err)),
        }
    }

    fn record(&mut self, path: Utf8PathBuf, kind: EntryKind) {
        self.known.insert(path.clone(), kind);
        self.report.created.push(PathEntry { path, kind });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn scratch() -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        (tmp, root)
    }

    /// Relative path -> file content (`None` for directories).
    fn snapshot(root: &Utf8Path) -> BTreeMap<String, Option<Vec<u8>>> {
        fn visit(root: &Utf8Path, dir: &Utf8Path, out: &mut BTreeMap<String, Option<Vec<u8>>>) {
            for entry in dir.read_dir_utf8().unwrap() {
                let entry = entry.unwrap();
                let path = entry.path();
                let rel = path.strip_prefix(root).unwrap().to_string();
                if entry.file_type().unwrap().is_dir() {
                    out.insert(rel, None);
                    visit(root, path, out);
                } else {
                    out.insert(rel, Some(fs::read(path).unwrap()));
                }
            }
        }
        let mut out = BTreeMap::new();
        if root.exists() {
            visit(root, root, &mut out);
        }
        out
    }

    fn scenario() -> Tree {
        Tree::new()
            .with_branch("a", Tree::new().with_files("", ["x.js"]))
            .with_files("", ["readme.md"])
    }

    #[test]
    fn creates_scenario_under_missing_base() {
        let (_tmp, root) = scratch();
        let base = root.join("P");

        let report = materialize(&base, &scenario()).unwrap();

        assert!(base.is_dir());
        assert!(base.join("a").is_dir());
        assert!(base.join("a/x.js").is_file());
        assert!(base.join("readme.md").is_file());
        assert_eq!(fs::read(base.join("a/x.js")).unwrap(), b"");
        assert_eq!(report.directories_created(), 2);
        assert_eq!(report.files_created(), 2);
        assert_eq!(report.created()[0].path, base);
    }

    #[test]
    fn second_run_changes_nothing() {
        let (_tmp, root) = scratch();
        let base = root.join("P");

        materialize(&base, &scenario()).unwrap();
        let before = snapshot(&root);
        let report = materialize(&base, &scenario()).unwrap();

        assert!(report.created().is_empty());
        assert_eq!(report.existing(), 4);
        assert_eq!(snapshot(&root), before);
    }

    #[test]
    fn existing_content_is_preserved() {
        let (_tmp, root) = scratch();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("readme.md"), "hello").unwrap();
        fs::write(root.join("a/x.js"), "export {}").unwrap();

        let report = materialize(&root, &scenario()).unwrap();

        assert!(report.created().is_empty());
        assert_eq!(fs::read_to_string(root.join("readme.md")).unwrap(), "hello");
        assert_eq!(fs::read_to_string(root.join("a/x.js")).unwrap(), "export {}");
    }

    #[test]
    fn empty_key_attaches_files_to_current_directory() {
        let (_tmp, root) = scratch();
        let tree = Tree::new()
            .with_files("", ["a.txt"])
            .with_branch("sub", Tree::new().with_files("", ["b.txt"]));

        materialize(&root, &tree).unwrap();

        let listing: Vec<_> = snapshot(&root).into_keys().collect();
        assert_eq!(listing, ["a.txt", "sub", "sub/b.txt"]);
    }

    #[test]
    fn every_implied_path_exists() {
        let (_tmp, root) = scratch();
        let base = root.join("backend");
        let tree = Tree::new()
            .with_branch(
                "src",
                Tree::new()
                    .with_files("config", ["db.js", "env.js"])
                    .with_branch(
                        "modules",
                        Tree::new()
                            .with_files("auth", ["auth.routes.js"])
                            .with_files("games", ["games.routes.js"]),
                    )
                    .with_files("", ["app.js"]),
            )
            .with_files("seed", ["seedGames.js"])
            .with_files("", ["package.json"]);

        materialize(&base, &tree).unwrap();

        for entry in tree.paths(&base) {
            let metadata = fs::metadata(&entry.path).unwrap();
            assert_eq!(EntryKind::of(&metadata), entry.kind, "{}", entry.path);
        }
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let forward = Tree::new()
            .with_files("", ["top.txt"])
            .with_files("b", ["one", "two"])
            .with_branch("a", Tree::new().with_files("c", ["deep"]));
        let reverse = Tree::new()
            .with_branch("a", Tree::new().with_files("c", ["deep"]))
            .with_files("b", ["one", "two"])
            .with_files("", ["top.txt"]);

        let (_left_tmp, left) = scratch();
        let (_right_tmp, right) = scratch();
        materialize(&left, &forward).unwrap();
        materialize(&right, &reverse).unwrap();

        assert_eq!(snapshot(&left), snapshot(&right));
    }

    #[test]
    fn file_in_place_of_directory_is_a_conflict() {
        let (_tmp, root) = scratch();
        fs::write(root.join("a"), "not a dir").unwrap();

        let err = materialize(&root, &scenario()).unwrap_err();

        match err {
            MaterializeError::Conflict {
                path,
                expected,
                found,
            } => {
                assert_eq!(path, root.join("a"));
                assert_eq!(expected, EntryKind::Directory);
                assert_eq!(found, EntryKind::File);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Loose files come first and are not rolled back.
        assert!(root.join("readme.md").is_file());
        assert_eq!(fs::read_to_string(root.join("a")).unwrap(), "not a dir");
    }

    #[test]
    fn directory_in_place_of_file_is_a_conflict() {
        let (_tmp, root) = scratch();
        fs::create_dir_all(root.join("readme.md")).unwrap();

        let err = materialize(&root, &scenario()).unwrap_err();

        assert!(matches!(
            err,
            MaterializeError::Conflict {
                expected: EntryKind::File,
                found: EntryKind::Directory,
                ..
            }
        ));
        assert!(!root.join("a").exists());
    }

    #[test]
    fn file_blocking_an_ancestor_is_a_conflict() {
        let (_tmp, root) = scratch();
        fs::write(root.join("blocker"), "").unwrap();
        let base = root.join("blocker/nested");

        let err = materialize(&base, &scenario()).unwrap_err();

        match err {
            MaterializeError::Conflict { path, .. } => assert_eq!(path, root.join("blocker")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_name_fails_before_any_write() {
        let (_tmp, root) = scratch();
        let base = root.join("P");
        let tree = Tree::new()
            .with_files("", ["fine.txt"])
            .with_files("zzz", ["../escape"]);

        let err = materialize(&base, &tree).unwrap_err();

        assert!(matches!(err, MaterializeError::InvalidPath { .. }));
        assert!(!base.exists());
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let (_tmp, root) = scratch();
        let base = root.join("P");

        let report = Materializer::new(&base)
            .dry_run(true)
            .run(&scenario())
            .unwrap();

        assert_eq!(report.directories_created(), 2);
        assert_eq!(report.files_created(), 2);
        assert!(!base.exists());
    }

    #[test]
    fn dry_run_sees_existing_entries_and_conflicts() {
        let (_tmp, root) = scratch();
        fs::write(root.join("readme.md"), "keep").unwrap();

        let report = Materializer::new(&root)
            .dry_run(true)
            .run(&scenario())
            .unwrap();
        let planned: Vec<_> = report
            .created()
            .iter()
            .map(|entry| entry.path.strip_prefix(&root).unwrap().to_string())
            .collect();
        assert_eq!(planned, ["a", "a/x.js"]);

        fs::write(root.join("a"), "").unwrap();
        let err = Materializer::new(&root)
            .dry_run(true)
            .run(&scenario())
            .unwrap_err();
        assert!(matches!(err, MaterializeError::Conflict { .. }));
    }

    #[test]
    fn repeated_file_names_are_created_once() {
        let (_tmp, root) = scratch();
        let tree = Tree::new().with_files("", ["dup.txt", "dup.txt"]);

        let report = materialize(&root, &tree).unwrap();

        assert_eq!(report.files_created(), 1);
    }

    #[test]
    fn file_and_directory_with_same_name_conflict() {
        let (_tmp, root) = scratch();
        let tree = Tree::new()
            .with_branch("", Tree::new().with_files("", ["x"]))
            .with_files("x", ["inner"]);

        let err = materialize(&root, &tree).unwrap_err();

        assert!(matches!(
            err,
            MaterializeError::Conflict {
                expected: EntryKind::Directory,
                found: EntryKind::File,
                ..
            }
        ));
        assert!(root.join("x").is_file());
    }

    #[test]
    fn multi_segment_key_builds_nested_directories() {
        let (_tmp, root) = scratch();
        let tree = Tree::new().with_files("src/config", ["db.js"]);

        let report = materialize(&root, &tree).unwrap();

        assert!(root.join("src").is_dir());
        assert!(root.join("src/config/db.js").is_file());
        let created: Vec<_> = report
            .created()
            .iter()
            .map(|entry| entry.path.strip_prefix(&root).unwrap().to_string())
            .collect();
        assert_eq!(created, ["src", "src/config", "src/config/db.js"]);
    }

    #[cfg(not(windows))]
    #[test]
    fn backslash_file_name_is_created_verbatim() {
        let (_tmp, root) = scratch();
        let tree = Tree::new().with_files("", ["a\\b.txt"]);

        materialize(&root, &tree).unwrap();

        let listing: Vec<_> = snapshot(&root).into_keys().collect();
        assert_eq!(listing, ["a\\b.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn read_only_parent_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, root) = scratch();
        let locked = root.join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        // Root ignores mode bits; nothing to check then.
        if fs::write(locked.join(".writable"), "").is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let tree = Tree::new().with_files("", ["new.txt"]);
        let result = materialize(&locked, &tree);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        match result.unwrap_err() {
            MaterializeError::PermissionDenied { path } => {
                assert_eq!(path, locked.join("new.txt"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!locked.join("new.txt").exists());
    }

    #[test]
    fn empty_tree_touches_nothing() {
        let (_tmp, root) = scratch();
        let base = root.join("never");

        let report = materialize(&base, &Tree::new()).unwrap();

        assert!(report.created().is_empty());
        assert!(!base.exists());
    }
}
