use std::fs;
use std::io;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::Builder;
use tracing::warn;

use crate::domain::{Bundle, DatasetId};
use crate::error::GoldError;

/// Prefix of the scratch directories bundles are written into before the
/// final rename. Directories carrying it are never reported as datasets.
pub const TEMP_PREFIX: &str = ".clams-gold-";

#[derive(Debug, Clone)]
pub struct Store {
    cache_root: Utf8PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct CachedDataset {
    pub id: String,
    pub path: String,
    pub files: usize,
    pub modified: Option<String>,
}

impl Store {
    pub fn new(cache_root: Utf8PathBuf) -> Self {
        Self { cache_root }
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    pub fn dataset_dir(&self, id: &DatasetId) -> Utf8PathBuf {
        id.segments()
            .fold(self.cache_root.clone(), |path, segment| path.join(segment))
    }

    pub fn ensure_cache_root(&self) -> Result<(), GoldError> {
        fs::create_dir_all(self.cache_root.as_std_path())
            .map_err(|err| GoldError::Filesystem(err.to_string()))
    }

    /// A dataset directory counts as present only when it holds at least one
    /// regular file of its own; empty or subdirectory-only dirs are misses.
    pub fn is_populated(&self, dir: &Utf8Path) -> Result<bool, GoldError> {
        if !dir.is_dir() {
            return Ok(false);
        }
        Ok(count_files(dir)? > 0)
    }

    pub fn file_names(&self, dir: &Utf8Path) -> Result<Vec<String>, GoldError> {
        let mut names = Vec::new();
        for entry in read_dir(dir)? {
            let entry = entry.map_err(|err| GoldError::Filesystem(err.to_string()))?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Materializes `bundle` at `dest`, replacing whatever was there. Files are
    /// written to a sibling temp dir first so `dest` is never half-filled.
    pub fn write_bundle_atomic(&self, dest: &Utf8Path, bundle: &Bundle) -> Result<(), GoldError> {
        let parent = dest
            .parent()
            .ok_or_else(|| GoldError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| GoldError::Filesystem(format!("create {parent}: {err}")))?;
        let temp_dir = Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(parent.as_std_path())
            .map_err(|err| GoldError::Filesystem(err.to_string()))?;

        for file in &bundle.files {
            let target = temp_dir.path().join(&file.name);
            fs::write(&target, &file.bytes).map_err(|err| {
                GoldError::Filesystem(format!("write {}: {err}", target.display()))
            })?;
        }

        let staged = Utf8Path::from_path(temp_dir.path())
            .ok_or_else(|| GoldError::Filesystem("invalid temp dir".to_string()))?;
        let carried = carry_subdirs(dest, staged)?;
        if let Err(err) = atomic_rename_dir(staged.as_std_path(), dest.as_std_path()) {
            restore_subdirs(staged, dest, &carried);
            return Err(GoldError::Filesystem(format!("move into {dest}: {err}")));
        }
        Ok(())
    }

    pub fn remove_dataset(&self, id: &DatasetId) -> Result<bool, GoldError> {
        let dir = self.dataset_dir(id);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(dir.as_std_path())
            .map_err(|err| GoldError::Filesystem(err.to_string()))?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<bool, GoldError> {
        if !self.cache_root.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(self.cache_root.as_std_path())
            .map_err(|err| GoldError::Filesystem(err.to_string()))?;
        Ok(true)
    }

    pub fn list_datasets(&self) -> Result<Vec<CachedDataset>, GoldError> {
        if !self.cache_root.is_dir() {
            return Ok(Vec::new());
        }
        let mut datasets = Vec::new();
        for dir in walk_dirs(&self.cache_root)? {
            let files = count_files(&dir)?;
            if files == 0 {
                continue;
            }
            let Ok(relative) = dir.strip_prefix(&self.cache_root) else {
                continue;
            };
            let id = relative
                .components()
                .map(|component| component.as_str())
                .collect::<Vec<_>>()
                .join("/");
            datasets.push(CachedDataset {
                id,
                path: dir.to_string(),
                files,
                modified: modified_at(&dir),
            });
        }
        datasets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(datasets)
    }
}

fn read_dir(dir: &Utf8Path) -> Result<camino::ReadDirUtf8, GoldError> {
    dir.read_dir_utf8()
        .map_err(|err| GoldError::Filesystem(format!("read {dir}: {err}")))
}

fn count_files(dir: &Utf8Path) -> Result<usize, GoldError> {
    let mut count = 0;
    for entry in read_dir(dir)? {
        let entry = entry.map_err(|err| GoldError::Filesystem(err.to_string()))?;
        if entry.path().is_file() {
            count += 1;
        }
    }
    Ok(count)
}

/// All directories below `root`, not including `root`, skipping scratch dirs.
fn walk_dirs(root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, GoldError> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        for entry in read_dir(&path)? {
            let entry = entry.map_err(|err| GoldError::Filesystem(err.to_string()))?;
            if !entry.path().is_dir() || entry.file_name().starts_with(TEMP_PREFIX) {
                continue;
            }
            stack.push(entry.path().to_path_buf());
            items.push(entry.path().to_path_buf());
        }
    }
    Ok(items)
}

fn modified_at(path: &Utf8Path) -> Option<String> {
    let modified = fs::metadata(path.as_std_path()).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified).to_rfc3339())
}

/// Moves the nested dataset directories of `dest` into `staged`, so that
/// replacing `dest` keeps them. A bundle file of the same name wins.
fn carry_subdirs(dest: &Utf8Path, staged: &Utf8Path) -> Result<Vec<String>, GoldError> {
    if !dest.is_dir() {
        return Ok(Vec::new());
    }
    let mut subdirs = Vec::new();
    for entry in read_dir(dest)? {
        let entry = entry.map_err(|err| GoldError::Filesystem(err.to_string()))?;
        if entry.path().is_dir() && !entry.file_name().starts_with(TEMP_PREFIX) {
            subdirs.push(entry.file_name().to_string());
        }
    }

    let mut carried = Vec::new();
    for name in subdirs {
        let target = staged.join(&name);
        if target.exists() {
            warn!(path = %dest.join(&name), "nested directory replaced by bundle file");
            continue;
        }
        if let Err(err) = fs::rename(dest.join(&name), &target) {
            restore_subdirs(staged, dest, &carried);
            return Err(GoldError::Filesystem(format!(
                "move {}: {err}",
                dest.join(&name)
            )));
        }
        carried.push(name);
    }
    Ok(carried)
}

fn restore_subdirs(staged: &Utf8Path, dest: &Utf8Path, carried: &[String]) {
    if carried.is_empty() {
        return;
    }
    if let Err(err) = fs::create_dir_all(dest) {
        warn!(%dest, %err, "failed to recreate dataset directory");
        return;
    }
    for name in carried {
        if let Err(err) = fs::rename(staged.join(name), dest.join(name)) {
            warn!(%dest, name = %name, %err, "failed to restore nested dataset");
        }
    }
}

/// Swaps `from` into `to`. An existing `to` directory is renamed aside first
/// and put back if the swap fails.
pub fn atomic_rename_dir(from: &Path, to: &Path) -> io::Result<()> {
    if !to.exists() {
        return fs::rename(from, to);
    }
    if !to.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a directory", to.display()),
        ));
    }
    let mut retired_name = from.file_name().unwrap_or_default().to_os_string();
    retired_name.push("-retired");
    let retired = from.with_file_name(retired_name);

    fs::rename(to, &retired)?;
    if let Err(err) = fs::rename(from, to) {
        fs::rename(&retired, to)?;
        return Err(err);
    }
    if let Err(err) = fs::remove_dir_all(&retired) {
        warn!(path = %retired.display(), %err, "failed to remove replaced directory");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BundleFile;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("golds")).unwrap();
        (temp, Store::new(root))
    }

    #[test]
    fn nested_ids_map_to_nested_dirs() {
        let store = Store::new(Utf8PathBuf::from("/tmp/cache"));
        let id: DatasetId = "newshour/golds".parse().unwrap();
        assert_eq!(
            store.dataset_dir(&id),
            Utf8PathBuf::from("/tmp/cache/newshour/golds")
        );
    }

    #[test]
    fn directory_with_only_subdirs_is_not_populated() {
        let (_temp, store) = temp_store();
        let parent: DatasetId = "newshour".parse().unwrap();
        let dir = store.dataset_dir(&parent);
        fs::create_dir_all(dir.join("golds").as_std_path()).unwrap();

        assert!(!store.is_populated(&dir).unwrap());
        fs::write(dir.join("golds").join("a.json").as_std_path(), b"{}").unwrap();
        assert!(!store.is_populated(&dir).unwrap());
        assert!(store.is_populated(&dir.join("golds")).unwrap());
    }

    #[test]
    fn atomic_write_replaces_stale_content() {
        let (_temp, store) = temp_store();
        let id: DatasetId = "batch-01".parse().unwrap();
        let dir = store.dataset_dir(&id);
        fs::create_dir_all(dir.as_std_path()).unwrap();
        fs::write(dir.join("stale.txt").as_std_path(), b"old").unwrap();

        let bundle = Bundle::new(vec![BundleFile {
            name: "fresh.json".to_string(),
            bytes: b"new".to_vec(),
        }]);
        store.write_bundle_atomic(&dir, &bundle).unwrap();

        assert_eq!(store.file_names(&dir).unwrap(), vec!["fresh.json"]);
        let leftovers = fs::read_dir(store.cache_root().as_std_path())
            .unwrap()
            .filter(|entry| {
                entry
                    .as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with(TEMP_PREFIX)
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn replacing_a_parent_keeps_nested_datasets() {
        let (_temp, store) = temp_store();
        let parent: DatasetId = "golds".parse().unwrap();
        let dir = store.dataset_dir(&parent);
        fs::create_dir_all(dir.join("batch-01").as_std_path()).unwrap();
        fs::write(dir.join("batch-01").join("a.tsv").as_std_path(), b"a").unwrap();
        fs::write(dir.join("old.csv").as_std_path(), b"old").unwrap();

        let bundle = Bundle::new(vec![BundleFile {
            name: "index.csv".to_string(),
            bytes: b"i".to_vec(),
        }]);
        store.write_bundle_atomic(&dir, &bundle).unwrap();

        assert_eq!(store.file_names(&dir).unwrap(), vec!["index.csv"]);
        assert_eq!(
            fs::read(dir.join("batch-01").join("a.tsv").as_std_path()).unwrap(),
            b"a"
        );
    }

    #[test]
    fn swap_onto_a_regular_file_fails_without_leftovers() {
        let (_temp, store) = temp_store();
        store.ensure_cache_root().unwrap();
        let dest = store.cache_root().join("batch-01");
        fs::write(dest.as_std_path(), b"not a dir").unwrap();

        let bundle = Bundle::new(vec![BundleFile {
            name: "a.tsv".to_string(),
            bytes: b"a".to_vec(),
        }]);
        let err = store.write_bundle_atomic(&dest, &bundle).unwrap_err();

        assert!(matches!(err, GoldError::Filesystem(_)));
        assert_eq!(fs::read(dest.as_std_path()).unwrap(), b"not a dir");
        let entries = fs::read_dir(store.cache_root().as_std_path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn listing_skips_scratch_directories() {
        let (_temp, store) = temp_store();
        let scratch = store.cache_root().join(format!("{TEMP_PREFIX}abc"));
        fs::create_dir_all(scratch.as_std_path()).unwrap();
        fs::write(scratch.join("partial.json").as_std_path(), b"{}").unwrap();

        assert!(store.list_datasets().unwrap().is_empty());
    }
}
