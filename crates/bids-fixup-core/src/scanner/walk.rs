use super::models::{FieldmapScan, Scan};
use crate::config::{compile_ignore_patterns, AppConfig};
use crate::error::Error;
use crate::metadata::MetadataDoc;
use crate::naming;
use glob::Pattern;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use walkdir::{DirEntry, WalkDir};

/// The scans of one session, split the way the passes consume them.
#[derive(Debug, Clone)]
pub struct SessionLayout {
    pub session_path: PathBuf,
    /// IntendedFor entries are relative to this directory.
    pub subject_root: PathBuf,
    pub dataset_root: PathBuf,
    pub functional: Vec<Scan>,
    pub fieldmaps: Vec<FieldmapScan>,
    /// Every scan outside the field-map folder.
    pub others: Vec<Scan>,
}

/// The subject directory for a session path: its parent when the last
/// component is a `ses-` level, otherwise the path itself.
pub fn subject_root_of(session_path: &Path) -> PathBuf {
    let is_session_level = session_path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("ses-"));

    match session_path.parent() {
        Some(parent) if is_session_level => parent.to_path_buf(),
        _ => session_path.to_path_buf(),
    }
}

impl SessionLayout {
    pub fn discover(session_path: &Path, config: &AppConfig) -> Result<Self, Error> {
        if !session_path.is_dir() {
            return Err(Error::InvalidSession(session_path.to_path_buf()));
        }
        let session_path = fs::canonicalize(session_path)?;
        let subject_root = subject_root_of(&session_path);
        let dataset_root = subject_root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| subject_root.clone());

        let ignore_patterns = compile_ignore_patterns(&config.ignore_patterns);

        let functional = list_sidecars(
            &session_path.join(&config.functional_dir),
            &dataset_root,
            &ignore_patterns,
        )
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| naming::scan_stem(n).ends_with(&config.functional_suffix))
            })
            .map(Scan::from_metadata)
            .collect::<Vec<_>>();

        let fieldmaps = list_sidecars(
            &session_path.join(&config.fieldmap_dir),
            &dataset_root,
            &ignore_patterns,
        )
            .into_iter()
            .map(|path| {
                let scan = Scan::from_metadata(path);
                let groupable = !is_phase_fieldmap(&scan, &config.phase_suffixes);
                FieldmapScan { scan, groupable }
            })
            .collect::<Vec<_>>();

        let fieldmap_dir = session_path.join(&config.fieldmap_dir);
        // Modality folders only; sidecars directly in the session folder are not scans.
        let others = WalkDir::new(&session_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.path() != fieldmap_dir.as_path()
                    && !is_ignored(e.path(), &dataset_root, &ignore_patterns)
            })
            .filter_map(|entry| log_walk_error(entry, &session_path))
            .filter(|e| e.depth() >= 2 && is_sidecar(e))
            .map(|e| Scan::from_metadata(e.into_path()))
            .filter(|scan| {
                let tabular =
                    scan.image_path.is_none() && naming::has_tabular_data(&scan.metadata_path);
                if tabular {
                    debug!("{} describes tabular data", scan.metadata_path.display());
                }
                !tabular
            })
            .collect::<Vec<_>>();

        debug!(
            "Session {}: {} functional, {} field maps, {} other scans",
            session_path.display(),
            functional.len(),
            fieldmaps.len(),
            others.len()
        );

        Ok(Self {
            session_path,
            subject_root,
            dataset_root,
            functional,
            fieldmaps,
            others,
        })
    }
}

/// Task metadata documents (any sidecar with a `task-` entity) under `root`.
pub fn find_task_documents(root: &Path, ignore_globs: &[String]) -> Vec<PathBuf> {
    let ignore_patterns = compile_ignore_patterns(ignore_globs);
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored(e.path(), root, &ignore_patterns))
        .filter_map(|entry| log_walk_error(entry, root))
        .filter(is_sidecar)
        .filter(|e| {
            e.file_name()
                .to_str()
                .and_then(naming::task_label)
                .is_some()
        })
        .map(DirEntry::into_path)
        .collect()
}

/// Sorted `*.json` files directly inside `dir`. A missing directory is empty.
fn list_sidecars(dir: &Path, dataset_root: &Path, ignore_patterns: &[Pattern]) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| log_walk_error(entry, dir))
        .filter(is_sidecar)
        .map(DirEntry::into_path)
        .filter(|p| !is_ignored(p, dataset_root, ignore_patterns))
        .collect()
}

fn is_sidecar(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.ends_with(".json") && !n.starts_with('.'))
}

/// Patterns apply below `root` only, so a dataset that itself lives under
/// an ignored name is still processed.
fn is_ignored(path: &Path, root: &Path, ignore_patterns: &[Pattern]) -> bool {
    match path.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => {
            ignore_patterns.iter().any(|p| p.matches_path(relative))
        }
        _ => false,
    }
}

fn log_walk_error(entry: walkdir::Result<DirEntry>, root: &Path) -> Option<DirEntry> {
    match entry {
        Ok(entry) => Some(entry),
        Err(err) => {
            error!("Error reading entry under {}: {}", root.display(), err);
            None
        }
    }
}

/// Phase or derived field maps, by name or by a `P`/`PHASE`/`DERIVED` token in `ImageType`.
fn is_phase_fieldmap(scan: &Scan, phase_suffixes: &[String]) -> bool {
    let stem = naming::scan_stem(scan.file_name());
    if naming::is_phase_variant(stem, phase_suffixes) {
        return true;
    }
    match MetadataDoc::load(&scan.metadata_path) {
        Ok(doc) => match doc.get("ImageType") {
            Some(Value::Array(tokens)) => tokens
                .iter()
                .any(|t| matches!(t.as_str(), Some("P") | Some("PHASE") | Some("DERIVED"))),
            _ => false,
        },
        Err(e) => {
            warn!("{}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Vec<Pattern> {
        compile_ignore_patterns(&AppConfig::default().ignore_patterns)
    }

    #[test]
    fn test_ignore_patterns_match_below_root_only() {
        let root = Path::new("/study/sourcedata/bids");
        assert!(!is_ignored(root, root, &patterns()));
        assert!(!is_ignored(&root.join("sub-01/ses-01/func/x_bold.json"), root, &patterns()));
        assert!(is_ignored(&root.join("derivatives/fmriprep/x.json"), root, &patterns()));
        assert!(is_ignored(&root.join("sourcedata/sub-01/x.json"), root, &patterns()));
    }

    #[test]
    fn test_subject_root_of_session_level() {
        assert_eq!(
            subject_root_of(Path::new("/data/bids/sub-01/ses-pre")),
            PathBuf::from("/data/bids/sub-01")
        );
    }

    #[test]
    fn test_subject_root_of_subject_level() {
        assert_eq!(
            subject_root_of(Path::new("/data/bids/sub-01")),
            PathBuf::from("/data/bids/sub-01")
        );
    }

    #[test]
    fn test_subject_root_of_trailing_slash() {
        assert_eq!(
            subject_root_of(Path::new("/data/bids/sub-01/ses-01/")),
            PathBuf::from("/data/bids/sub-01")
        );
    }
}
