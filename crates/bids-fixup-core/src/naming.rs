//! File-name entity parsing for BIDS scan names.

use std::path::{Path, PathBuf};

pub const NO_ACQUISITION: &str = "NONE";
pub const DEFAULT_RUN: &str = "00";

/// Image extensions tried, in order, when pairing a sidecar with its image.
pub const IMAGE_EXTENSIONS: [&str; 2] = ["nii.gz", "nii"];

/// Value of the last `_<key>-` entity in `file_name`, up to the next `_` or `.`.
fn entity_value<'a>(file_name: &'a str, key: &str) -> Option<&'a str> {
    let marker = format!("_{}-", key);
    let start = file_name.rfind(&marker)? + marker.len();
    let rest = &file_name[start..];
    let end = rest.find(['_', '.']).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Acquisition label and run number of a scan file name.
///
/// Missing entities fall back to [`NO_ACQUISITION`] and [`DEFAULT_RUN`].
pub fn parse_acquisition_and_run(file_name: &str) -> (String, String) {
    let acq = entity_value(file_name, "acq").unwrap_or(NO_ACQUISITION);
    let run = entity_value(file_name, "run").unwrap_or(DEFAULT_RUN);
    (acq.to_string(), run.to_string())
}

/// The `task-<label>` entity. Also matches a leading `task-` (dataset-level files).
pub fn task_label(file_name: &str) -> Option<String> {
    if let Some(label) = entity_value(file_name, "task") {
        return Some(label.to_string());
    }
    let rest = file_name.strip_prefix("task-")?;
    let end = rest.find(['_', '.']).unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

/// File name without the sidecar/image extension (`.json`, `.nii`, `.nii.gz`).
pub fn scan_stem(file_name: &str) -> &str {
    for ext in [".json", ".nii.gz", ".nii"] {
        if let Some(stem) = file_name.strip_suffix(ext) {
            return stem;
        }
    }
    file_name
}

/// Phase-reconstruction field maps, judged by suffix or `part-phase` entity.
pub fn is_phase_variant(stem: &str, phase_suffixes: &[String]) -> bool {
    phase_suffixes.iter().any(|s| stem.ends_with(s.as_str())) || stem.contains("_part-phase")
}

/// The image sharing `metadata_path`'s basename, if one exists on disk.
pub fn paired_image(metadata_path: &Path) -> Option<PathBuf> {
    let file_name = metadata_path.file_name()?.to_str()?;
    let stem = scan_stem(file_name);
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| metadata_path.with_file_name(format!("{}.{}", stem, ext)))
        .find(|candidate| candidate.is_file())
}

/// Whether a `.tsv`/`.tsv.gz` file shares the sidecar's basename, as for
/// events and physiological recordings.
pub fn has_tabular_data(metadata_path: &Path) -> bool {
    let Some(file_name) = metadata_path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let stem = scan_stem(file_name);
    ["tsv.gz", "tsv"]
        .iter()
        .any(|ext| metadata_path.with_file_name(format!("{}.{}", stem, ext)).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_acquisition_and_run() {
        assert_eq!(
            parse_acquisition_and_run("sub-01_acq-highres_run-02_bold.json"),
            ("highres".to_string(), "02".to_string())
        );
        assert_eq!(
            parse_acquisition_and_run("sub-01_bold.json"),
            ("NONE".to_string(), "00".to_string())
        );
    }

    #[test]
    fn test_parse_uses_last_marker_and_stops_at_extension() {
        assert_eq!(
            parse_acquisition_and_run("sub-01_acq-a_acq-b_dir-AP_run-3.json"),
            ("b".to_string(), "3".to_string())
        );
    }

    #[test]
    fn test_task_label() {
        assert_eq!(task_label("sub-01_task-rest_bold.json").as_deref(), Some("rest"));
        assert_eq!(task_label("task-nback_bold.json").as_deref(), Some("nback"));
        assert_eq!(task_label("sub-01_T1w.json"), None);
    }

    #[test]
    fn test_is_phase_variant() {
        let suffixes = vec!["_phasediff".to_string(), "_phase1".to_string()];
        assert!(is_phase_variant("sub-01_phasediff", &suffixes));
        assert!(is_phase_variant("sub-01_part-phase_epi", &suffixes));
        assert!(!is_phase_variant("sub-01_magnitude1", &suffixes));
        assert!(!is_phase_variant("sub-01_dir-AP_epi", &suffixes));
    }

    #[test]
    fn test_paired_image_prefers_compressed() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("sub-01_task-rest_bold.json");
        fs::write(&json, "{}").unwrap();
        assert_eq!(paired_image(&json), None);

        fs::write(dir.path().join("sub-01_task-rest_bold.nii"), b"").unwrap();
        fs::write(dir.path().join("sub-01_task-rest_bold.nii.gz"), b"").unwrap();
        assert_eq!(
            paired_image(&json),
            Some(dir.path().join("sub-01_task-rest_bold.nii.gz"))
        );
    }

    #[test]
    fn test_has_tabular_data() {
        let dir = tempdir().unwrap();
        let physio = dir.path().join("sub-01_task-rest_physio.json");
        fs::write(&physio, "{}").unwrap();
        assert!(!has_tabular_data(&physio));

        fs::write(dir.path().join("sub-01_task-rest_physio.tsv.gz"), b"").unwrap();
        assert!(has_tabular_data(&physio));
    }
}
