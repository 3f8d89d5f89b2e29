use config::{Config, ConfigError, Environment, File as ConfigFile};
use glob::Pattern;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::error;

/// Which host tool answers volume-count and geometry queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// First tool found, FSL before AFNI.
    Auto,
    Fsl,
    Afni,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub image_info_provider: ProviderKind,
    /// Searched before `PATH` when resolving provider executables.
    pub tool_dir: Option<PathBuf>,
    pub fieldmap_dir: String,
    pub functional_dir: String,
    pub functional_suffix: String,
    pub phase_suffixes: Vec<String>,
    pub intended_for_field: String,
    pub shim_field: String,
    pub volume_count_field: String,
    pub task_name_field: String,
    pub task_name_placeholder: String,
    pub preserve_existing_intended_for: bool,
    pub ignore_patterns: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            image_info_provider: ProviderKind::Auto,
            tool_dir: None,
            fieldmap_dir: "fmap".to_string(),
            functional_dir: "func".to_string(),
            functional_suffix: "_bold".to_string(),
            phase_suffixes: vec![
                "_phasediff".to_string(),
                "_phase1".to_string(),
                "_phase2".to_string(),
                "_phase".to_string(),
            ],
            intended_for_field: "IntendedFor".to_string(),
            shim_field: "ShimSetting".to_string(),
            volume_count_field: "NumberOfVolumes".to_string(),
            task_name_field: "TaskName".to_string(),
            task_name_placeholder: "TODO".to_string(),
            preserve_existing_intended_for: true,
            ignore_patterns: vec![
                "**/.heudiconv/**".to_string(),
                "**/sourcedata/**".to_string(),
                "**/derivatives/**".to_string(),
            ],
        }
    }
}

/// `Config.toml` in the working directory (optional), then `BIDS_FIXUP_*` variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("BIDS_FIXUP"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Compile glob ignore patterns, logging and dropping the invalid ones.
pub fn compile_ignore_patterns(globs: &[String]) -> Vec<Pattern> {
    globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_defaults_follow_bids_names() {
        let config = AppConfig::default();
        assert_eq!(config.fieldmap_dir, "fmap");
        assert_eq!(config.intended_for_field, "IntendedFor");
        assert_eq!(config.image_info_provider, ProviderKind::Auto);
        assert!(config.preserve_existing_intended_for);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: AppConfig = Config::builder()
            .add_source(ConfigFile::from_str(
                "image_info_provider = \"afni\"\nfieldmap_dir = \"fieldmaps\"",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.image_info_provider, ProviderKind::Afni);
        assert_eq!(config.fieldmap_dir, "fieldmaps");
        assert_eq!(config.shim_field, "ShimSetting");
    }

    #[test]
    fn test_compile_ignore_patterns_skips_invalid() {
        let patterns = compile_ignore_patterns(&[
            "**/derivatives/**".to_string(),
            "[".to_string(),
        ]);
        assert_eq!(patterns.len(), 1);
        assert!(patterns[0].matches_path(Path::new("/data/derivatives/fmriprep/x.json")));
    }
}
