use crate::analysis::fieldmap::{AssociationReport, FieldmapAssociator};
use crate::analysis::task_names::{self, TaskNameReport};
use crate::analysis::volumes::{self, VolumeReport};
use crate::config::AppConfig;
use crate::error::Error;
use crate::imaging::ImageInfoProvider;
use crate::progress::ProgressReporter;
use crate::scanner::{self, SessionLayout};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct SessionEngine {
    config: AppConfig,
    provider: Box<dyn ImageInfoProvider>,
}

#[derive(Debug)]
pub struct SessionResult {
    pub layout: SessionLayout,
    pub volumes: VolumeReport,
    pub association: AssociationReport,
    pub task_names: TaskNameReport,
    pub volume_duration: Duration,
    pub association_duration: Duration,
    pub task_name_duration: Duration,
}

impl SessionEngine {
    pub fn new(config: AppConfig, provider: Box<dyn ImageInfoProvider>) -> Self {
        Self { config, provider }
    }

    /// Post-process one session:
    /// 1. Annotate functional sidecars with their volume count
    /// 2. Associate field maps with the scans sharing their geometry and shim
    /// 3. Fix placeholder task names under the dataset root
    pub fn run(
        &self,
        session_path: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<SessionResult, Error> {
        let layout = SessionLayout::discover(session_path, &self.config)?;
        info!(
            "Processing {} (subject root {})",
            layout.session_path.display(),
            layout.subject_root.display()
        );

        // Phase 1: volume counts
        let volume_start = Instant::now();
        let volumes = volumes::annotate_volume_counts(
            &layout.functional,
            self.provider.as_ref(),
            &self.config.volume_count_field,
            reporter,
        );
        let volume_duration = volume_start.elapsed();
        reporter.on_volumes_complete(volumes.annotated, volume_duration.as_secs_f64());
        debug!(
            "Volume counts done in {:.2}s: {} annotated, {} unchanged, {} failed",
            volume_duration.as_secs_f64(),
            volumes.annotated,
            volumes.unchanged,
            volumes.failed
        );

        // Phase 2: field maps
        let association_start = Instant::now();
        let associator =
            FieldmapAssociator::new(self.provider.as_ref(), &self.config, &layout.subject_root);
        let association = associator.associate(&layout.fieldmaps, &layout.others, reporter);
        let association_duration = association_start.elapsed();
        reporter.on_association_complete(
            association.groups.len(),
            association_duration.as_secs_f64(),
        );
        debug!(
            "Field map association done in {:.2}s: {} groups, {} unassigned field maps",
            association_duration.as_secs_f64(),
            association.groups.len(),
            association.unassigned_fieldmaps.len()
        );

        // Phase 3: task name placeholders
        let task_name_start = Instant::now();
        reporter.on_task_names_start();
        let documents =
            scanner::find_task_documents(&layout.dataset_root, &self.config.ignore_patterns);
        let task_names = task_names::fix_task_name_placeholders(
            &documents,
            &self.config.task_name_field,
            &self.config.task_name_placeholder,
        );
        let task_name_duration = task_name_start.elapsed();
        reporter.on_task_names_complete(task_names.fixed.len(), task_name_duration.as_secs_f64());

        Ok(SessionResult {
            layout,
            volumes,
            association,
            task_names,
            volume_duration,
            association_duration,
            task_name_duration,
        })
    }
}
