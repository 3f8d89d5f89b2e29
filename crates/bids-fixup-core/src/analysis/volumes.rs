use crate::error::Error;
use crate::imaging::ImageInfoProvider;
use crate::metadata::MetadataDoc;
use crate::progress::ProgressReporter;
use crate::scanner::Scan;
use serde_json::Value;
use tracing::{debug, error, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VolumeReport {
    /// Sidecars whose count was written or changed.
    pub annotated: usize,
    /// Sidecars that already held the right count.
    pub unchanged: usize,
    pub failed: usize,
}

/// Write the paired image's volume count into every scan's `field`.
///
/// A failure only skips that scan.
pub fn annotate_volume_counts(
    scans: &[Scan],
    provider: &dyn ImageInfoProvider,
    field: &str,
    reporter: &dyn ProgressReporter,
) -> VolumeReport {
    let mut report = VolumeReport::default();
    reporter.on_volumes_start(scans.len());

    for (done, scan) in scans.iter().enumerate() {
        match annotate_one(scan, provider, field) {
            Ok(true) => report.annotated += 1,
            Ok(false) => report.unchanged += 1,
            Err(e) if e.is_local() => {
                warn!("{}", e);
                report.failed += 1;
            }
            Err(e) => {
                error!("{}", e);
                report.failed += 1;
            }
        }
        reporter.on_volumes_progress(done + 1, scans.len());
    }

    report
}

fn annotate_one(scan: &Scan, provider: &dyn ImageInfoProvider, field: &str) -> Result<bool, Error> {
    let image = scan.image()?;
    let mut doc = MetadataDoc::load(&scan.metadata_path)?;
    let count = provider.volume_count(image)?;

    if !doc.write_scalar_field(field, Value::from(count)) {
        return Ok(false);
    }
    doc.save()?;
    debug!("{}: {} = {}", scan.metadata_path.display(), field, count);
    Ok(true)
}
