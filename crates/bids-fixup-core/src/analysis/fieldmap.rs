use crate::config::AppConfig;
use crate::error::Error;
use crate::imaging::{geometry_signature, ImageInfoProvider};
use crate::metadata::MetadataDoc;
use crate::naming;
use crate::progress::ProgressReporter;
use crate::scanner::{FieldmapScan, Scan};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Acquisition geometry and shim configuration, compared by exact equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Raw comma-joined shim values. Empty when the sidecar has none.
    pub shim: String,
    /// Dimensions and voxel sizes at 3 decimals.
    pub geometry: String,
}

/// An IntendedFor entry that a field map already listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateAssociation {
    pub fieldmap: PathBuf,
    pub entry: String,
}

/// Field maps sharing one acquisition identity and the scans they cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldmapGroup {
    pub acquisition: String,
    pub run: String,
    /// Sidecars that received the list, in listing order.
    pub fieldmaps: Vec<PathBuf>,
    pub intended_for: Vec<String>,
}

#[derive(Debug, Default)]
pub struct AssociationReport {
    pub groups: Vec<FieldmapGroup>,
    pub unassigned_fieldmaps: Vec<PathBuf>,
    pub unmatched_scans: Vec<PathBuf>,
    pub duplicates: Vec<DuplicateAssociation>,
    /// Scans or field maps skipped because of a local failure.
    pub failed: usize,
}

pub fn compute_signature(
    scan: &Scan,
    provider: &dyn ImageInfoProvider,
    shim_field: &str,
) -> Result<Signature, Error> {
    let image = scan.image()?;
    let doc = MetadataDoc::load(&scan.metadata_path)?;
    let shim = doc.read_field(shim_field).unwrap_or_default();
    let geometry = geometry_signature(&provider.dimensions_and_voxel_sizes(image)?);
    Ok(Signature { shim, geometry })
}

/// `image` relative to `root`, with `/` separators.
pub fn relative_entry(image: &Path, root: &Path) -> Option<String> {
    let relative = image.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

/// Signatures computed on first use. A failed computation is logged once and
/// then never matches.
struct SignatureCache<'s> {
    scans: Vec<&'s Scan>,
    slots: Vec<Option<Option<Signature>>>,
    failed: usize,
}

impl<'s> SignatureCache<'s> {
    fn new(scans: Vec<&'s Scan>) -> Self {
        let slots = vec![None; scans.len()];
        Self {
            scans,
            slots,
            failed: 0,
        }
    }

    fn get(&mut self, index: usize, provider: &dyn ImageInfoProvider, shim_field: &str) -> Option<Signature> {
        if self.slots[index].is_none() {
            let computed = match compute_signature(self.scans[index], provider, shim_field) {
                Ok(sig) => Some(sig),
                Err(e) => {
                    let path = self.scans[index].metadata_path.display();
                    if e.is_local() {
                        warn!("Skipping {}: {}", path, e);
                    } else {
                        error!("Skipping {}: {}", path, e);
                    }
                    self.failed += 1;
                    None
                }
            };
            self.slots[index] = Some(computed);
        }
        self.slots[index].clone().flatten()
    }
}

/// Assigns session scans to field maps by geometry and shim equality.
///
/// Matching is first come, first served in listing order: once a scan is
/// claimed by a group no later field map can take it, so surplus field-map
/// sets with identical parameters end up without an IntendedFor list.
pub struct FieldmapAssociator<'a> {
    provider: &'a dyn ImageInfoProvider,
    config: &'a AppConfig,
    subject_root: &'a Path,
}

impl<'a> FieldmapAssociator<'a> {
    pub fn new(
        provider: &'a dyn ImageInfoProvider,
        config: &'a AppConfig,
        subject_root: &'a Path,
    ) -> Self {
        Self {
            provider,
            config,
            subject_root,
        }
    }

    pub fn associate(
        &self,
        fieldmaps: &[FieldmapScan],
        others: &[Scan],
        reporter: &dyn ProgressReporter,
    ) -> AssociationReport {
        let mut report = AssociationReport::default();
        let mut fieldmap_done = vec![false; fieldmaps.len()];
        let mut fieldmap_assigned = vec![false; fieldmaps.len()];
        let mut scan_claimed = vec![false; others.len()];

        let mut fieldmap_sigs = SignatureCache::new(fieldmaps.iter().map(|f| &f.scan).collect());
        let mut scan_sigs = SignatureCache::new(others.iter().collect());
        let shim_field = self.config.shim_field.as_str();

        reporter.on_association_start(fieldmaps.len(), others.len());

        for i in 0..fieldmaps.len() {
            if fieldmap_done[i] || !fieldmaps[i].groupable {
                continue;
            }
            let lead = &fieldmaps[i].scan;
            let Some(reference) = fieldmap_sigs.get(i, self.provider, shim_field) else {
                fieldmap_done[i] = true;
                continue;
            };

            let mut matched = Vec::new();
            for j in 0..others.len() {
                if scan_claimed[j] {
                    continue;
                }
                if scan_sigs.get(j, self.provider, shim_field).as_ref() != Some(&reference) {
                    continue;
                }
                if let Some(entry) = self.intended_for_entry(&others[j]) {
                    matched.push(entry);
                    scan_claimed[j] = true;
                }
            }

            if matched.is_empty() {
                debug!("No scans match {}", lead.metadata_path.display());
                continue;
            }

            let identity = naming::parse_acquisition_and_run(lead.file_name());
            let mut written = Vec::new();

            for k in 0..fieldmaps.len() {
                if fieldmap_done[k] {
                    continue;
                }
                let sibling = &fieldmaps[k].scan;
                if naming::parse_acquisition_and_run(sibling.file_name()) != identity {
                    continue;
                }
                if fieldmap_sigs.get(k, self.provider, shim_field).as_ref() != Some(&reference) {
                    continue;
                }

                match self.write_intended_for(sibling, &matched) {
                    Ok(duplicates) => {
                        report.duplicates.extend(duplicates);
                        written.push(sibling.metadata_path.clone());
                        fieldmap_assigned[k] = true;
                    }
                    Err(e) if e.is_local() => {
                        warn!("{}", e);
                        report.failed += 1;
                    }
                    Err(e) => {
                        error!("{}", e);
                        report.failed += 1;
                    }
                }
                fieldmap_done[k] = true;
            }

            let (acquisition, run) = identity;
            info!(
                "acq-{} run-{}: {} field map(s) intended for {} scan(s)",
                acquisition,
                run,
                written.len(),
                matched.len()
            );
            reporter.on_group_assigned(&acquisition, &run, written.len(), matched.len());
            report.groups.push(FieldmapGroup {
                acquisition,
                run,
                fieldmaps: written,
                intended_for: matched,
            });
        }

        report.failed += fieldmap_sigs.failed + scan_sigs.failed;
        report.unassigned_fieldmaps = fieldmaps
            .iter()
            .zip(&fieldmap_assigned)
            .filter(|(_, assigned)| !**assigned)
            .map(|(f, _)| f.scan.metadata_path.clone())
            .collect();
        report.unmatched_scans = others
            .iter()
            .zip(&scan_claimed)
            .filter(|(_, claimed)| !**claimed)
            .map(|(s, _)| s.metadata_path.clone())
            .collect();

        report
    }

    fn intended_for_entry(&self, scan: &Scan) -> Option<String> {
        let image = scan.image_path.as_deref()?;
        match relative_entry(image, self.subject_root) {
            Some(entry) => Some(entry),
            None => {
                warn!(
                    "{} is outside subject root {}",
                    image.display(),
                    self.subject_root.display()
                );
                None
            }
        }
    }

    fn write_intended_for(
        &self,
        fieldmap: &Scan,
        entries: &[String],
    ) -> Result<Vec<DuplicateAssociation>, Error> {
        let mut doc = MetadataDoc::load(&fieldmap.metadata_path)?;
        let result = doc.write_list_field(
            &self.config.intended_for_field,
            entries,
            self.config.preserve_existing_intended_for,
        );

        for entry in &result.skipped {
            warn!(
                "DuplicateAssociation: {} already lists {}, not adding it again",
                fieldmap.metadata_path.display(),
                entry
            );
        }
        if doc.is_dirty() {
            doc.save()?;
        }

        Ok(result
            .skipped
            .into_iter()
            .map(|entry| DuplicateAssociation {
                fieldmap: fieldmap.metadata_path.clone(),
                entry,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_entry_strips_subject_prefix() {
        assert_eq!(
            relative_entry(
                Path::new("/bids/sub-01/ses-01/func/sub-01_ses-01_task-rest_bold.nii.gz"),
                Path::new("/bids/sub-01"),
            )
            .as_deref(),
            Some("ses-01/func/sub-01_ses-01_task-rest_bold.nii.gz")
        );
    }

    #[test]
    fn test_relative_entry_outside_root() {
        assert_eq!(
            relative_entry(Path::new("/other/func/x.nii.gz"), Path::new("/bids/sub-01")),
            None
        );
    }
}
