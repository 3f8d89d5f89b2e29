use crate::error::Error;
use crate::naming;
use std::path::{Path, PathBuf};

/// A metadata sidecar and the image it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    pub metadata_path: PathBuf,
    /// `None` when no `.nii.gz`/`.nii` shares the sidecar's basename.
    pub image_path: Option<PathBuf>,
}

impl Scan {
    /// Pair `metadata_path` with its image on disk.
    pub fn from_metadata(metadata_path: PathBuf) -> Self {
        let image_path = naming::paired_image(&metadata_path);
        Self {
            metadata_path,
            image_path,
        }
    }

    pub fn file_name(&self) -> &str {
        self.metadata_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn image(&self) -> Result<&Path, Error> {
        self.image_path
            .as_deref()
            .ok_or_else(|| Error::MissingPairedImage(self.metadata_path.clone()))
    }
}

/// A scan from the field-map folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldmapScan {
    pub scan: Scan,
    /// Phase variants never start a group, but can still receive one as siblings.
    pub groupable: bool,
}
