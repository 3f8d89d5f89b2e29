#![allow(dead_code)]

use bids_fixup_core::{Error, ImageInfoProvider};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_GEOMETRY: [f64; 6] = [64.0, 64.0, 36.0, 3.0, 3.0, 3.3];

/// Image info keyed by image file name, standing in for FSL/AFNI.
#[derive(Default)]
pub struct StaticProvider {
    pub geometry: HashMap<String, Vec<f64>>,
    pub volumes: HashMap<String, u64>,
}

impl StaticProvider {
    pub fn with_geometry(mut self, image_name: &str, values: &[f64]) -> Self {
        self.geometry.insert(image_name.to_string(), values.to_vec());
        self
    }

    pub fn with_volumes(mut self, image_name: &str, count: u64) -> Self {
        self.volumes.insert(image_name.to_string(), count);
        self
    }
}

fn image_name(image: &Path) -> String {
    image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl ImageInfoProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn volume_count(&self, image: &Path) -> Result<u64, Error> {
        self.volumes
            .get(&image_name(image))
            .copied()
            .ok_or_else(|| Error::ImageInfo {
                path: image.to_path_buf(),
                message: "no volume count configured".to_string(),
            })
    }

    fn dimensions_and_voxel_sizes(&self, image: &Path) -> Result<Vec<f64>, Error> {
        Ok(self
            .geometry
            .get(&image_name(image))
            .cloned()
            .unwrap_or_else(|| DEFAULT_GEOMETRY.to_vec()))
    }
}

/// Write `<dir>/<stem>.json` with `fields` and an empty `<stem>.nii.gz` beside it.
pub fn write_scan(dir: &Path, stem: &str, fields: Value) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let json = dir.join(format!("{}.json", stem));
    let text = serde_json::to_string_pretty(&fields).unwrap();
    fs::write(&json, format!("{}\n", text)).unwrap();
    fs::write(dir.join(format!("{}.nii.gz", stem)), b"").unwrap();
    json
}

/// Like `write_scan` but without the paired image.
pub fn write_sidecar_only(dir: &Path, stem: &str, fields: Value) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let json = dir.join(format!("{}.json", stem));
    fs::write(&json, serde_json::to_string_pretty(&fields).unwrap()).unwrap();
    json
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// The IntendedFor list of a sidecar as strings, or `None` when absent.
pub fn intended_for(path: &Path) -> Option<Vec<String>> {
    read_json(path).get("IntendedFor").map(|v| {
        v.as_array()
            .unwrap()
            .iter()
            .map(|item| item.as_str().unwrap().to_string())
            .collect()
    })
}
