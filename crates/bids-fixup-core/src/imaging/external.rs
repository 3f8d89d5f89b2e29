use super::ImageInfoProvider;
use crate::config::{AppConfig, ProviderKind};
use crate::error::Error;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Locate `program` in `tool_dir`, then on `PATH`.
pub fn find_executable(program: &str, tool_dir: Option<&Path>) -> Option<PathBuf> {
    let path_dirs = env::var_os("PATH")
        .map(|p| env::split_paths(&p).collect::<Vec<_>>())
        .unwrap_or_default();

    tool_dir
        .map(Path::to_path_buf)
        .into_iter()
        .chain(path_dirs)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Run `program <options> <image> <trailing>` and capture stdout.
fn run_tool(
    program: &Path,
    options: &[&str],
    image: &Path,
    trailing: &[&str],
) -> Result<String, Error> {
    debug!(
        "Running {} {:?} {} {:?}",
        program.display(),
        options,
        image.display(),
        trailing
    );
    let output = Command::new(program)
        .args(options)
        .arg(image)
        .args(trailing)
        .output()
        .map_err(|e| Error::ImageInfo {
            path: image.to_path_buf(),
            message: format!("could not run {}: {}", program.display(), e),
        })?;

    if !output.status.success() {
        return Err(Error::ImageInfo {
            path: image.to_path_buf(),
            message: format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn parse_numbers(text: &str, image: &Path) -> Result<Vec<f64>, Error> {
    text.split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| Error::ImageInfo {
                path: image.to_path_buf(),
                message: format!("unexpected tool output '{}'", text.trim()),
            })
        })
        .collect()
}

fn parse_count(text: &str, image: &Path) -> Result<u64, Error> {
    let values = parse_numbers(text, image)?;
    match values.first() {
        Some(v) if *v >= 0.0 => Ok(*v as u64),
        _ => Err(Error::ImageInfo {
            path: image.to_path_buf(),
            message: format!("no volume count in '{}'", text.trim()),
        }),
    }
}

/// FSL: `fslnvols` and `fslval`.
#[derive(Debug, Clone)]
pub struct FslTool {
    fslnvols: PathBuf,
    fslval: PathBuf,
}

impl FslTool {
    pub fn locate(tool_dir: Option<&Path>) -> Option<Self> {
        Some(Self {
            fslnvols: find_executable("fslnvols", tool_dir)?,
            fslval: find_executable("fslval", tool_dir)?,
        })
    }
}

impl ImageInfoProvider for FslTool {
    fn name(&self) -> &str {
        "fsl"
    }

    fn volume_count(&self, image: &Path) -> Result<u64, Error> {
        let out = run_tool(&self.fslnvols, &[], image, &[])?;
        parse_count(&out, image)
    }

    fn dimensions_and_voxel_sizes(&self, image: &Path) -> Result<Vec<f64>, Error> {
        let mut values = Vec::with_capacity(6);
        for key in ["dim1", "dim2", "dim3", "pixdim1", "pixdim2", "pixdim3"] {
            let out = run_tool(&self.fslval, &[], image, &[key])?;
            let parsed = parse_numbers(&out, image)?;
            let value = parsed.first().copied().ok_or_else(|| Error::ImageInfo {
                path: image.to_path_buf(),
                message: format!("fslval {} printed nothing", key),
            })?;
            values.push(value);
        }
        Ok(values)
    }
}

/// AFNI: `3dinfo`.
#[derive(Debug, Clone)]
pub struct AfniTool {
    info: PathBuf,
}

impl AfniTool {
    pub fn locate(tool_dir: Option<&Path>) -> Option<Self> {
        Some(Self {
            info: find_executable("3dinfo", tool_dir)?,
        })
    }
}

impl ImageInfoProvider for AfniTool {
    fn name(&self) -> &str {
        "afni"
    }

    fn volume_count(&self, image: &Path) -> Result<u64, Error> {
        let out = run_tool(&self.info, &["-nv"], image, &[])?;
        parse_count(&out, image)
    }

    fn dimensions_and_voxel_sizes(&self, image: &Path) -> Result<Vec<f64>, Error> {
        let out = run_tool(
            &self.info,
            &["-ni", "-nj", "-nk", "-adi", "-adj", "-adk"],
            image,
            &[],
        )?;
        let values = parse_numbers(&out, image)?;
        if values.len() < 6 {
            return Err(Error::ImageInfo {
                path: image.to_path_buf(),
                message: format!("expected 6 values from 3dinfo, got '{}'", out.trim()),
            });
        }
        Ok(values)
    }
}

/// Pick the image info provider once, at startup.
pub fn select_provider(config: &AppConfig) -> Result<Box<dyn ImageInfoProvider>, Error> {
    let tool_dir = config.tool_dir.as_deref();
    let provider: Option<Box<dyn ImageInfoProvider>> = match config.image_info_provider {
        ProviderKind::Fsl => FslTool::locate(tool_dir).map(|t| Box::new(t) as _),
        ProviderKind::Afni => AfniTool::locate(tool_dir).map(|t| Box::new(t) as _),
        ProviderKind::Auto => FslTool::locate(tool_dir)
            .map(|t| Box::new(t) as Box<dyn ImageInfoProvider>)
            .or_else(|| AfniTool::locate(tool_dir).map(|t| Box::new(t) as _)),
    };

    match provider {
        Some(p) => {
            info!("Using {} for image info", p.name());
            Ok(p)
        }
        None => Err(Error::StartupConfiguration(format!(
            "no image info provider found for '{:?}'; install FSL (fslnvols, fslval) or AFNI (3dinfo), or set tool_dir",
            config.image_info_provider
        ))),
    }
}
