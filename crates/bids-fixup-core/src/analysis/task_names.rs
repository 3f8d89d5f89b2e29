use crate::error::Error;
use crate::metadata::MetadataDoc;
use crate::naming;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskNameReport {
    pub fixed: Vec<PathBuf>,
    pub failed: usize,
}

/// Replace a placeholder task name in each document with its `task-` label.
pub fn fix_task_name_placeholders(
    documents: &[PathBuf],
    field: &str,
    placeholder: &str,
) -> TaskNameReport {
    let mut report = TaskNameReport::default();

    for path in documents {
        match fix_one(path, field, placeholder) {
            Ok(true) => report.fixed.push(path.clone()),
            Ok(false) => {}
            Err(e) if e.is_local() => {
                warn!("{}", e);
                report.failed += 1;
            }
            Err(e) => {
                error!("{}", e);
                report.failed += 1;
            }
        }
    }

    report
}

fn fix_one(path: &Path, field: &str, placeholder: &str) -> Result<bool, Error> {
    let Some(label) = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(naming::task_label)
    else {
        return Ok(false);
    };

    let mut doc = MetadataDoc::load(path)?;
    let is_placeholder = matches!(doc.get(field), Some(Value::String(s)) if s.starts_with(placeholder));
    if !is_placeholder {
        return Ok(false);
    }

    doc.write_scalar_field(field, Value::String(label.clone()));
    doc.save()?;
    debug!("{}: {} = {}", path.display(), field, label);
    Ok(true)
}
