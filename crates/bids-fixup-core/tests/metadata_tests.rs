use bids_fixup_core::metadata::MetadataDoc;
use bids_fixup_core::Error;
use serde_json::json;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_list_field_created_at_end() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sub-01_dir-AP_epi.json");
    fs::write(&path, "{\n  \"PhaseEncodingDirection\": \"j-\",\n  \"TotalReadoutTime\": 0.05\n}\n")?;

    let mut doc = MetadataDoc::load(&path)?;
    let result = doc.write_list_field(
        "IntendedFor",
        &["func/sub-01_task-rest_bold.nii.gz".to_string()],
        true,
    );
    assert_eq!(result.added.len(), 1);
    doc.save()?;

    assert_eq!(
        fs::read_to_string(&path)?,
        "{\n  \"PhaseEncodingDirection\": \"j-\",\n  \"TotalReadoutTime\": 0.05,\n  \"IntendedFor\": [\n    \"func/sub-01_task-rest_bold.nii.gz\"\n  ]\n}\n"
    );
    Ok(())
}

#[test]
fn test_list_field_appends_in_place() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sub-01_dir-AP_epi.json");
    fs::write(
        &path,
        "{\n\t\"IntendedFor\": [\n\t\t\"func/a.nii.gz\"\n\t],\n\t\"TotalReadoutTime\": 0.05\n}",
    )?;

    let mut doc = MetadataDoc::load(&path)?;
    let result = doc.write_list_field(
        "IntendedFor",
        &["func/a.nii.gz".to_string(), "func/b.nii.gz".to_string()],
        true,
    );
    assert_eq!(result.skipped, vec!["func/a.nii.gz".to_string()]);
    doc.save()?;

    assert_eq!(
        fs::read_to_string(&path)?,
        "{\n\t\"IntendedFor\": [\n\t\t\"func/a.nii.gz\",\n\t\t\"func/b.nii.gz\"\n\t],\n\t\"TotalReadoutTime\": 0.05\n}"
    );
    Ok(())
}

#[test]
fn test_duplicate_check_is_exact() {
    let mut doc = MetadataDoc::parse(
        std::path::Path::new("x.json"),
        r#"{"IntendedFor": ["ses-01/func/sub-01_task-rest_run-1_bold.nii.gz"]}"#,
    )
    .unwrap();
    // A substring of an existing entry is still a new entry.
    let result = doc.write_list_field("IntendedFor", &["func/sub-01_task-rest_run-1_bold.nii.gz".to_string()], true);
    assert!(result.skipped.is_empty());
    assert_eq!(result.added.len(), 1);
}

#[test]
fn test_scalar_field_inserted_and_replaced() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sub-01_task-rest_bold.json");
    fs::write(&path, "{\n  \"TaskName\": \"rest\"\n}\n")?;

    let mut doc = MetadataDoc::load(&path)?;
    assert!(doc.write_scalar_field("NumberOfVolumes", json!(120)));
    doc.save()?;
    let mut doc = MetadataDoc::load(&path)?;
    assert!(doc.write_scalar_field("NumberOfVolumes", json!(145)));
    doc.save()?;

    assert_eq!(
        fs::read_to_string(&path)?,
        "{\n  \"TaskName\": \"rest\",\n  \"NumberOfVolumes\": 145\n}\n"
    );
    Ok(())
}

#[test]
fn test_invalid_document_left_untouched() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "\"just a string\"").unwrap();

    let err = MetadataDoc::load(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidDocument { .. }));
    assert!(err.is_local());
    assert_eq!(fs::read_to_string(&path).unwrap(), "\"just a string\"");
}

#[test]
fn test_save_leaves_no_scratch_files() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sub-01_T1w.json");
    fs::write(&path, "{}")?;

    let mut doc = MetadataDoc::load(&path)?;
    doc.write_scalar_field("Modality", json!("MR"));
    doc.save()?;

    let entries: Vec<_> = fs::read_dir(dir.path())?.collect::<Result<_, _>>()?;
    assert_eq!(entries.len(), 1);
    assert_eq!(fs::read_to_string(&path)?, "{\n  \"Modality\": \"MR\"\n}");
    Ok(())
}
