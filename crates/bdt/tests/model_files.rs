//! Model loading from disk

use anyhow::Result;
use larreco_bdt::{create_test_model, BdtError, BdtModel};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_model_roundtrip_through_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let model_path = temp_dir.path().join("proton_pion.json");

    let model = create_test_model();
    model.save_json(&model_path)?;

    let loaded = BdtModel::from_json_file(&model_path)?;
    assert_eq!(loaded, model);
    assert_eq!(loaded.model_hash()?, model.model_hash()?);
    assert_eq!(loaded.evaluate(&[20.0, 0.01])?, 0.5);
    Ok(())
}

#[test]
fn test_missing_file_is_a_load_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = BdtModel::from_json_file(temp_dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, BdtError::ModelLoad(_)));
}

#[test]
fn test_structurally_invalid_file_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let model_path = temp_dir.path().join("broken.json");
    fs::write(
        &model_path,
        r#"{
            "variables": ["range", "energy_density"],
            "trees": [{ "nodes": [{ "feature": 0, "threshold": 1.0, "left": 3, "right": 4 }] }]
        }"#,
    )?;

    let err = BdtModel::from_json_file(&model_path).unwrap_err();
    assert!(matches!(err, BdtError::InvalidNodeReference { tree: 0, node: 0 }));
    Ok(())
}

#[test]
fn test_garbage_is_a_load_error() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let model_path = temp_dir.path().join("garbage.json");
    fs::write(&model_path, "not json")?;
    assert!(matches!(
        BdtModel::from_json_file(&model_path),
        Err(BdtError::ModelLoad(_))
    ));
    Ok(())
}
