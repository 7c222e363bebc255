use super::*;
use crate::correction::RunMode;
use crate::error::OdynError;
use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn create_test_config() -> ExperimentConfig {
    let mut config = ExperimentConfig::default();
    config.experiment.date = toml_date(NaiveDate::from_ymd_opt(2023, 5, 17).unwrap()).unwrap();
    config.experiment.subject = "m12".to_string();
    config.experiment.name = "baseline".to_string();
    config.experiment.first_acq = 1;
    config.experiment.last_acq = 40;
    config.experiment.tiff_stem = "2023-05-17_m12_baseline".to_string();
    config.imaging.frames = 500;
    config.imaging.size_pixels = [512, 512];
    config.imaging.um_per_pixels = [1.1719, 1.1719];
    config.test.first_acq = 3;
    config.test.last_acq = 7;
    config
}

fn write_config(dir: &Path, config: &ExperimentConfig) -> std::path::PathBuf {
    let path = dir.join("odyn_config.toml");
    config.write(&path).unwrap();
    path
}

#[test]
fn test_default_config_validates() {
    assert!(ExperimentConfig::default().validate().is_ok());
}

#[test]
fn test_document_survives_write_and_read() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config();
    let path = write_config(dir.path(), &config);

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("date = 2023-05-17"));
    assert!(text.contains("border_nan = \"copy\""));

    let loaded = ExperimentConfig::read(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(
        loaded.date().unwrap(),
        NaiveDate::from_ymd_opt(2023, 5, 17).unwrap()
    );
}

#[test]
fn test_missing_key_is_structured_error() {
    let config = create_test_config();
    let text = config.to_toml_string().unwrap().replace("subject = \"m12\"\n", "");

    let err = ExperimentConfig::from_toml_str(&text, Path::new("odyn_config.toml")).unwrap_err();
    match err {
        OdynError::ConfigDocument { message, .. } => assert!(message.contains("subject")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_invalid_values_rejected() {
    let mut config = create_test_config();
    config.test.first_acq = 0;
    assert!(matches!(
        config.validate(),
        Err(OdynError::InvalidConfig { ref key, .. }) if key == "test.first_acq"
    ));

    let mut config = create_test_config();
    config.imaging.um_per_pixels = [1.0, 0.0];
    assert!(config.validate().is_err());

    let mut config = create_test_config();
    config.motion_correction.border_nan = BorderNan::Mode("mirror".to_string());
    assert!(config.validate().is_err());

    let mut config = create_test_config();
    config.motion_correction.border_nan = BorderNan::Flag(false);
    assert!(config.validate().is_ok());
}

#[test]
fn test_acquisition_range_by_mode() {
    let config = create_test_config();

    let test = config.acquisition_range(RunMode::Test);
    assert_eq!((test.first, test.last), (3, 7));

    let final_range = config.acquisition_range(RunMode::Final);
    assert_eq!((final_range.first, final_range.last), (1, 40));
}

#[test]
fn test_hash_follows_bytes() {
    let a = ConfigHash::of_bytes(b"[experiment]\nsubject = \"m12\"\n");
    let b = ConfigHash::of_bytes(b"[experiment]\nsubject = \"m12\"\n");
    let c = ConfigHash::of_bytes(b"[experiment]\nsubject =  \"m12\"\n");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.as_str().len(), 64);
}

#[test]
fn test_sync_reloads_once_per_change() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), &create_test_config());
    let mut sync = ConfigSynchronizer::open(&path).unwrap();

    let mut edited = create_test_config();
    edited.experiment.subject = "m13".to_string();
    edited.write(&path).unwrap();

    assert!(sync.is_stale().unwrap());
    assert!(sync.sync().unwrap());
    assert!(!sync.sync().unwrap());
    assert_eq!(sync.reload_count(), 1);
    assert_eq!(sync.document().experiment.subject, "m13");
}

#[test]
fn test_identical_rewrite_does_not_reload() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), &create_test_config());
    let mut sync = ConfigSynchronizer::open(&path).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes).unwrap();

    assert!(!sync.is_stale().unwrap());
    assert!(!sync.sync().unwrap());
    assert_eq!(sync.generation(), 0);
}

#[test]
fn test_formatting_only_edit_reloads() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), &create_test_config());
    let mut sync = ConfigSynchronizer::open(&path).unwrap();
    let before = sync.document();

    let mut text = fs::read_to_string(&path).unwrap();
    text.push_str("\n# reviewed\n");
    fs::write(&path, text).unwrap();

    assert!(sync.sync().unwrap());
    assert_eq!(*sync.document(), *before);
    assert_eq!(sync.generation(), 1);
}

#[test]
fn test_save_records_hash_and_bumps_generation() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), &create_test_config());
    let mut sync = ConfigSynchronizer::open(&path).unwrap();

    let mut updated = (*sync.document()).clone();
    updated.motion_correction.pw_rigid = true;
    sync.save(updated).unwrap();

    assert_eq!(sync.generation(), 1);
    assert!(!sync.is_stale().unwrap());
    assert!(!sync.sync().unwrap());
    assert_eq!(sync.reload_count(), 0);
    assert!(ExperimentConfig::read(&path).unwrap().motion_correction.pw_rigid);
}

#[test]
fn test_invalid_save_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), &create_test_config());
    let mut sync = ConfigSynchronizer::open(&path).unwrap();
    let before = fs::read(&path).unwrap();

    let mut broken = (*sync.document()).clone();
    broken.experiment.last_acq = 0;

    assert!(sync.save(broken).is_err());
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(sync.generation(), 0);
}

#[test]
fn test_save_keeps_hand_edits() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), &create_test_config());
    let mut sync = ConfigSynchronizer::open(&path).unwrap();

    let text = fs::read_to_string(&path)
        .unwrap()
        .replacen("[experiment]\n", "[experiment]\nnotes = \"window cleaned\"\n", 1);
    fs::write(&path, format!("# lab notebook p. 7\n{}", text)).unwrap();
    assert!(sync.sync().unwrap());

    let mut updated = (*sync.document()).clone();
    updated.experiment.subject = "m13".to_string();
    sync.save(updated).unwrap();

    let saved = fs::read_to_string(&path).unwrap();
    assert!(saved.starts_with("# lab notebook p. 7\n"));
    assert!(saved.contains("notes = \"window cleaned\""));
    assert!(saved.contains("subject = \"m13\""));
    assert!(!sync.is_stale().unwrap());
    assert_eq!(ExperimentConfig::read(&path).unwrap().experiment.subject, "m13");
}

#[test]
fn test_invalid_utf8_edit_is_a_document_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), &create_test_config());
    let mut sync = ConfigSynchronizer::open(&path).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(b"# caf\xe9\n");
    fs::write(&path, bytes).unwrap();

    let err = sync.sync().unwrap_err();
    assert!(matches!(err, OdynError::ConfigDocument { .. }));
    assert_eq!(sync.generation(), 0);
    assert!(ExperimentConfig::read(&path).is_err());
}
