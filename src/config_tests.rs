use super::*;
use crate::env::MapEnvironment;

fn sample_config() -> BuildConfig {
    default_config(Version::parse("7.3.1").expect("version"))
}

#[test]
fn defaults_match_framework_defaults() {
    let features = FeatureRequest::default();
    assert!(!features.with_cuda);
    assert!(features.with_scalapack);
    assert!(!features.with_fox);
    assert!(features.with_gipaw);
    assert!(!features.with_d3q);
    assert!(!features.with_qmcpack);
    assert_eq!(features.test_suite_nprocs, 1);
    assert!((features.test_suite_threshold - 0.97).abs() < f64::EPSILON);
    assert_eq!(features.test_suite_max_failed, 0);
    assert_eq!(features.test_suite_allow_failures.len(), 5);
}

#[test]
fn minimal_json_fills_in_defaults() {
    let config: BuildConfig =
        serde_json::from_str(r#"{"schema_version": 1, "version": "7.4"}"#).expect("parse");
    assert_eq!(config.features, FeatureRequest::default());
    assert_eq!(config.parallel, 1);
    assert!(!config.toolchain.usempi);
    assert!(config.buildopts.is_empty());
    assert!(validate_config(&config).is_ok());
}

#[test]
fn unknown_feature_keys_are_rejected() {
    let parsed = serde_json::from_str::<BuildConfig>(
        r#"{"schema_version": 1, "version": "7.4", "features": {"with_libxc": true}}"#,
    );
    assert!(parsed.is_err());
}

#[test]
fn threshold_outside_unit_interval_is_invalid() {
    let mut config = sample_config();
    config.features.test_suite_threshold = 1.5;
    let err = validate_config(&config).expect_err("threshold out of range");
    assert!(err.contains("test_suite_threshold"), "{err}");
}

#[test]
fn zero_nprocs_is_invalid() {
    let mut config = sample_config();
    config.features.test_suite_nprocs = 0;
    assert!(validate_config(&config).is_err());
}

#[test]
fn empty_allow_rule_is_invalid() {
    let mut config = sample_config();
    config.features.test_suite_allow_failures.push(String::new());
    let err = validate_config(&config).expect_err("empty rule");
    assert!(err.contains("[5]"), "{err}");
}

#[test]
fn dependency_lookup_ignores_case() {
    let deps = DependencySet::new(["ELPA", "libxc"]);
    assert!(deps.contains("elpa"));
    assert!(deps.contains("LIBXC"));
    assert!(!deps.contains("HDF5"));
}

#[test]
fn detects_dependencies_from_software_roots() {
    let env = MapEnvironment::new([
        ("EBROOTELPA", "/opt/elpa"),
        ("EBROOTHDF5", "  "),
        ("EBROOTLIBXC", "/opt/libxc"),
    ]);
    let deps = DependencySet::detect(&env, KNOWN_DEPENDENCIES);
    assert!(deps.contains("ELPA"));
    assert!(deps.contains("libxc"));
    assert!(!deps.contains("HDF5"));
}

#[test]
fn buildopts_split_with_shell_quoting() {
    let mut config = sample_config();
    config.buildopts = "pw 'ph' \"pp\"".to_string();
    assert_eq!(config.targets().expect("split"), vec!["pw", "ph", "pp"]);

    config.buildopts = "pw 'ph".to_string();
    assert!(config.targets().is_err());
}

#[test]
fn write_then_load_preserves_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested/qe.json");
    let mut config = sample_config();
    config.dependencies.insert("HDF5");
    config.buildopts = "pwall cp".to_string();

    write_config(&path, &config).expect("write");
    let loaded = load_config(&path).expect("load");
    assert_eq!(loaded.version, config.version);
    assert_eq!(loaded.features, config.features);
    assert!(loaded.dependencies.contains("hdf5"));
    assert_eq!(loaded.buildopts, "pwall cp");
}

#[test]
fn load_reports_invalid_ranges_with_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("qe.json");
    std::fs::write(
        &path,
        r#"{"schema_version": 1, "version": "7.4", "parallel": 0}"#,
    )
    .expect("write");
    let err = load_config(&path).expect_err("invalid parallel");
    assert!(format!("{err:#}").contains("parallel must be at least 1"));
}
