//! Settings loading from files and environment
//!
//! - Layer priority: defaults < haul.toml < haul.yaml < environment
//! - Single-file loading by extension
//! - Referential overrides reaching the rule sets

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::fs;

use haul_batch::referential::PmfmIds;
use haul_common::{LogFormat, Settings};
use haul_rules::BatchRules;
use haul_units::{SamplingRatioFormat, WeightUnit};
use tempfile::TempDir;

// ============================================================================
// Layers
// ============================================================================

#[test]
fn test_missing_files_give_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::load_from(dir.path(), "HAUL_TEST_MISSING_").unwrap();
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_yaml_overrides_toml() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("haul.toml"),
        r#"
[sampling_ratio]
format = "1/w"
max_decimals = 4

[weight]
display_unit = "g"
"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("haul.yaml"),
        "sampling_ratio:\n  max_decimals: 2\nlog:\n  format: json\n",
    )
    .unwrap();

    let settings = Settings::load_from(dir.path(), "HAUL_TEST_LAYERS_").unwrap();
    assert_eq!(settings.sampling_ratio.format, SamplingRatioFormat::OneOverW);
    assert_eq!(settings.sampling_ratio.max_decimals, 2);
    assert_eq!(settings.weight.display_unit, WeightUnit::Gram);
    assert_eq!(settings.weight.max_decimals, 3);
    assert_eq!(settings.log.format, LogFormat::Json);
    assert_eq!(settings.log.level, "info");
}

#[test]
fn test_environment_overrides_files() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("haul.toml"),
        "[referential.pmfm_ids]\nsize_category = 1174\n",
    )
    .unwrap();
    std::env::set_var("HAUL_TEST_ENV_REFERENTIAL__PMFM_IDS__SIZE_CATEGORY", "2174");
    std::env::set_var("HAUL_TEST_ENV_LOG__LEVEL", "haul_tree=debug");

    let settings = Settings::load_from(dir.path(), "HAUL_TEST_ENV_").unwrap();
    assert_eq!(settings.referential.pmfm_ids.size_category, 2174);
    assert_eq!(settings.referential.pmfm_ids.trawl_size_cat, PmfmIds::default().trawl_size_cat);
    assert_eq!(settings.log.level, "haul_tree=debug");
}

#[test]
fn test_invalid_value_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("haul.toml"), "[weight]\ndisplay_unit = \"stone\"\n").unwrap();
    let err = Settings::load_from(dir.path(), "HAUL_TEST_INVALID_").unwrap_err();
    assert!(err.to_string().starts_with("Configuration error"));
}

// ============================================================================
// Single file
// ============================================================================

#[test]
fn test_from_json_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(
        &path,
        r#"{"referential": {"qualitative_value_ids": {"discard": 9191}}, "weight": {"max_decimals": 1}}"#,
    )
    .unwrap();

    let settings = Settings::from_file(&path).unwrap();
    assert_eq!(settings.referential.qualitative_value_ids.discard, 9191);
    assert_eq!(settings.referential.qualitative_value_ids.landing, 190);
    assert_eq!(settings.weight.max_decimals, 1);
}

#[test]
fn test_referential_reaches_rule_sets() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.yml");
    fs::write(&path, "referential:\n  pmfm_ids:\n    trawl_size_cat: 4418\n").unwrap();

    let settings = Settings::from_file(&path).unwrap();
    let bus = Settings::default().config_bus();
    let rules = BatchRules::new(&bus);
    assert_eq!(rules.get_not_landing_pmfms("pmfm.")[1].value.as_deref(), Some("418"));

    settings.publish(&bus);
    assert_eq!(rules.get_not_landing_pmfms("pmfm.")[1].value.as_deref(), Some("4418"));
}
