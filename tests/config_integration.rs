//! Integration tests for rule file loading and validation
//!
//! These tests go through real files rather than constructing Config structs
//! directly, so parsing and diagnostics are exercised end to end.

use hyprkan::config::Config;
use hyprkan::wm::WindowDescription;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to write a rule file into a temp dir
fn setup_config(json: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("apps.json");
    fs::write(&config_path, json).expect("Failed to write config");
    (temp_dir, config_path)
}

fn win(class: &str, title: &str) -> WindowDescription {
    WindowDescription {
        class: class.to_string(),
        title: title.to_string(),
    }
}

#[test]
fn valid_config_loads_with_all_fields() {
    let (_temp, path) = setup_config(
        r#"[
            {
                "class": "chrome",
                "title": "YouTube",
                "layer": "media",
                "cmd": "notify-send media",
                "fake_key": ["mic", "toggle"],
                "set_mouse": [100, 200]
            },
            {"class": "kitty", "layer": "terminal"},
            {"layer": "base"}
        ]"#,
    );

    let config = Config::load(&path).expect("Failed to load config");
    assert_eq!(config.rules.len(), 3);

    let rule = &config.rules[0];
    assert_eq!(rule.class_pattern.as_deref(), Some("chrome"));
    assert_eq!(rule.title_pattern.as_deref(), Some("YouTube"));
    assert_eq!(rule.layer.as_deref(), Some("media"));
    assert_eq!(rule.cmd.as_deref(), Some("notify-send media"));
    assert_eq!(rule.set_mouse, Some((100, 200)));
    assert!(rule.fake_key.is_some());

    let catch_all = &config.rules[2];
    assert_eq!(catch_all.class_pattern, None);
    assert_eq!(catch_all.title_pattern, None);
}

#[test]
fn missing_file_error_names_the_path() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nope.json");
    let err = Config::load(&path).unwrap_err().to_string();
    assert!(err.contains("nope.json"), "{err}");
}

#[test]
fn non_array_root_is_rejected() {
    let (_temp, path) = setup_config(r#"{"class": "kitty", "layer": "base"}"#);
    assert!(Config::load(&path).is_err());
}

#[test]
fn unknown_key_is_rejected_with_rule_number() {
    let (_temp, path) = setup_config(
        r#"[
            {"class": "kitty", "layer": "base"},
            {"class": "mpv", "layre": "media"}
        ]"#,
    );
    let err = format!("{:#}", Config::load(&path).unwrap_err());
    assert!(err.contains("Rule 2"), "{err}");
    assert!(err.contains("layre"), "{err}");
}

#[test]
fn empty_rule_object_is_rejected() {
    let (_temp, path) = setup_config(r#"[{"class": "kitty", "layer": "base"}, {}]"#);
    let err = format!("{:#}", Config::load(&path).unwrap_err());
    assert!(err.contains("Rule 2"), "{err}");
}

#[test]
fn blank_layer_is_rejected() {
    let (_temp, path) = setup_config(r#"[{"class": "kitty", "layer": ""}]"#);
    assert!(Config::load(&path).is_err());
}

#[test]
fn malformed_fake_key_is_rejected_with_rule_number() {
    let (_temp, path) = setup_config(r#"[{"layer": "base", "fake_key": ["mic"]}]"#);
    let err = format!("{:#}", Config::load(&path).unwrap_err());
    assert!(err.contains("Rule 1"), "{err}");

    let (_temp, path) = setup_config(r#"[{"layer": "base", "fake_key": ["mic", "hold"]}]"#);
    assert!(Config::load(&path).is_err());
}

#[test]
fn malformed_set_mouse_is_rejected() {
    let (_temp, path) = setup_config(r#"[{"layer": "base", "set_mouse": [1.5, 2]}]"#);
    assert!(Config::load(&path).is_err());

    let (_temp, path) = setup_config(r#"[{"layer": "base", "set_mouse": "100,200"}]"#);
    assert!(Config::load(&path).is_err());
}

#[test]
fn loaded_rules_match_in_file_order() {
    let (_temp, path) = setup_config(
        r#"[
            {"class": "chrome", "title": "YouTube", "layer": "media"},
            {"class": "chrome", "layer": "browser"},
            {"layer": "base"}
        ]"#,
    );
    let config = Config::load(&path).unwrap();

    let rule = config
        .detect_rule(&win("chrome", "Cats - YouTube - Chrome"))
        .unwrap();
    assert_eq!(rule.layer.as_deref(), Some("media"));

    let rule = config.detect_rule(&win("chrome", "Docs")).unwrap();
    assert_eq!(rule.layer.as_deref(), Some("browser"));

    let rule = config.detect_rule(&win("anything", "else")).unwrap();
    assert_eq!(rule.layer.as_deref(), Some("base"));
}

#[test]
fn layer_validation_against_live_names() {
    let (_temp, path) = setup_config(r#"[{"layer": "base"}, {"layer": "gaming"}]"#);
    let config = Config::load(&path).unwrap();

    config
        .validate_layers(&["base".to_string(), "gaming".to_string()])
        .expect("all layers known");

    let err = config
        .validate_layers(&["base".to_string()])
        .unwrap_err()
        .to_string();
    assert!(err.contains("Rule 2"), "{err}");
    assert!(err.contains("gaming"), "{err}");
    assert!(err.contains("base"), "{err}"); // lists what is available
}
