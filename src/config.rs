//! Rule file management
//!
//! Loads and validates the JSON rule list and matches focused windows against
//! it. The file is an ordered array of rule objects; the first matching rule
//! wins, so catch-all rules belong at the end.

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::kanata::{FakeKey, FakeKeyAction};
use crate::wm::WindowDescription;

/// Keys a rule object may carry. Anything else is a typo and rejected.
const ALLOWED_KEYS: [&str; 6] = ["class", "title", "layer", "fake_key", "set_mouse", "cmd"];

// ============================================================================
// Rules
// ============================================================================

/// One entry of the rule list.
///
/// `class` and `title` are match conditions; the remaining fields are actions
/// taken when the rule fires. Patterns are pre-compiled to escaped regexes so
/// matching is literal substring containment, case-sensitive.
#[derive(Debug)]
pub struct Rule {
    pub layer: Option<String>,
    pub cmd: Option<String>,
    pub fake_key: Option<FakeKey>,
    pub set_mouse: Option<(i32, i32)>,
    // Original patterns, kept for diagnostics
    pub class_pattern: Option<String>,
    pub title_pattern: Option<String>,
    class_regex: Option<Regex>,
    title_regex: Option<Regex>,
}

impl Rule {
    fn from_value(entry: &Value, rule_no: usize) -> Result<Self> {
        let Some(obj) = entry.as_object() else {
            bail!("Rule {rule_no} must be a JSON object");
        };
        if obj.is_empty() {
            bail!("Rule {rule_no} is empty");
        }
        for key in obj.keys() {
            if !ALLOWED_KEYS.contains(&key.as_str()) {
                bail!(
                    "Rule {rule_no} has unknown key '{key}'. Allowed keys: {}",
                    ALLOWED_KEYS.join(", ")
                );
            }
        }

        let class_pattern = text_field(obj, "class", rule_no)?;
        let title_pattern = text_field(obj, "title", rule_no)?;
        let layer = text_field(obj, "layer", rule_no)?;
        let cmd = text_field(obj, "cmd", rule_no)?;
        let fake_key = fake_key_field(obj, rule_no)?;
        let set_mouse = set_mouse_field(obj, rule_no)?;

        Ok(Self {
            layer,
            cmd,
            fake_key,
            set_mouse,
            class_regex: compile_pattern(class_pattern.as_deref())?,
            title_regex: compile_pattern(title_pattern.as_deref())?,
            class_pattern,
            title_pattern,
        })
    }

    /// Whether this rule applies to the given window.
    #[must_use]
    pub fn matches(&self, win: &WindowDescription) -> bool {
        let class_ok = self
            .class_regex
            .as_ref()
            .is_none_or(|re| re.is_match(&win.class));
        let title_ok = self
            .title_regex
            .as_ref()
            .is_none_or(|re| re.is_match(&win.title));
        class_ok && title_ok
    }
}

/// A missing pattern and the literal `"*"` both match anything. Everything
/// else becomes an escaped regex, so metacharacters in patterns are literal.
fn compile_pattern(pattern: Option<&str>) -> Result<Option<Regex>> {
    match pattern {
        None | Some("*") => Ok(None),
        Some(text) => {
            let re = Regex::new(&regex::escape(text))
                .with_context(|| format!("Failed to compile pattern '{text}'"))?;
            Ok(Some(re))
        }
    }
}

/// A string field that can be disabled with `false` or by omission.
fn text_field(
    obj: &serde_json::Map<String, Value>,
    key: &str,
    rule_no: usize,
) -> Result<Option<String>> {
    match obj.get(key) {
        None | Some(Value::Bool(false)) => Ok(None),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s.clone())),
        Some(Value::String(_)) => {
            bail!("Rule {rule_no}: '{key}' must not be blank (use false to disable)")
        }
        Some(other) => {
            bail!("Rule {rule_no}: '{key}' must be a non-blank string or false, got {other}")
        }
    }
}

fn fake_key_field(obj: &serde_json::Map<String, Value>, rule_no: usize) -> Result<Option<FakeKey>> {
    let Some(value) = obj.get("fake_key") else {
        return Ok(None);
    };
    let parts: Option<Vec<&str>> = value
        .as_array()
        .filter(|a| a.len() == 2)
        .map(|a| a.iter().filter_map(Value::as_str).collect());
    match parts.as_deref() {
        Some([name, action]) => {
            let action: FakeKeyAction = action
                .parse()
                .with_context(|| format!("Rule {rule_no}: invalid 'fake_key'"))?;
            Ok(Some(FakeKey {
                name: (*name).to_string(),
                action,
            }))
        }
        _ => bail!(
            "Rule {rule_no}: 'fake_key' must be a [\"NAME\", \"ACTION\"] pair, got {value}"
        ),
    }
}

fn set_mouse_field(
    obj: &serde_json::Map<String, Value>,
    rule_no: usize,
) -> Result<Option<(i32, i32)>> {
    let Some(value) = obj.get("set_mouse") else {
        return Ok(None);
    };
    let coords: Option<Vec<i32>> = value
        .as_array()
        .filter(|a| a.len() == 2)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_i64)
                .filter_map(|n| i32::try_from(n).ok())
                .collect()
        });
    match coords.as_deref() {
        Some(&[x, y]) => Ok(Some((x, y))),
        _ => bail!("Rule {rule_no}: 'set_mouse' must be an [X, Y] pair of integers, got {value}"),
    }
}

// ============================================================================
// Config
// ============================================================================

/// The ordered rule list, immutable after load.
#[derive(Debug)]
pub struct Config {
    pub rules: Vec<Rule>,
}

impl Config {
    /// Default rule file location: `$XDG_CONFIG_HOME/kanata/apps.json`.
    pub fn default_path() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("kanata")
            .join("apps.json"))
    }

    /// Load and validate the rule file. Every diagnostic names the 1-based
    /// rule index so users can find the offending entry.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {path:?}"))?;
        let root: Value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config: {path:?}"))?;
        let Some(entries) = root.as_array() else {
            bail!("Config must be a JSON array of rule objects: {path:?}");
        };

        let mut rules = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            rules.push(Rule::from_value(entry, i + 1)?);
        }
        Ok(Self { rules })
    }

    /// Every layer a rule references must exist in the running kanata
    /// configuration. Called once at startup, after the first contact with
    /// the server.
    pub fn validate_layers(&self, known: &[String]) -> Result<()> {
        for (i, rule) in self.rules.iter().enumerate() {
            if let Some(layer) = &rule.layer {
                if known.is_empty() {
                    bail!(
                        "kanata did not report any layer names; cannot validate rule {}",
                        i + 1
                    );
                }
                if !known.iter().any(|name| name == layer) {
                    bail!(
                        "Rule {} references unknown layer '{layer}'. Available: [{}]",
                        i + 1,
                        known.join(", ")
                    );
                }
            }
        }
        Ok(())
    }

    /// Find the first rule matching the window, in file order.
    #[must_use]
    pub fn detect_rule(&self, win: &WindowDescription) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matches(win))
    }
}
