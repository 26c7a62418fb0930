//! Role-scoped validation rules.
//!
//! A rule file is a JSON document of the form
//!
//! ```json
//! { "rules": [ { "role": "router", "text": "hostname", "regex": "^rtr-\\d+$" } ] }
//! ```
//!
//! The first rule matching a `(role, field)` pair decides; a pair without
//! any rule always passes.

use std::path::Path;

use log::{debug, info, warn};
use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};

/// The inventory value a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleField {
    Hostname,
    IpAddress,
    /// Any field name this tool does not look up.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ValidationRule {
    pub role: String,
    pub field: RuleField,
    pub pattern: Regex,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    role: String,
    text: RuleField,
    regex: String,
}

/// The immutable rule set for one run.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: Vec<ValidationRule>,
}

impl Validator {
    /// Loads and compiles the rule file.  Any problem is a configuration error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read rules from {}: {}", path.display(), e))
        })?;
        let validator = Self::from_json(&raw)?;
        if validator.is_empty() {
            warn!("{} has no validation rules, every value passes", path.display());
        } else {
            info!(
                "Loaded {} validation rules from {}",
                validator.len(),
                path.display()
            );
        }
        Ok(validator)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: RuleFile = serde_json::from_str(raw)
            .map_err(|e| Error::Configuration(format!("invalid rule file: {}", e)))?;

        let rules = file
            .rules
            .into_iter()
            .map(|rule| {
                let pattern = Regex::new(&rule.regex).map_err(|e| {
                    Error::Configuration(format!(
                        "invalid regex for role {}: {}",
                        rule.role, e
                    ))
                })?;
                Ok(ValidationRule {
                    role: rule.role,
                    field: rule.text,
                    pattern,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Checks `value` against the first rule for `(role, field)`.
    pub fn validate(&self, role: &str, field: RuleField, value: &str) -> bool {
        match self
            .rules
            .iter()
            .find(|rule| rule.role == role && rule.field == field)
        {
            Some(rule) => {
                let ok = rule.pattern.is_match(value);
                debug!(
                    "{:?} '{}' for role {} against /{}/: {}",
                    field, value, role, rule.pattern, ok
                );
                ok
            }
            None => true,
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RULES: &str = r#"{
        "rules": [
            { "role": "router", "text": "hostname", "regex": "^rtr-[0-9]+$" },
            { "role": "router", "text": "hostname", "regex": ".*" },
            { "role": "router", "text": "ip_address", "regex": "^10\\." },
            { "role": "switch", "text": "mac_address", "regex": "^$" }
        ]
    }"#;

    #[test]
    fn missing_rule_passes() {
        let validator = Validator::from_json(RULES).unwrap();
        assert!(validator.validate("firewall", RuleField::Hostname, "anything"));
        assert!(validator.validate("switch", RuleField::IpAddress, "not-an-ip"));
        assert!(Validator::default().validate("router", RuleField::Hostname, ""));
    }

    #[test]
    fn first_matching_rule_governs() {
        let validator = Validator::from_json(RULES).unwrap();
        assert!(validator.validate("router", RuleField::Hostname, "rtr-01"));
        // the catch-all second rule is never consulted
        assert!(!validator.validate("router", RuleField::Hostname, "core-01"));
    }

    #[test]
    fn pattern_search_is_unanchored() {
        let validator = Validator::from_json(RULES).unwrap();
        assert!(validator.validate("router", RuleField::IpAddress, "10.0.0.1"));
        assert!(!validator.validate("router", RuleField::IpAddress, "192.0.2.10"));
    }

    #[test]
    fn unknown_fields_are_accepted_but_unused() {
        let validator = Validator::from_json(RULES).unwrap();
        assert_eq!(validator.len(), 4);
        assert!(validator.validate("switch", RuleField::Hostname, "sw-1"));
    }

    #[test]
    fn invalid_regex_is_configuration_error() {
        let raw = r#"{ "rules": [ { "role": "r", "text": "hostname", "regex": "(" } ] }"#;
        assert!(matches!(
            Validator::from_json(raw),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn unparseable_file_is_configuration_error() {
        assert!(matches!(
            Validator::from_json("{ \"rules\": "),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Validator::from_json("{}"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RULES.as_bytes()).unwrap();

        let validator = Validator::load(file.path()).unwrap();
        assert_eq!(validator.len(), 4);
    }

    #[test]
    fn load_accepts_empty_rule_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{ "rules": [] }"#).unwrap();

        let validator = Validator::load(file.path()).unwrap();
        assert!(validator.is_empty());
        assert!(validator.validate("router", RuleField::Hostname, "anything"));
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Validator::load(dir.path().join("rules.json")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
