//! Safety checks for generated SQL.
//!
//! Generated statements are matched against configurable deny patterns
//! (case-insensitive regular expressions) before execution. With
//! `read_only` enabled, anything other than a SELECT/WITH statement is
//! rejected as well.

use crate::domain::error::{AppError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SqlGuardRules {
    /// Patterns that must not appear anywhere in a statement
    #[serde(default = "default_deny_patterns")]
    pub deny_patterns: Vec<String>,
    /// Only allow statements that start with SELECT or WITH
    #[serde(default)]
    pub read_only: bool,
}

fn default_deny_patterns() -> Vec<String> {
    vec![
        // SQL Server extended procedures
        r"xp_".to_string(),
        r"drop\s+table".to_string(),
    ]
}

impl Default for SqlGuardRules {
    fn default() -> Self {
        Self {
            deny_patterns: default_deny_patterns(),
            read_only: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub code: String,
    pub message: String,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    pub fn add_error(&mut self, code: &str, message: &str) {
        self.is_valid = false;
        self.errors.push(ValidationError {
            code: code.to_string(),
            message: message.to_string(),
        });
    }
}

pub struct SqlGuard {
    patterns: Vec<(String, Regex)>,
    read_only: bool,
}

impl SqlGuard {
    pub fn from_rules(rules: &SqlGuardRules) -> Result<Self> {
        let patterns = rules
            .deny_patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (p.clone(), re))
                    .map_err(|e| {
                        AppError::ConfigError(format!("Invalid SQL deny pattern '{}': {}", p, e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            patterns,
            read_only: rules.read_only,
        })
    }

    pub fn validate(&self, sql: &str) -> ValidationResult {
        let mut result = ValidationResult::valid();

        for (source, pattern) in &self.patterns {
            if pattern.is_match(sql) {
                warn!("SQL query validation failed for pattern: {}", source);
                result.add_error(
                    "FORBIDDEN_PATTERN",
                    &format!("SQL matches forbidden pattern '{}'", source),
                );
            }
        }

        if self.read_only {
            let head = sql
                .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_uppercase();
            if head != "SELECT" && head != "WITH" {
                warn!("SQL query rejected by read-only guard: {}", head);
                result.add_error(
                    "NOT_READ_ONLY",
                    "Only SELECT statements are allowed",
                );
            }
        }

        result
    }

    pub fn is_safe(&self, sql: &str) -> bool {
        self.validate(sql).is_valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_guard() -> SqlGuard {
        SqlGuard::from_rules(&SqlGuardRules::default()).unwrap()
    }

    #[test]
    fn test_default_allows_select() {
        let guard = default_guard();
        assert!(guard.is_safe("SELECT name FROM customers WHERE id = 1;"));
    }

    #[test]
    fn test_default_blocks_drop_table_any_case() {
        let guard = default_guard();
        let result = guard.validate("select 1; DROP   TABLE orders;");
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.code == "FORBIDDEN_PATTERN"));
        assert!(!guard.is_safe("drop\ttable x"));
    }

    #[test]
    fn test_default_blocks_extended_procedures() {
        let guard = default_guard();
        assert!(!guard.is_safe("EXEC XP_CMDSHELL 'dir'"));
    }

    #[test]
    fn test_default_permits_other_writes() {
        // Only the configured patterns are enforced unless read_only is set.
        let guard = default_guard();
        assert!(guard.is_safe("UPDATE orders SET status = 'x'"));
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let rules = SqlGuardRules {
            read_only: true,
            ..SqlGuardRules::default()
        };
        let guard = SqlGuard::from_rules(&rules).unwrap();

        let result = guard.validate("DELETE FROM orders");
        assert!(result.errors.iter().any(|e| e.code == "NOT_READ_ONLY"));
        assert!(guard.is_safe("WITH t AS (SELECT 1) SELECT * FROM t"));
        assert!(guard.is_safe("  (SELECT 1)"));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let rules = SqlGuardRules {
            deny_patterns: vec!["(".to_string()],
            read_only: false,
        };
        assert!(matches!(
            SqlGuard::from_rules(&rules),
            Err(AppError::ConfigError(_))
        ));
    }
}
