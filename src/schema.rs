use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::EntityKind;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]+$").expect("email pattern is valid")
});

/// Read access to the current value of a named form field.
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<&str>;
}

/// Message templates for validation failures.
///
/// Placeholders: `{field}`, `{min}`, `{max}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationMessages {
    pub required: String,
    pub min_length: String,
    pub max_length: String,
    pub email: String,
    pub date: String,
}

impl Default for ValidationMessages {
    fn default() -> Self {
        Self {
            required: "This field is required.".to_string(),
            min_length: "{field} must be at least {min} characters".to_string(),
            max_length: "{field} must be at most {max} characters".to_string(),
            email: "{field} must be a valid email".to_string(),
            date: "{field} must be a date in YYYY-MM-DD form".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    MinLength(usize),
    MaxLength(usize),
    Email,
    Date,
}

#[derive(Debug, Clone)]
struct FieldRules {
    field: &'static str,
    rules: Vec<Rule>,
}

/// Per-field error messages; empty means the input is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0.insert(field.to_string(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Clone)]
pub struct Schema {
    kind: EntityKind,
    fields: Vec<FieldRules>,
    messages: ValidationMessages,
}

impl Schema {
    pub fn new(kind: EntityKind, messages: &ValidationMessages) -> Self {
        Self {
            kind,
            fields: Vec::new(),
            messages: messages.clone(),
        }
    }

    pub fn field(mut self, field: &'static str, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.fields.push(FieldRules {
            field,
            rules: rules.into_iter().collect(),
        });
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.field)
    }

    pub fn validate(&self, source: &dyn FieldSource) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        for entry in &self.fields {
            let value = source
                .field(entry.field)
                .filter(|v| !v.trim().is_empty());
            if let Some(message) = entry
                .rules
                .iter()
                .find_map(|rule| self.check(entry.field, *rule, value))
            {
                errors.insert(entry.field, message);
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn check(&self, field: &str, rule: Rule, value: Option<&str>) -> Option<String> {
        let Some(value) = value else {
            return (rule == Rule::Required).then(|| self.messages.required.clone());
        };

        let failed = match rule {
            Rule::Required => false,
            Rule::MinLength(min) => value.chars().count() < min,
            Rule::MaxLength(max) => value.chars().count() > max,
            Rule::Email => !EMAIL_RE.is_match(value),
            Rule::Date => NaiveDate::parse_from_str(value, DATE_FORMAT).is_err(),
        };
        if !failed {
            return None;
        }

        let template = match rule {
            Rule::Required => &self.messages.required,
            Rule::MinLength(_) => &self.messages.min_length,
            Rule::MaxLength(_) => &self.messages.max_length,
            Rule::Email => &self.messages.email,
            Rule::Date => &self.messages.date,
        };
        Some(render(template, field, rule))
    }
}

fn render(template: &str, field: &str, rule: Rule) -> String {
    let mut out = template.replace("{field}", field);
    match rule {
        Rule::MinLength(n) => out = out.replace("{min}", &n.to_string()),
        Rule::MaxLength(n) => out = out.replace("{max}", &n.to_string()),
        _ => {}
    }
    out
}

// --- Entity schemas ---

pub fn job_schema(messages: &ValidationMessages) -> Schema {
    Schema::new(EntityKind::Job, messages)
        .field("title", [Rule::Required])
        .field("company", [Rule::Required])
        .field("deadline", [Rule::Date])
}

pub fn contact_schema(messages: &ValidationMessages) -> Schema {
    Schema::new(EntityKind::Contact, messages)
        .field("name", [Rule::Required, Rule::MinLength(2), Rule::MaxLength(35)])
        .field("company", [Rule::MaxLength(35)])
        .field("title", [Rule::MaxLength(35)])
        .field("email", [Rule::MaxLength(35), Rule::Email])
}

pub fn activity_schema(messages: &ValidationMessages) -> Schema {
    Schema::new(EntityKind::Activity, messages)
        .field("name", [Rule::Required, Rule::MinLength(2), Rule::MaxLength(35)])
        .field("company", [Rule::MinLength(2), Rule::MaxLength(35)])
        .field("job_title", [Rule::MinLength(2), Rule::MaxLength(35)])
        .field("start", [Rule::Date])
        .field("end", [Rule::Date])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Fields(HashMap<&'static str, &'static str>);

    impl FieldSource for Fields {
        fn field(&self, name: &str) -> Option<&str> {
            self.0.get(name).copied()
        }
    }

    fn fields(pairs: &[(&'static str, &'static str)]) -> Fields {
        Fields(pairs.iter().copied().collect())
    }

    #[test]
    fn test_job_requires_title_and_company() {
        let schema = job_schema(&ValidationMessages::default());
        let errors = schema.validate(&fields(&[("title", "")])).unwrap_err();
        assert_eq!(errors.get("title"), Some("This field is required."));
        assert_eq!(errors.get("company"), Some("This field is required."));
        assert_eq!(errors.len(), 2);

        assert!(schema
            .validate(&fields(&[("title", "Engineer"), ("company", "ACME")]))
            .is_ok());
    }

    #[test]
    fn test_whitespace_counts_as_missing() {
        let schema = job_schema(&ValidationMessages::default());
        let errors = schema
            .validate(&fields(&[("title", "   "), ("company", "ACME")]))
            .unwrap_err();
        assert_eq!(errors.get("title"), Some("This field is required."));
    }

    #[test]
    fn test_contact_length_and_email() {
        let schema = contact_schema(&ValidationMessages::default());
        let errors = schema
            .validate(&fields(&[
                ("name", "J"),
                ("company", "A company name that is far too long to fit"),
                ("email", "not-an-email"),
            ]))
            .unwrap_err();
        assert_eq!(errors.get("name"), Some("name must be at least 2 characters"));
        assert_eq!(errors.get("company"), Some("company must be at most 35 characters"));
        assert_eq!(errors.get("email"), Some("email must be a valid email"));
        assert_eq!(errors.get("title"), None);
    }

    #[test]
    fn test_contact_email_optional() {
        let schema = contact_schema(&ValidationMessages::default());
        assert!(schema.validate(&fields(&[("name", "Jane Doe")])).is_ok());
        assert!(schema
            .validate(&fields(&[("name", "Jane Doe"), ("email", "jane@acme.io")]))
            .is_ok());
    }

    #[test]
    fn test_activity_optional_fields_only_checked_when_present() {
        let schema = activity_schema(&ValidationMessages::default());
        assert!(schema
            .validate(&fields(&[("name", "Apply"), ("company", ""), ("job_title", "")]))
            .is_ok());

        let errors = schema
            .validate(&fields(&[("name", "Apply"), ("company", "A")]))
            .unwrap_err();
        assert_eq!(errors.get("company"), Some("company must be at least 2 characters"));
    }

    #[test]
    fn test_first_failing_rule_wins() {
        let schema = activity_schema(&ValidationMessages::default());
        let errors = schema.validate(&fields(&[])).unwrap_err();
        assert_eq!(errors.get("name"), Some("This field is required."));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_length_counts_characters() {
        let schema = contact_schema(&ValidationMessages::default());
        // 35 two-byte characters
        let name: &'static str = Box::leak("é".repeat(35).into_boxed_str());
        assert!(schema.validate(&fields(&[("name", name)])).is_ok());
    }

    #[test]
    fn test_dates() {
        let schema = activity_schema(&ValidationMessages::default());
        assert!(schema
            .validate(&fields(&[("name", "Apply"), ("start", "2023-01-27")]))
            .is_ok());
        let errors = schema
            .validate(&fields(&[("name", "Apply"), ("end", "01-27-2024")]))
            .unwrap_err();
        assert_eq!(errors.get("end"), Some("end must be a date in YYYY-MM-DD form"));
    }

    #[test]
    fn test_custom_messages() {
        let messages = ValidationMessages {
            required: "Required!".to_string(),
            min_length: "Must be at least {min} characters".to_string(),
            ..ValidationMessages::default()
        };
        let schema = contact_schema(&messages);
        let errors = schema.validate(&fields(&[("company", "x")])).unwrap_err();
        assert_eq!(errors.get("name"), Some("Required!"));

        let errors = schema.validate(&fields(&[("name", "x")])).unwrap_err();
        assert_eq!(errors.get("name"), Some("Must be at least 2 characters"));
    }

    #[test]
    fn test_errors_display() {
        let mut errors = ValidationErrors::default();
        errors.insert("title", "This field is required.");
        errors.insert("company", "This field is required.");
        assert_eq!(
            errors.to_string(),
            "company: This field is required.; title: This field is required."
        );
    }

    #[test]
    fn test_schema_fields() {
        let schema = contact_schema(&ValidationMessages::default());
        let names: Vec<&str> = schema.fields().collect();
        assert_eq!(names, vec!["name", "company", "title", "email"]);
        assert_eq!(schema.kind(), EntityKind::Contact);
    }
}
