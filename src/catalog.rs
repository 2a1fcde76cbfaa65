use std::collections::HashMap;
use std::sync::LazyLock;

use tracing::debug;

use crate::models::SelectOption;

const JOB_STATUSES: &[(&str, &str)] = &[
    ("wishlist", "Wishlist"),
    ("applied", "Applied"),
    ("interviews", "Interviews"),
    ("offers", "Offers"),
    ("rejected", "Rejected"),
    ("ghosted", "Ghosted"),
];

// "rejected" is listed twice; the catalog keeps the first.
const ACTIVITY_TYPES: &[(&str, &str)] = &[
    ("on site interview", "On Site Interview"),
    ("apply", "Apply"),
    ("follow up", "Follow up"),
    ("prep cover letter", "Prep Cover Letter"),
    ("prep resume", "Prep Resume"),
    ("reach out", "Reach out"),
    ("prep for interview", "Prep For Interview"),
    ("phone interview", "Phone Interview"),
    ("offer received", "Offer received"),
    ("accept offer", "Accept offer"),
    ("decline offer", "Decline offer"),
    ("rejected", "Rejected"),
    ("rejected", "Rejected"),
    ("send thank you", "Send thank you"),
    ("email", "Email"),
    ("meeting", "Meeting"),
    ("phone call", "Phone call"),
    ("get reference", "Get reference"),
    ("send availability", "Send Availability"),
    ("assignment", "Assignment"),
    ("networking event", "Networking event"),
    ("other", "Other"),
    ("application withdrawn", "Application Withdrawn"),
];

static JOB_STATUS_CATALOG: LazyLock<OptionCatalog> =
    LazyLock::new(|| OptionCatalog::new("job status", JOB_STATUSES));

static ACTIVITY_TYPE_CATALOG: LazyLock<OptionCatalog> =
    LazyLock::new(|| OptionCatalog::new("activity type", ACTIVITY_TYPES));

pub fn job_statuses() -> &'static OptionCatalog {
    &JOB_STATUS_CATALOG
}

pub fn activity_types() -> &'static OptionCatalog {
    &ACTIVITY_TYPE_CATALOG
}

/// Ordered list of selectable options with unique values.
#[derive(Debug, Clone)]
pub struct OptionCatalog {
    name: &'static str,
    options: Vec<SelectOption>,
    index: HashMap<String, usize>,
}

impl OptionCatalog {
    pub fn new(name: &'static str, entries: &[(&str, &str)]) -> Self {
        let mut options = Vec::with_capacity(entries.len());
        let mut index = HashMap::with_capacity(entries.len());

        for (value, label) in entries {
            if index.contains_key(*value) {
                debug!("Dropping duplicate {name} option: {value}");
                continue;
            }
            index.insert(value.to_string(), options.len());
            options.push(SelectOption {
                value: value.to_string(),
                label: label.to_string(),
            });
        }

        Self { name, options, index }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn options(&self) -> &[SelectOption] {
        &self.options
    }

    pub fn get(&self, value: &str) -> Option<&SelectOption> {
        self.index.get(value).and_then(|&i| self.options.get(i))
    }

    pub fn label(&self, value: &str) -> Option<&str> {
        self.get(value).map(|o| o.label.as_str())
    }

    pub fn contains(&self, value: &str) -> bool {
        self.index.contains_key(value)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_statuses_in_order() {
        let values: Vec<&str> = job_statuses()
            .options()
            .iter()
            .map(|o| o.value.as_str())
            .collect();
        assert_eq!(
            values,
            vec!["wishlist", "applied", "interviews", "offers", "rejected", "ghosted"]
        );
    }

    #[test]
    fn test_activity_types_deduplicated() {
        let catalog = activity_types();
        assert_eq!(catalog.len(), ACTIVITY_TYPES.len() - 1);
        let rejected = catalog
            .options()
            .iter()
            .filter(|o| o.value == "rejected")
            .count();
        assert_eq!(rejected, 1);
        assert_eq!(catalog.options()[0].value, "on site interview");
        assert_eq!(
            catalog.options().last().map(|o| o.value.as_str()),
            Some("application withdrawn")
        );
    }

    #[test]
    fn test_lookup_by_value() {
        let catalog = activity_types();
        assert_eq!(catalog.label("phone interview"), Some("Phone Interview"));
        assert_eq!(catalog.label("follow up"), Some("Follow up"));
        assert!(catalog.contains("other"));
        assert!(!catalog.contains("Other"));
        assert!(catalog.get("coffee").is_none());
    }

    #[test]
    fn test_first_duplicate_wins() {
        let catalog = OptionCatalog::new("test", &[("a", "First"), ("b", "B"), ("a", "Second")]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.label("a"), Some("First"));
        assert_eq!(catalog.get("b").map(|o| o.label.as_str()), Some("B"));
        assert_eq!(catalog.name(), "test");
    }
}
