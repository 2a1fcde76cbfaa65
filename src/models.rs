use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::store::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Job,
    Contact,
    Activity,
}

impl EntityKind {
    pub fn table(self) -> Table {
        match self {
            EntityKind::Job => Table::Jobs,
            EntityKind::Contact => Table::Contacts,
            EntityKind::Activity => Table::Activities,
        }
    }
}

/// A `{value, label}` pair as shown by a select control. Only `value` is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// What the form layer may hold for an enumerated field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumInput {
    Plain(String),
    Option(SelectOption),
}

// --- Persisted records ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>, // bare catalog value: "wishlist", "applied", ...
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default, alias = "personalWebsite")]
    pub personal_website: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default, rename = "type")]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub done: bool,
    #[serde(default)]
    pub note: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// --- Form drafts ---
//
// Text fields hold whatever the user typed; an empty string means "unset".
// Dates stay as YYYY-MM-DD text until the gateway maps them.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobDraft {
    pub title: String,
    pub company: String,
    pub url: String,
    pub source: String,
    pub deadline: String,
    pub status: Option<SelectOption>,
    pub description: String,
    pub location: String,
    pub salary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDraft {
    pub name: String,
    pub company: String,
    pub title: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub twitter: String,
    pub linkedin: String,
    pub github: String,
    pub personal_website: String,
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityDraft {
    pub name: String,
    pub company: String,
    pub job_title: String,
    pub activity_type: Option<SelectOption>,
    pub start: String,
    pub end: String,
    pub done: bool,
    pub note: String,
}
