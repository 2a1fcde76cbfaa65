use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::catalog::{activity_types, job_statuses, OptionCatalog};
use crate::models::{
    Activity, ActivityDraft, Contact, ContactDraft, EntityKind, Job, JobDraft, SelectOption,
};
use crate::normalize::select_option_for;
use crate::schema::{
    activity_schema, contact_schema, job_schema, FieldSource, Schema, ValidationErrors,
    ValidationMessages,
};
use crate::store::StoreError;

/// Error key used for failures that do not belong to a single field.
pub const FORM_ERROR_KEY: &str = "form";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Add,
    Edit,
}

impl fmt::Display for FormMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormMode::Add => f.write_str("add"),
            FormMode::Edit => f.write_str("edit"),
        }
    }
}

impl FromStr for FormMode {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(FormMode::Add),
            "edit" => Ok(FormMode::Edit),
            _ => Err(FormError::UnknownMode(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("unknown form mode '{0}' (expected add or edit)")]
    UnknownMode(String),

    #[error("edit form needs an existing record")]
    MissingRecord,

    #[error("add form cannot start from an existing record")]
    UnexpectedRecord,

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("'{value}' is not a valid {field}")]
    UnknownOption { field: String, value: String },
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("validation failed: {0}")]
    Invalid(ValidationErrors),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Mutable form state for one entity kind.
pub trait FormDraft: FieldSource + Default + Clone + fmt::Debug {
    fn set_text(&mut self, field: &str, value: &str) -> Result<(), FormError>;

    fn select(&mut self, field: &str, _value: &str) -> Result<(), FormError> {
        Err(FormError::UnknownField(field.to_string()))
    }

    fn set_flag(&mut self, field: &str, _value: bool) -> Result<(), FormError> {
        Err(FormError::UnknownField(field.to_string()))
    }

    fn flag(&self, _field: &str) -> Option<bool> {
        None
    }
}

/// An entity kind that can be edited through an [`EntityForm`].
pub trait FormEntity: Clone {
    type Draft: FormDraft;

    const KIND: EntityKind;

    fn schema(messages: &ValidationMessages) -> Schema;

    /// Draft pre-filled from a stored record, with enum values turned back
    /// into select-control pairs.
    fn prefill(record: &Self) -> Self::Draft;

    fn id(&self) -> i64;
}

/// What a successful submit hands to the callback.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a, D> {
    pub mode: FormMode,
    pub record_id: Option<i64>,
    pub draft: &'a D,
}

/// Add/Edit controller for one entity: holds the draft, validates it on
/// submit and hands it to the injected callback.
#[derive(Debug, Clone)]
pub struct EntityForm<E: FormEntity> {
    mode: FormMode,
    record_id: Option<i64>,
    draft: E::Draft,
    schema: Schema,
    errors: ValidationErrors,
}

impl<E: FormEntity> EntityForm<E> {
    pub fn add(messages: &ValidationMessages) -> Self {
        Self {
            mode: FormMode::Add,
            record_id: None,
            draft: E::Draft::default(),
            schema: E::schema(messages),
            errors: ValidationErrors::default(),
        }
    }

    pub fn edit(record: &E, messages: &ValidationMessages) -> Self {
        Self {
            mode: FormMode::Edit,
            record_id: Some(record.id()),
            draft: E::prefill(record),
            schema: E::schema(messages),
            errors: ValidationErrors::default(),
        }
    }

    pub fn open(
        mode: FormMode,
        record: Option<&E>,
        messages: &ValidationMessages,
    ) -> Result<Self, FormError> {
        match (mode, record) {
            (FormMode::Add, None) => Ok(Self::add(messages)),
            (FormMode::Add, Some(_)) => Err(FormError::UnexpectedRecord),
            (FormMode::Edit, Some(record)) => Ok(Self::edit(record, messages)),
            (FormMode::Edit, None) => Err(FormError::MissingRecord),
        }
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn record_id(&self) -> Option<i64> {
        self.record_id
    }

    pub fn draft(&self) -> &E::Draft {
        &self.draft
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field)
    }

    pub fn set_text(&mut self, field: &str, value: &str) -> Result<(), FormError> {
        self.draft.set_text(field, value)
    }

    pub fn select(&mut self, field: &str, value: &str) -> Result<(), FormError> {
        self.draft.select(field, value)
    }

    pub fn set_flag(&mut self, field: &str, value: bool) -> Result<(), FormError> {
        self.draft.set_flag(field, value)
    }

    /// Flips a boolean field and returns its new value.
    pub fn toggle(&mut self, field: &str) -> Result<bool, FormError> {
        let current = self
            .draft
            .flag(field)
            .ok_or_else(|| FormError::UnknownField(field.to_string()))?;
        self.draft.set_flag(field, !current)?;
        Ok(!current)
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        self.schema.validate(&self.draft)
    }

    /// Validates the draft and, if it passes, calls `on_submit` exactly once.
    ///
    /// Validation failures and store failures are both recorded in
    /// [`errors`](Self::errors); the form stays usable either way.
    pub fn submit<T, F>(&mut self, on_submit: F) -> Result<T, SubmitError>
    where
        F: FnOnce(Submission<'_, E::Draft>) -> Result<T, StoreError>,
    {
        if let Err(errors) = self.validate() {
            self.errors = errors.clone();
            return Err(SubmitError::Invalid(errors));
        }
        self.errors.clear();

        let submission = Submission {
            mode: self.mode,
            record_id: self.record_id,
            draft: &self.draft,
        };
        match on_submit(submission) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.errors.insert(FORM_ERROR_KEY, err.to_string());
                Err(SubmitError::Store(err))
            }
        }
    }
}

fn text_slot<'a>(slots: &'a mut [(&str, &mut String)], field: &str) -> Option<&'a mut String> {
    slots
        .iter_mut()
        .find(|(name, _)| *name == field)
        .map(|(_, slot)| &mut **slot)
}

fn pick(catalog: &OptionCatalog, field: &str, value: &str) -> Result<SelectOption, FormError> {
    catalog
        .get(value)
        .cloned()
        .ok_or_else(|| FormError::UnknownOption {
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

fn or_empty(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn date_text(value: &Option<chrono::NaiveDate>) -> String {
    value.map(|d| d.to_string()).unwrap_or_default()
}

// --- Job ---

impl FieldSource for JobDraft {
    fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "title" => &self.title,
            "company" => &self.company,
            "url" => &self.url,
            "source" => &self.source,
            "deadline" => &self.deadline,
            "status" => return self.status.as_ref().map(|s| s.value.as_str()),
            "description" => &self.description,
            "location" => &self.location,
            "salary" => &self.salary,
            _ => return None,
        };
        non_empty(value)
    }
}

impl FormDraft for JobDraft {
    fn set_text(&mut self, field: &str, value: &str) -> Result<(), FormError> {
        let mut slots = [
            ("title", &mut self.title),
            ("company", &mut self.company),
            ("url", &mut self.url),
            ("source", &mut self.source),
            ("deadline", &mut self.deadline),
            ("description", &mut self.description),
            ("location", &mut self.location),
            ("salary", &mut self.salary),
        ];
        let slot = text_slot(&mut slots, field)
            .ok_or_else(|| FormError::UnknownField(field.to_string()))?;
        *slot = value.to_string();
        Ok(())
    }

    fn select(&mut self, field: &str, value: &str) -> Result<(), FormError> {
        match field {
            "status" => {
                self.status = Some(pick(job_statuses(), field, value)?);
                Ok(())
            }
            _ => Err(FormError::UnknownField(field.to_string())),
        }
    }
}

impl FormEntity for Job {
    type Draft = JobDraft;

    const KIND: EntityKind = EntityKind::Job;

    fn schema(messages: &ValidationMessages) -> Schema {
        job_schema(messages)
    }

    fn prefill(record: &Self) -> JobDraft {
        JobDraft {
            title: record.title.clone(),
            company: record.company.clone(),
            url: or_empty(&record.url),
            source: or_empty(&record.source),
            deadline: date_text(&record.deadline),
            status: record.status.as_deref().map(select_option_for),
            description: or_empty(&record.description),
            location: or_empty(&record.location),
            salary: or_empty(&record.salary),
        }
    }

    fn id(&self) -> i64 {
        self.id
    }
}

// --- Contact ---

impl FieldSource for ContactDraft {
    fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "name" => &self.name,
            "company" => &self.company,
            "title" => &self.title,
            "email" => &self.email,
            "phone" => &self.phone,
            "location" => &self.location,
            "twitter" => &self.twitter,
            "linkedin" => &self.linkedin,
            "github" => &self.github,
            "personal_website" => &self.personal_website,
            "note" => &self.note,
            _ => return None,
        };
        non_empty(value)
    }
}

impl FormDraft for ContactDraft {
    fn set_text(&mut self, field: &str, value: &str) -> Result<(), FormError> {
        let mut slots = [
            ("name", &mut self.name),
            ("company", &mut self.company),
            ("title", &mut self.title),
            ("email", &mut self.email),
            ("phone", &mut self.phone),
            ("location", &mut self.location),
            ("twitter", &mut self.twitter),
            ("linkedin", &mut self.linkedin),
            ("github", &mut self.github),
            ("personal_website", &mut self.personal_website),
            ("note", &mut self.note),
        ];
        let slot = text_slot(&mut slots, field)
            .ok_or_else(|| FormError::UnknownField(field.to_string()))?;
        *slot = value.to_string();
        Ok(())
    }
}

impl FormEntity for Contact {
    type Draft = ContactDraft;

    const KIND: EntityKind = EntityKind::Contact;

    fn schema(messages: &ValidationMessages) -> Schema {
        contact_schema(messages)
    }

    fn prefill(record: &Self) -> ContactDraft {
        ContactDraft {
            name: record.name.clone(),
            company: or_empty(&record.company),
            title: or_empty(&record.title),
            email: or_empty(&record.email),
            phone: or_empty(&record.phone),
            location: or_empty(&record.location),
            twitter: or_empty(&record.twitter),
            linkedin: or_empty(&record.linkedin),
            github: or_empty(&record.github),
            personal_website: or_empty(&record.personal_website),
            note: or_empty(&record.note),
        }
    }

    fn id(&self) -> i64 {
        self.id
    }
}

// --- Activity ---

impl FieldSource for ActivityDraft {
    fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "name" => &self.name,
            "company" => &self.company,
            "job_title" => &self.job_title,
            "type" => return self.activity_type.as_ref().map(|t| t.value.as_str()),
            "start" => &self.start,
            "end" => &self.end,
            "note" => &self.note,
            _ => return None,
        };
        non_empty(value)
    }
}

impl FormDraft for ActivityDraft {
    fn set_text(&mut self, field: &str, value: &str) -> Result<(), FormError> {
        let mut slots = [
            ("name", &mut self.name),
            ("company", &mut self.company),
            ("job_title", &mut self.job_title),
            ("start", &mut self.start),
            ("end", &mut self.end),
            ("note", &mut self.note),
        ];
        let slot = text_slot(&mut slots, field)
            .ok_or_else(|| FormError::UnknownField(field.to_string()))?;
        *slot = value.to_string();
        Ok(())
    }

    fn select(&mut self, field: &str, value: &str) -> Result<(), FormError> {
        match field {
            "type" => {
                self.activity_type = Some(pick(activity_types(), field, value)?);
                Ok(())
            }
            _ => Err(FormError::UnknownField(field.to_string())),
        }
    }

    fn set_flag(&mut self, field: &str, value: bool) -> Result<(), FormError> {
        match field {
            "done" => {
                self.done = value;
                Ok(())
            }
            _ => Err(FormError::UnknownField(field.to_string())),
        }
    }

    fn flag(&self, field: &str) -> Option<bool> {
        (field == "done").then_some(self.done)
    }
}

impl FormEntity for Activity {
    type Draft = ActivityDraft;

    const KIND: EntityKind = EntityKind::Activity;

    fn schema(messages: &ValidationMessages) -> Schema {
        activity_schema(messages)
    }

    fn prefill(record: &Self) -> ActivityDraft {
        ActivityDraft {
            name: record.name.clone(),
            company: or_empty(&record.company),
            job_title: or_empty(&record.job_title),
            activity_type: record.activity_type.as_deref().map(select_option_for),
            start: date_text(&record.start),
            end: date_text(&record.end),
            done: record.done,
            note: or_empty(&record.note),
        }
    }

    fn id(&self) -> i64 {
        self.id
    }
}
