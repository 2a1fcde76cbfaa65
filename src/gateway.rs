use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::auth::Credentials;
use crate::form::{FormEntity, FormMode, Submission};
use crate::models::{ActivityDraft, ContactDraft, JobDraft, SelectOption};
use crate::schema::DATE_FORMAT;
use crate::store::{RecordStore, Row, StoreError, Table};

/// Maps a form draft to the row shape the store persists.
pub trait PersistedShape {
    /// Every persisted field except `id` and `user_id`. Enum pairs become
    /// their bare value; empty optional fields become `null`.
    fn persisted_fields(&self) -> Result<Row, StoreError>;
}

/// Create/update/list calls against a [`RecordStore`], one round trip each.
pub struct Gateway<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> Gateway<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn list<E>(&self, user_id: &str, token: &str) -> Result<Vec<E>, StoreError>
    where
        E: FormEntity + DeserializeOwned,
    {
        let table = E::KIND.table();
        let rows = self
            .store
            .select(token, table, user_id)
            .inspect_err(|e| warn!("Reading {table} failed: {e}"))?;
        rows.into_iter().map(|row| decode(table, row)).collect()
    }

    pub fn create<E>(&self, user_id: &str, token: &str, draft: &E::Draft) -> Result<E, StoreError>
    where
        E: FormEntity + DeserializeOwned,
        E::Draft: PersistedShape,
    {
        let table = E::KIND.table();
        let mut row = draft.persisted_fields()?;
        row.insert("user_id".to_string(), Value::from(user_id));

        let stored = self
            .store
            .insert(token, table, row)
            .inspect_err(|e| warn!("Creating {table} record failed: {e}"))?;
        let record: E = decode(table, stored)?;
        info!(%table, id = record.id(), "Created record");
        Ok(record)
    }

    /// Full-record replace of `id`; fields missing from `draft` are cleared.
    pub fn update<E>(
        &self,
        user_id: &str,
        token: &str,
        draft: &E::Draft,
        id: i64,
    ) -> Result<E, StoreError>
    where
        E: FormEntity + DeserializeOwned,
        E::Draft: PersistedShape,
    {
        let table = E::KIND.table();
        let mut row = draft.persisted_fields()?;
        row.insert("id".to_string(), Value::from(id));
        row.insert("user_id".to_string(), Value::from(user_id));

        let stored = self
            .store
            .upsert(token, table, row)
            .inspect_err(|e| warn!("Updating {table} #{id} failed: {e}"))?;
        let record: E = decode(table, stored)?;
        info!(%table, id, "Updated record");
        Ok(record)
    }

    /// Creates or updates depending on the form mode that produced `submission`.
    /// An edit without a record id is refused.
    pub fn save<E>(
        &self,
        credentials: &Credentials,
        submission: Submission<'_, E::Draft>,
    ) -> Result<E, StoreError>
    where
        E: FormEntity + DeserializeOwned,
        E::Draft: PersistedShape,
    {
        let Credentials { user_id, token } = credentials;
        match (submission.mode, submission.record_id) {
            (FormMode::Add, _) => self.create::<E>(user_id, token, submission.draft),
            (FormMode::Edit, Some(id)) => self.update::<E>(user_id, token, submission.draft, id),
            (FormMode::Edit, None) => Err(StoreError::MissingId {
                table: E::KIND.table(),
            }),
        }
    }
}

fn decode<E: DeserializeOwned>(table: Table, row: Row) -> Result<E, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(|source| StoreError::Decode { table, source })
}

fn text(value: &str) -> Value {
    if value.trim().is_empty() {
        Value::Null
    } else {
        Value::from(value)
    }
}

fn choice(value: &Option<SelectOption>) -> Value {
    value
        .as_ref()
        .map_or(Value::Null, |option| Value::from(option.value.as_str()))
}

fn date(field: &'static str, value: &str) -> Result<Value, StoreError> {
    if value.trim().is_empty() {
        return Ok(Value::Null);
    }
    let parsed = NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| {
        StoreError::InvalidField {
            field,
            reason: format!("'{value}' is not a date ({e})"),
        }
    })?;
    Ok(Value::from(parsed.format(DATE_FORMAT).to_string()))
}

fn row(fields: impl IntoIterator<Item = (&'static str, Value)>) -> Row {
    fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

impl PersistedShape for JobDraft {
    fn persisted_fields(&self) -> Result<Row, StoreError> {
        Ok(row([
            ("title", Value::from(self.title.as_str())),
            ("company", Value::from(self.company.as_str())),
            ("url", text(&self.url)),
            ("source", text(&self.source)),
            ("status", choice(&self.status)),
            ("deadline", date("deadline", &self.deadline)?),
            ("location", text(&self.location)),
            ("description", text(&self.description)),
            ("salary", text(&self.salary)),
        ]))
    }
}

impl PersistedShape for ContactDraft {
    fn persisted_fields(&self) -> Result<Row, StoreError> {
        Ok(row([
            ("name", Value::from(self.name.as_str())),
            ("company", text(&self.company)),
            ("title", text(&self.title)),
            ("email", text(&self.email)),
            ("phone", text(&self.phone)),
            ("location", text(&self.location)),
            ("twitter", text(&self.twitter)),
            ("linkedin", text(&self.linkedin)),
            ("github", text(&self.github)),
            ("personal_website", text(&self.personal_website)),
            ("note", text(&self.note)),
        ]))
    }
}

impl PersistedShape for ActivityDraft {
    fn persisted_fields(&self) -> Result<Row, StoreError> {
        Ok(row([
            ("name", Value::from(self.name.as_str())),
            ("company", text(&self.company)),
            ("job_title", text(&self.job_title)),
            ("start", date("start", &self.start)?),
            ("end", date("end", &self.end)?),
            ("type", choice(&self.activity_type)),
            ("note", text(&self.note)),
            ("done", Value::from(self.done)),
        ]))
    }
}
