use reqwest::Url;
use reqwest::blocking::{Client, Response};
use serde_json::Value;
use tracing::debug;

use crate::store::{require_token, RecordStore, Row, StoreError, Table};

const REST_PREFIX: &str = "rest/v1";
const RETURN_ROWS: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

/// Record store speaking PostgREST conventions (as exposed by Supabase).
#[derive(Debug)]
pub struct RestStore {
    base_url: Url,
    anon_key: String,
    client: Client,
}

impl RestStore {
    pub fn new(base_url: &str, anon_key: &str) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            anon_key: anon_key.to_string(),
            client: Client::new(),
        })
    }

    fn table_url(&self, table: Table) -> Result<Url, StoreError> {
        self.base_url
            .join(&format!("{REST_PREFIX}/{table}"))
            .map_err(|e| StoreError::ReadFailed {
                table,
                reason: e.to_string(),
            })
    }

    fn select_url(&self, table: Table, user_id: &str) -> Result<Url, StoreError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("user_id", &format!("eq.{user_id}"));
        Ok(url)
    }

    fn write(&self, token: &str, table: Table, row: Row, prefer: &str) -> Result<Row, StoreError> {
        require_token(token)?;
        let url = self.table_url(table)?;
        let failed = move |reason: String| StoreError::WriteFailed { table, reason };

        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .header("Prefer", prefer)
            .json(&Value::Object(row))
            .send()
            .map_err(|e| failed(e.to_string()))?;

        let rows: Vec<Row> = read_rows(response).map_err(failed)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| failed("store returned no row".to_string()))
    }
}

fn read_rows(response: Response) -> Result<Vec<Row>, String> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(format!("status {status}: {body}"));
    }
    response.json().map_err(|e| format!("unreadable response: {e}"))
}

impl RecordStore for RestStore {
    fn select(&self, token: &str, table: Table, user_id: &str) -> Result<Vec<Row>, StoreError> {
        require_token(token)?;
        let url = self.select_url(table, user_id)?;
        debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .map_err(|e| StoreError::ReadFailed {
                table,
                reason: e.to_string(),
            })?;
        read_rows(response).map_err(|reason| StoreError::ReadFailed { table, reason })
    }

    fn insert(&self, token: &str, table: Table, row: Row) -> Result<Row, StoreError> {
        self.write(token, table, row, RETURN_ROWS)
    }

    fn upsert(&self, token: &str, table: Table, row: Row) -> Result<Row, StoreError> {
        self.write(token, table, row, MERGE_DUPLICATES)
    }
}
