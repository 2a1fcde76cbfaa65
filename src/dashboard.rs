use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::auth::{credentials, AuthProvider, Credentials};
use crate::form::FormEntity;
use crate::gateway::Gateway;
use crate::models::{Activity, Contact, Job};
use crate::store::RecordStore;

/// The signed-in user's Jobs, Activities and Contacts, held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dashboard {
    pub credentials: Option<Credentials>,
    pub jobs: Vec<Job>,
    pub activities: Vec<Activity>,
    pub contacts: Vec<Contact>,
}

/// An entity kind the dashboard keeps a collection of.
pub trait DashboardEntry: FormEntity + DeserializeOwned {
    fn entries(dashboard: &Dashboard) -> &[Self];
    fn entries_mut(dashboard: &mut Dashboard) -> &mut Vec<Self>;
    fn summary(&self) -> String;
}

impl Dashboard {
    /// Fetches all three collections once.
    ///
    /// Without a user or token the dashboard is empty; a failed read leaves
    /// only that collection empty.
    pub fn load<S: RecordStore + ?Sized>(auth: &dyn AuthProvider, store: &S) -> Self {
        let Some(creds) = credentials(auth) else {
            info!("No signed-in user; rendering an empty dashboard");
            return Self::default();
        };

        let gateway = Gateway::new(store);
        let mut dashboard = Self {
            jobs: fetch(&gateway, &creds),
            activities: fetch(&gateway, &creds),
            contacts: fetch(&gateway, &creds),
            credentials: Some(creds),
        };
        dashboard.jobs.sort_by_key(|j| j.id);
        dashboard.activities.sort_by_key(|a| a.id);
        dashboard.contacts.sort_by_key(|c| c.id);
        dashboard
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty() && self.activities.is_empty() && self.contacts.is_empty()
    }

    pub fn entries<E: DashboardEntry>(&self) -> &[E] {
        E::entries(self)
    }

    pub fn find<E: DashboardEntry>(&self, id: i64) -> Option<&E> {
        E::entries(self).iter().find(|e| e.id() == id)
    }

    /// Applies a just-written record locally: replaces the entry with the
    /// same id, or appends it.
    pub fn patch<E: DashboardEntry>(&mut self, record: E) {
        let entries = E::entries_mut(self);
        match entries.iter_mut().find(|e| e.id() == record.id()) {
            Some(slot) => *slot = record,
            None => entries.push(record),
        }
    }

    /// Summary lines for the `limit` newest entries of a collection.
    pub fn summary_lines<E: DashboardEntry>(&self, limit: usize) -> Vec<String> {
        let mut newest: Vec<&E> = E::entries(self).iter().collect();
        newest.sort_by_key(|e| std::cmp::Reverse(e.id()));
        newest.into_iter().take(limit).map(E::summary).collect()
    }
}

fn fetch<S, E>(gateway: &Gateway<'_, S>, creds: &Credentials) -> Vec<E>
where
    S: RecordStore + ?Sized,
    E: DashboardEntry,
{
    match gateway.list::<E>(&creds.user_id, &creds.token) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Showing no {} entries: {e}", E::KIND.table());
            Vec::new()
        }
    }
}

fn with_company(head: &str, company: Option<&str>) -> String {
    match company {
        Some(company) if !company.is_empty() => format!("{head} - {company}"),
        _ => head.to_string(),
    }
}

impl DashboardEntry for Job {
    fn entries(dashboard: &Dashboard) -> &[Self] {
        &dashboard.jobs
    }

    fn entries_mut(dashboard: &mut Dashboard) -> &mut Vec<Self> {
        &mut dashboard.jobs
    }

    fn summary(&self) -> String {
        with_company(&self.title, Some(&self.company))
    }
}

impl DashboardEntry for Activity {
    fn entries(dashboard: &Dashboard) -> &[Self] {
        &dashboard.activities
    }

    fn entries_mut(dashboard: &mut Dashboard) -> &mut Vec<Self> {
        &mut dashboard.activities
    }

    fn summary(&self) -> String {
        with_company(&self.name, self.company.as_deref())
    }
}

impl DashboardEntry for Contact {
    fn entries(dashboard: &Dashboard) -> &[Self] {
        &dashboard.contacts
    }

    fn entries_mut(dashboard: &mut Dashboard) -> &mut Vec<Self> {
        &mut dashboard.contacts
    }

    fn summary(&self) -> String {
        with_company(&self.name, self.company.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionAuth;
    use crate::db::SqliteStore;
    use crate::models::{ContactDraft, JobDraft};
    use crate::store::{Row, StoreError, Table};

    fn signed_in() -> SessionAuth {
        SessionAuth::new(Some(Credentials {
            user_id: "user_1".to_string(),
            token: "jwt".to_string(),
        }))
    }

    fn job(id: i64, title: &str) -> Job {
        Job {
            id,
            user_id: "user_1".to_string(),
            title: title.to_string(),
            company: "ACME".to_string(),
            url: None,
            source: None,
            deadline: None,
            status: None,
            description: None,
            location: None,
            salary: None,
        }
    }

    /// Fails every read of one table.
    struct FlakyStore {
        inner: SqliteStore,
        broken: Table,
    }

    impl RecordStore for FlakyStore {
        fn select(&self, token: &str, table: Table, user_id: &str) -> Result<Vec<Row>, StoreError> {
            if table == self.broken {
                return Err(StoreError::ReadFailed {
                    table,
                    reason: "connection reset".to_string(),
                });
            }
            self.inner.select(token, table, user_id)
        }

        fn insert(&self, token: &str, table: Table, row: Row) -> Result<Row, StoreError> {
            self.inner.insert(token, table, row)
        }

        fn upsert(&self, token: &str, table: Table, row: Row) -> Result<Row, StoreError> {
            self.inner.upsert(token, table, row)
        }
    }

    #[test]
    fn test_absent_auth_gives_empty_dashboard() {
        let store = SqliteStore::open_in_memory().unwrap();
        let gateway = Gateway::new(&store);
        let draft = JobDraft {
            title: "Engineer".to_string(),
            company: "ACME".to_string(),
            ..JobDraft::default()
        };
        gateway.create::<Job>("user_1", "jwt", &draft).unwrap();

        let dashboard = Dashboard::load(&SessionAuth::default(), &store);
        assert!(dashboard.is_empty());
        assert_eq!(dashboard.credentials, None);

        let no_token = SessionAuth::new(Some(Credentials {
            user_id: "user_1".to_string(),
            token: String::new(),
        }));
        assert!(Dashboard::load(&no_token, &store).is_empty());
    }

    #[test]
    fn test_load_only_current_users_records() {
        let store = SqliteStore::open_in_memory().unwrap();
        let gateway = Gateway::new(&store);
        let mine = ContactDraft {
            name: "Jane Doe".to_string(),
            company: "ACME".to_string(),
            ..ContactDraft::default()
        };
        let theirs = ContactDraft {
            name: "Joe Bloggs".to_string(),
            ..ContactDraft::default()
        };
        gateway.create::<Contact>("user_1", "jwt", &mine).unwrap();
        gateway.create::<Contact>("user_2", "jwt", &theirs).unwrap();

        let dashboard = Dashboard::load(&signed_in(), &store);
        assert_eq!(dashboard.contacts.len(), 1);
        assert_eq!(dashboard.contacts[0].name, "Jane Doe");
        assert!(dashboard.jobs.is_empty());
        assert_eq!(dashboard.summary_lines::<Contact>(5), vec!["Jane Doe - ACME"]);
    }

    #[test]
    fn test_failed_read_leaves_other_collections() {
        let store = FlakyStore {
            inner: SqliteStore::open_in_memory().unwrap(),
            broken: Table::Activities,
        };
        let gateway = Gateway::new(&store);
        let draft = JobDraft {
            title: "Engineer".to_string(),
            company: "ACME".to_string(),
            ..JobDraft::default()
        };
        gateway.create::<Job>("user_1", "jwt", &draft).unwrap();

        let dashboard = Dashboard::load(&signed_in(), &store);
        assert_eq!(dashboard.jobs.len(), 1);
        assert!(dashboard.activities.is_empty());
    }

    #[test]
    fn test_patch_replaces_matching_id() {
        let mut dashboard = Dashboard {
            jobs: vec![job(6, "First"), job(13, "Second"), job(21, "Third")],
            ..Dashboard::default()
        };

        dashboard.patch(job(13, "Second, revised"));
        let titles: Vec<&str> = dashboard.jobs.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second, revised", "Third"]);

        dashboard.patch(job(30, "Fourth"));
        assert_eq!(dashboard.jobs.len(), 4);
        assert_eq!(dashboard.find::<Job>(30).map(|j| j.title.as_str()), Some("Fourth"));
    }

    #[test]
    fn test_summary_lines_newest_first() {
        let mut dashboard = Dashboard::default();
        for id in 1..=7 {
            dashboard.patch(job(id, &format!("Job {id}")));
        }
        dashboard.patch(Activity {
            id: 1,
            user_id: "user_1".to_string(),
            name: "Apply".to_string(),
            company: None,
            job_title: None,
            activity_type: None,
            start: None,
            end: None,
            done: false,
            note: None,
        });

        let lines = dashboard.summary_lines::<Job>(5);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "Job 7 - ACME");
        assert_eq!(lines[4], "Job 3 - ACME");
        assert_eq!(dashboard.summary_lines::<Activity>(5), vec!["Apply"]);
        assert_eq!(dashboard.entries::<Activity>().len(), 1);
    }
}
