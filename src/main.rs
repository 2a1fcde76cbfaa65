mod auth;
mod catalog;
mod config;
mod dashboard;
mod db;
mod form;
mod gateway;
mod models;
mod normalize;
mod rest;
mod schema;
mod store;
mod tui;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use auth::{credentials, default_session_path, Credentials, SessionAuth};
use catalog::{activity_types, job_statuses};
use config::{Config, StoreConfig};
use dashboard::{Dashboard, DashboardEntry};
use form::{EntityForm, FormEntity, FormError, FormMode, SubmitError};
use gateway::{Gateway, PersistedShape};
use models::{Activity, Contact, Job};
use store::RecordStore;

#[derive(Parser)]
#[command(name = "seekr")]
#[command(about = "Job application tracker - jobs, activities and contacts")]
struct Cli {
    /// Path to seekr.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the local database
    Init,

    /// Store the signed-in user and store token
    Login {
        #[arg(long)]
        user_id: String,

        #[arg(long)]
        token: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the most recent jobs, activities and contacts
    Dashboard {
        /// Entries per section
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Browse the dashboard interactively
    Browse,

    /// List the options of a select field
    Options { catalog: CatalogName },

    /// List jobs
    Jobs,

    /// List activities
    Activities,

    /// List contacts
    Contacts,

    /// Add or edit a job
    Job {
        /// add or edit
        mode: String,

        /// Record to edit
        #[arg(long)]
        id: Option<i64>,

        #[command(flatten)]
        fields: JobFields,
    },

    /// Add or edit an activity
    Activity {
        /// add or edit
        mode: String,

        /// Record to edit
        #[arg(long)]
        id: Option<i64>,

        #[command(flatten)]
        fields: ActivityFields,
    },

    /// Add or edit a contact
    Contact {
        /// add or edit
        mode: String,

        /// Record to edit
        #[arg(long)]
        id: Option<i64>,

        #[command(flatten)]
        fields: ContactFields,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CatalogName {
    JobStatus,
    ActivityType,
}

#[derive(Args, Default)]
struct JobFields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    source: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    deadline: Option<String>,
    /// One of: seekr options job-status
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    salary: Option<String>,
}

#[derive(Args, Default)]
struct ActivityFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    job_title: Option<String>,
    /// One of: seekr options activity-type
    #[arg(long = "type")]
    activity_type: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    start: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    end: Option<String>,
    #[arg(long)]
    done: Option<bool>,
    #[arg(long)]
    note: Option<String>,
}

#[derive(Args, Default)]
struct ContactFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    twitter: Option<String>,
    #[arg(long)]
    linkedin: Option<String>,
    #[arg(long)]
    github: Option<String>,
    #[arg(long)]
    personal_website: Option<String>,
    #[arg(long)]
    note: Option<String>,
}

/// Field flags given on the command line; unset flags leave the draft alone.
trait FieldArgs {
    fn texts(&self) -> Vec<(&'static str, Option<&str>)>;

    fn selects(&self) -> Vec<(&'static str, Option<&str>)> {
        Vec::new()
    }

    fn flags(&self) -> Vec<(&'static str, Option<bool>)> {
        Vec::new()
    }
}

impl FieldArgs for JobFields {
    fn texts(&self) -> Vec<(&'static str, Option<&str>)> {
        vec![
            ("title", self.title.as_deref()),
            ("company", self.company.as_deref()),
            ("url", self.url.as_deref()),
            ("source", self.source.as_deref()),
            ("deadline", self.deadline.as_deref()),
            ("description", self.description.as_deref()),
            ("location", self.location.as_deref()),
            ("salary", self.salary.as_deref()),
        ]
    }

    fn selects(&self) -> Vec<(&'static str, Option<&str>)> {
        vec![("status", self.status.as_deref())]
    }
}

impl FieldArgs for ActivityFields {
    fn texts(&self) -> Vec<(&'static str, Option<&str>)> {
        vec![
            ("name", self.name.as_deref()),
            ("company", self.company.as_deref()),
            ("job_title", self.job_title.as_deref()),
            ("start", self.start.as_deref()),
            ("end", self.end.as_deref()),
            ("note", self.note.as_deref()),
        ]
    }

    fn selects(&self) -> Vec<(&'static str, Option<&str>)> {
        vec![("type", self.activity_type.as_deref())]
    }

    fn flags(&self) -> Vec<(&'static str, Option<bool>)> {
        vec![("done", self.done)]
    }
}

impl FieldArgs for ContactFields {
    fn texts(&self) -> Vec<(&'static str, Option<&str>)> {
        vec![
            ("name", self.name.as_deref()),
            ("company", self.company.as_deref()),
            ("title", self.title.as_deref()),
            ("email", self.email.as_deref()),
            ("phone", self.phone.as_deref()),
            ("location", self.location.as_deref()),
            ("twitter", self.twitter.as_deref()),
            ("linkedin", self.linkedin.as_deref()),
            ("github", self.github.as_deref()),
            ("personal_website", self.personal_website.as_deref()),
            ("note", self.note.as_deref()),
        ]
    }
}

fn apply_fields<E: FormEntity>(form: &mut EntityForm<E>, args: &impl FieldArgs) -> Result<(), FormError> {
    for (field, value) in args.texts() {
        if let Some(value) = value {
            form.set_text(field, value)?;
        }
    }
    for (field, value) in args.selects() {
        if let Some(value) = value {
            form.select(field, value)?;
        }
    }
    for (field, value) in args.flags() {
        if let Some(value) = value {
            form.set_flag(field, value)?;
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set up logging")
}

fn load_auth() -> Result<SessionAuth> {
    Ok(SessionAuth::load(&default_session_path())?.with_env_overrides())
}

fn require_credentials(auth: &SessionAuth) -> Result<Credentials> {
    credentials(auth).ok_or_else(|| {
        anyhow!("Not signed in. Run: seekr login --user-id <ID> --token <TOKEN>")
    })
}

/// Opens the form for `mode`, applies the given flags and submits through
/// the gateway. Validation errors are printed per field.
fn run_form<E>(
    config: &Config,
    store: &dyn RecordStore,
    mode: &str,
    id: Option<i64>,
    args: &impl FieldArgs,
) -> Result<()>
where
    E: DashboardEntry,
    E::Draft: PersistedShape,
{
    let mode: FormMode = mode.parse()?;
    let creds = require_credentials(&load_auth()?)?;
    let gateway = Gateway::new(store);

    let record = match id {
        Some(id) => {
            let records: Vec<E> = gateway.list(&creds.user_id, &creds.token)?;
            let record = records
                .into_iter()
                .find(|r| r.id() == id)
                .ok_or_else(|| anyhow!("{:?} #{} not found", E::KIND, id))?;
            Some(record)
        }
        None => None,
    };

    let mut form = EntityForm::open(mode, record.as_ref(), &config.messages)?;
    apply_fields(&mut form, args)?;

    match form.submit(|submission| gateway.save::<E>(&creds, submission)) {
        Ok(saved) => {
            let verb = if mode == FormMode::Add { "Added" } else { "Updated" };
            println!("{} {:?} #{}: {}", verb, E::KIND, saved.id(), saved.summary());
            Ok(())
        }
        Err(SubmitError::Invalid(errors)) => {
            for (field, message) in errors.iter() {
                println!("  {field}: {message}");
            }
            Err(anyhow!("{:?} not saved: {} invalid field(s)", E::KIND, errors.len()))
        }
        Err(SubmitError::Store(e)) => Err(e.into()),
    }
}

fn print_jobs(jobs: &[Job]) {
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }
    println!("{:<6} {:<12} {:<30} {:<20} {:<10}", "ID", "STATUS", "TITLE", "COMPANY", "DEADLINE");
    println!("{}", "-".repeat(82));
    for job in jobs {
        println!(
            "{:<6} {:<12} {:<30} {:<20} {:<10}",
            job.id,
            job.status.as_deref().unwrap_or("-"),
            truncate(&job.title, 28),
            truncate(&job.company, 18),
            job.deadline.map(|d| d.to_string()).unwrap_or_default()
        );
    }
}

fn print_activities(activities: &[Activity]) {
    if activities.is_empty() {
        println!("No activities found.");
        return;
    }
    println!("{:<6} {:<5} {:<20} {:<28} {:<18} {:<10}", "ID", "DONE", "TYPE", "NAME", "COMPANY", "START");
    println!("{}", "-".repeat(92));
    for activity in activities {
        println!(
            "{:<6} {:<5} {:<20} {:<28} {:<18} {:<10}",
            activity.id,
            if activity.done { "yes" } else { "no" },
            truncate(activity.activity_type.as_deref().unwrap_or("-"), 18),
            truncate(&activity.name, 26),
            truncate(activity.company.as_deref().unwrap_or(""), 16),
            activity.start.map(|d| d.to_string()).unwrap_or_default()
        );
    }
}

fn print_contacts(contacts: &[Contact]) {
    if contacts.is_empty() {
        println!("No contacts found.");
        return;
    }
    println!("{:<6} {:<26} {:<20} {:<30}", "ID", "NAME", "COMPANY", "EMAIL");
    println!("{}", "-".repeat(82));
    for contact in contacts {
        println!(
            "{:<6} {:<26} {:<20} {:<30}",
            contact.id,
            truncate(&contact.name, 24),
            truncate(contact.company.as_deref().unwrap_or(""), 18),
            truncate(contact.email.as_deref().unwrap_or(""), 28)
        );
    }
}

fn print_section(heading: &str, lines: Vec<String>) {
    println!("{heading}");
    if lines.is_empty() {
        println!("  (none)");
    }
    for line in lines {
        println!("  {line}");
    }
}

fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => match &config.store {
            StoreConfig::Sqlite { .. } => {
                config.open_store()?;
                println!("Database initialized.");
            }
            StoreConfig::Rest { url, .. } => {
                println!("Using remote store at {url}; nothing to initialize.");
            }
        },
        Commands::Login { user_id, token } => {
            let path = default_session_path();
            SessionAuth::save(&Credentials { user_id: user_id.clone(), token }, &path)?;
            println!("Signed in as {user_id}.");
        }
        Commands::Logout => {
            if SessionAuth::clear(&default_session_path())? {
                println!("Signed out.");
            } else {
                println!("No session to clear.");
            }
        }
        Commands::Dashboard { limit } => {
            let store = config.open_store()?;
            let auth = load_auth()?;
            let dashboard = Dashboard::load(&auth, store.as_ref());
            if dashboard.credentials.is_none() {
                println!("Not signed in. Run: seekr login --user-id <ID> --token <TOKEN>");
                return Ok(());
            }
            print_section("Recent jobs", dashboard.summary_lines::<Job>(limit));
            println!();
            print_section("Recent activities", dashboard.summary_lines::<Activity>(limit));
            println!();
            print_section("Contacts", dashboard.summary_lines::<Contact>(limit));
        }
        Commands::Browse => {
            let store = config.open_store()?;
            let auth = load_auth()?;
            tui::run_browse(&auth, store.as_ref(), &config.messages)?;
        }
        Commands::Options { catalog } => {
            let catalog = match catalog {
                CatalogName::JobStatus => job_statuses(),
                CatalogName::ActivityType => activity_types(),
            };
            println!("{:<24} {:<24}", "VALUE", "LABEL");
            println!("{}", "-".repeat(48));
            for option in catalog.options() {
                println!("{:<24} {:<24}", option.value, option.label);
            }
        }
        Commands::Jobs => {
            let store = config.open_store()?;
            let creds = require_credentials(&load_auth()?)?;
            let mut jobs: Vec<Job> = Gateway::new(store.as_ref()).list(&creds.user_id, &creds.token)?;
            jobs.sort_by_key(|j| j.id);
            print_jobs(&jobs);
        }
        Commands::Activities => {
            let store = config.open_store()?;
            let creds = require_credentials(&load_auth()?)?;
            let mut activities: Vec<Activity> =
                Gateway::new(store.as_ref()).list(&creds.user_id, &creds.token)?;
            activities.sort_by_key(|a| a.id);
            print_activities(&activities);
        }
        Commands::Contacts => {
            let store = config.open_store()?;
            let creds = require_credentials(&load_auth()?)?;
            let mut contacts: Vec<Contact> =
                Gateway::new(store.as_ref()).list(&creds.user_id, &creds.token)?;
            contacts.sort_by_key(|c| c.id);
            print_contacts(&contacts);
        }
        Commands::Job { mode, id, fields } => {
            let store = config.open_store()?;
            run_form::<Job>(&config, store.as_ref(), &mode, id, &fields)?;
        }
        Commands::Activity { mode, id, fields } => {
            let store = config.open_store()?;
            run_form::<Activity>(&config, store.as_ref(), &mode, id, &fields)?;
        }
        Commands::Contact { mode, id, fields } => {
            let store = config.open_store()?;
            run_form::<Contact>(&config, store.as_ref(), &mode, id, &fields)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ValidationMessages;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Engineer", 35), "Engineer");
        assert_eq!(truncate("Senior Backend Engineer", 10), "Senior ...");
        assert_eq!(truncate("Café Société", 7), "Café...");
    }

    #[test]
    fn test_parse_form_command() {
        let cli = Cli::try_parse_from([
            "seekr", "activity", "edit", "--id", "6", "--type", "follow up", "--done", "true",
        ])
        .unwrap();
        match cli.command {
            Commands::Activity { mode, id, fields } => {
                assert_eq!(mode.parse::<FormMode>(), Ok(FormMode::Edit));
                assert_eq!(id, Some(6));
                assert_eq!(fields.activity_type.as_deref(), Some("follow up"));
                assert_eq!(fields.done, Some(true));
            }
            _ => panic!("expected the activity command"),
        }

        let cli = Cli::try_parse_from(["seekr", "--config", "/tmp/s.toml", "options", "job-status"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.toml")));
        assert!(matches!(
            cli.command,
            Commands::Options { catalog: CatalogName::JobStatus }
        ));
    }

    #[test]
    fn test_apply_fields_sets_only_given_flags() {
        let record = Contact {
            id: 3,
            user_id: "user_1".to_string(),
            name: "Jane Doe".to_string(),
            company: Some("ACME".to_string()),
            title: None,
            email: None,
            phone: None,
            location: None,
            twitter: None,
            linkedin: None,
            github: None,
            personal_website: None,
            note: None,
        };
        let mut form = EntityForm::edit(&record, &ValidationMessages::default());
        let args = ContactFields {
            email: Some("jane@acme.io".to_string()),
            ..ContactFields::default()
        };
        apply_fields(&mut form, &args).unwrap();

        assert_eq!(form.draft().name, "Jane Doe");
        assert_eq!(form.draft().company, "ACME");
        assert_eq!(form.draft().email, "jane@acme.io");
    }

    #[test]
    fn test_apply_fields_rejects_unknown_option() {
        let mut form = EntityForm::<Job>::add(&ValidationMessages::default());
        let args = JobFields {
            status: Some("hired".to_string()),
            ..JobFields::default()
        };
        assert!(matches!(
            apply_fields(&mut form, &args),
            Err(FormError::UnknownOption { .. })
        ));
    }
}
