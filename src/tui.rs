use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};
use std::io::stdout;

use crate::auth::AuthProvider;
use crate::catalog::{activity_types, job_statuses};
use crate::dashboard::{Dashboard, DashboardEntry};
use crate::form::{EntityForm, FormError};
use crate::gateway::{Gateway, PersistedShape};
use crate::models::{Activity, Contact, Job};
use crate::normalize::capitalize_words;
use crate::schema::ValidationMessages;
use crate::store::RecordStore;
use crate::truncate;

const WRAP_WIDTH: usize = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Jobs,
    Activities,
    Contacts,
}

impl Tab {
    const ALL: [Tab; 3] = [Tab::Jobs, Tab::Activities, Tab::Contacts];

    fn title(self) -> &'static str {
        match self {
            Tab::Jobs => "Jobs",
            Tab::Activities => "Activities",
            Tab::Contacts => "Contacts",
        }
    }

    fn index(self) -> usize {
        match self {
            Tab::Jobs => 0,
            Tab::Activities => 1,
            Tab::Contacts => 2,
        }
    }

    fn next(self) -> Self {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    fn prev(self) -> Self {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

/// How an entity shows up in the browser.
trait Browsable: DashboardEntry {
    fn list_line(&self) -> String;
    fn detail(&self) -> Vec<Line<'static>>;
}

struct AppState {
    dashboard: Dashboard,
    messages: ValidationMessages,
    tab: Tab,
    selected: usize,
    scroll_offset: u16,
    status: Option<String>,
}

impl AppState {
    fn new(dashboard: Dashboard, messages: ValidationMessages) -> Self {
        Self {
            dashboard,
            messages,
            tab: Tab::Jobs,
            selected: 0,
            scroll_offset: 0,
            status: None,
        }
    }

    fn len(&self) -> usize {
        match self.tab {
            Tab::Jobs => self.dashboard.jobs.len(),
            Tab::Activities => self.dashboard.activities.len(),
            Tab::Contacts => self.dashboard.contacts.len(),
        }
    }

    fn current<E: DashboardEntry>(&self) -> Option<&E> {
        self.dashboard.entries::<E>().get(self.selected)
    }

    fn switch_tab(&mut self, tab: Tab) {
        if self.tab != tab {
            self.tab = tab;
            self.selected = 0;
            self.scroll_offset = 0;
        }
    }

    fn next(&mut self) {
        if self.selected + 1 < self.len() {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    /// Opens an edit form on `record`, applies `change`, submits it through
    /// the gateway and patches the dashboard with the stored result.
    fn save_edit<E, S, F>(&mut self, store: &S, record: &E, change: F) -> Result<E, String>
    where
        E: DashboardEntry,
        E::Draft: PersistedShape,
        S: RecordStore + ?Sized,
        F: FnOnce(&mut EntityForm<E>) -> Result<(), FormError>,
    {
        let Some(creds) = self.dashboard.credentials.clone() else {
            return Err("Not signed in. Run: seekr login".to_string());
        };
        let mut form = EntityForm::edit(record, &self.messages);
        change(&mut form).map_err(|e| e.to_string())?;

        let gateway = Gateway::new(store);
        let saved = form
            .submit(|submission| gateway.save::<E>(&creds, submission))
            .map_err(|e| e.to_string())?;
        self.dashboard.patch(saved.clone());
        Ok(saved)
    }

    /// Sets the selected Job's status to the `n`th catalog entry (1-based).
    fn set_job_status<S: RecordStore + ?Sized>(&mut self, store: &S, n: usize) {
        if self.tab != Tab::Jobs {
            return;
        }
        let Some(option) = n.checked_sub(1).and_then(|i| job_statuses().options().get(i)) else {
            return;
        };
        let Some(job) = self.current::<Job>().cloned() else {
            return;
        };
        let value = option.value.clone();
        self.status = Some(
            match self.save_edit(store, &job, |form| form.select("status", &value)) {
                Ok(saved) => format!("#{} -> {}", saved.id, option.label),
                Err(e) => format!("Error: {e}"),
            },
        );
    }

    fn toggle_done<S: RecordStore + ?Sized>(&mut self, store: &S) {
        if self.tab != Tab::Activities {
            return;
        }
        let Some(activity) = self.current::<Activity>().cloned() else {
            return;
        };
        self.status = Some(
            match self.save_edit(store, &activity, |form| form.toggle("done").map(|_| ())) {
                Ok(saved) if saved.done => format!("#{} marked done", saved.id),
                Ok(saved) => format!("#{} marked not done", saved.id),
                Err(e) => format!("Error: {e}"),
            },
        );
    }
}

pub fn run_browse<S: RecordStore + ?Sized>(
    auth: &dyn AuthProvider,
    store: &S,
    messages: &ValidationMessages,
) -> Result<()> {
    let dashboard = Dashboard::load(auth, store);
    if dashboard.credentials.is_none() {
        println!("Not signed in. Run: seekr login --user-id <ID> --token <TOKEN>");
        return Ok(());
    }

    let mut state = AppState::new(dashboard, messages.clone());

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, store);

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop<S: RecordStore + ?Sized>(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    store: &S,
) -> Result<()> {
    let mut list_state = ListState::default();

    loop {
        list_state.select((state.len() > 0).then_some(state.selected));
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => state.switch_tab(state.tab.next()),
                KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => state.switch_tab(state.tab.prev()),
                KeyCode::Char(c @ '1'..='6') => {
                    let n = c.to_digit(10).map_or(0, |d| d as usize);
                    state.set_job_status(store, n);
                }
                KeyCode::Char('d') => state.toggle_done(store),
                _ => {}
            }
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let titles: Vec<String> = Tab::ALL
        .iter()
        .map(|tab| format!(" {} ", tab.title()))
        .collect();
    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title(" Seekr "))
        .select(state.tab.index())
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, rows[0]);

    match state.tab {
        Tab::Jobs => draw_tab::<Job>(frame, rows[1], state, list_state),
        Tab::Activities => draw_tab::<Activity>(frame, rows[1], state, list_state),
        Tab::Contacts => draw_tab::<Contact>(frame, rows[1], state, list_state),
    }

    let footer = match &state.status {
        Some(status) => Paragraph::new(format!(" {status}")).style(Style::default().fg(Color::Yellow)),
        None => Paragraph::new(help_line(state.tab)).style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(footer, rows[2]);
}

fn help_line(tab: Tab) -> String {
    let edits = match tab {
        Tab::Jobs => {
            let keys: Vec<String> = job_statuses()
                .options()
                .iter()
                .enumerate()
                .map(|(i, o)| format!("{}:{}", i + 1, o.label.to_lowercase()))
                .collect();
            format!("  {}", keys.join(" "))
        }
        Tab::Activities => "  d:toggle done".to_string(),
        Tab::Contacts => String::new(),
    };
    format!(" j/k:navigate  J/K:scroll  tab:switch{edits}  q:quit")
}

fn draw_tab<E: Browsable>(frame: &mut Frame, area: Rect, state: &AppState, list_state: &mut ListState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(area);

    let entries = state.dashboard.entries::<E>();
    let items: Vec<ListItem> = entries.iter().map(|e| ListItem::new(e.list_line())).collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ({}) ", state.tab.title(), entries.len())),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, chunks[0], list_state);

    let detail = match state.current::<E>() {
        Some(entry) => Text::from(entry.detail()),
        None => Text::raw("Nothing here yet"),
    };
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(detail_widget, chunks[1]);
}

fn heading(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    ))
}

fn field(lines: &mut Vec<Line<'static>>, label: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        lines.push(Line::from(format!("{label}: {value}")));
    }
}

fn wrapped(lines: &mut Vec<Line<'static>>, label: &str, text: Option<&str>) {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return;
    };
    lines.push(Line::from(""));
    lines.push(heading(label));
    for line in textwrap::fill(text, WRAP_WIDTH).lines() {
        lines.push(Line::from(format!("  {line}")));
    }
}

fn status_style(status: Option<&str>) -> Style {
    match status {
        Some("wishlist") => Style::default().fg(Color::Blue),
        Some("applied") => Style::default().fg(Color::Cyan),
        Some("interviews") => Style::default().fg(Color::Yellow),
        Some("offers") => Style::default().fg(Color::Green),
        Some("rejected") => Style::default().fg(Color::Red),
        Some("ghosted") => Style::default().fg(Color::DarkGray),
        _ => Style::default(),
    }
}

impl Browsable for Job {
    fn list_line(&self) -> String {
        let icon = match self.status.as_deref() {
            Some("wishlist") => " ",
            Some("applied") => "+",
            Some("interviews") => "*",
            Some("offers") => "$",
            Some("rejected") => "x",
            Some("ghosted") => "-",
            _ => "?",
        };
        format!("{} #{:<4} {} | {}", icon, self.id, truncate(&self.title, 35), self.company)
    }

    fn detail(&self) -> Vec<Line<'static>> {
        let mut lines = vec![heading(&self.title), Line::from(format!("at {}", self.company))];

        let status = self
            .status
            .as_deref()
            .map(|s| job_statuses().label(s).map_or_else(|| capitalize_words(s), str::to_string))
            .unwrap_or_else(|| "-".to_string());
        lines.push(Line::from(Span::styled(
            format!("Status: {status}"),
            status_style(self.status.as_deref()),
        )));

        field(&mut lines, "URL", self.url.as_deref());
        field(&mut lines, "Source", self.source.as_deref());
        field(&mut lines, "Deadline", self.deadline.map(|d| d.to_string()).as_deref());
        field(&mut lines, "Location", self.location.as_deref());
        field(&mut lines, "Salary", self.salary.as_deref());
        wrapped(&mut lines, "Description", self.description.as_deref());
        lines
    }
}

impl Browsable for Activity {
    fn list_line(&self) -> String {
        let check = if self.done { "x" } else { " " };
        let company = self.company.as_deref().unwrap_or("-");
        format!("[{}] #{:<4} {} | {}", check, self.id, truncate(&self.name, 35), company)
    }

    fn detail(&self) -> Vec<Line<'static>> {
        let mut lines = vec![heading(&self.name)];

        let kind = self
            .activity_type
            .as_deref()
            .map(|t| activity_types().label(t).map_or_else(|| capitalize_words(t), str::to_string));
        field(&mut lines, "Type", kind.as_deref());
        field(&mut lines, "Company", self.company.as_deref());
        field(&mut lines, "Job title", self.job_title.as_deref());
        field(&mut lines, "Start", self.start.map(|d| d.to_string()).as_deref());
        field(&mut lines, "End", self.end.map(|d| d.to_string()).as_deref());

        let (done, style) = if self.done {
            ("Done", Style::default().fg(Color::Green))
        } else {
            ("Open", Style::default().fg(Color::Yellow))
        };
        lines.push(Line::from(Span::styled(done, style)));
        wrapped(&mut lines, "Note", self.note.as_deref());
        lines
    }
}

impl Browsable for Contact {
    fn list_line(&self) -> String {
        let company = self.company.as_deref().unwrap_or("-");
        format!("#{:<4} {} | {}", self.id, truncate(&self.name, 35), company)
    }

    fn detail(&self) -> Vec<Line<'static>> {
        let mut lines = vec![heading(&self.name)];
        field(&mut lines, "Title", self.title.as_deref());
        field(&mut lines, "Company", self.company.as_deref());
        field(&mut lines, "Email", self.email.as_deref());
        field(&mut lines, "Phone", self.phone.as_deref());
        field(&mut lines, "Location", self.location.as_deref());
        field(&mut lines, "Twitter", self.twitter.as_deref());
        field(&mut lines, "LinkedIn", self.linkedin.as_deref());
        field(&mut lines, "GitHub", self.github.as_deref());
        field(&mut lines, "Website", self.personal_website.as_deref());
        wrapped(&mut lines, "Note", self.note.as_deref());
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credentials, SessionAuth};
    use crate::db::SqliteStore;
    use crate::models::{ActivityDraft, JobDraft};

    fn signed_in() -> SessionAuth {
        SessionAuth::new(Some(Credentials {
            user_id: "user_1".to_string(),
            token: "jwt".to_string(),
        }))
    }

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let gateway = Gateway::new(&store);
        for title in ["Engineer", "Designer"] {
            let draft = JobDraft {
                title: title.to_string(),
                company: "ACME".to_string(),
                ..JobDraft::default()
            };
            gateway.create::<Job>("user_1", "jwt", &draft).unwrap();
        }
        let activity = ActivityDraft {
            name: "Recruiter call".to_string(),
            note: "Ask about the team".to_string(),
            ..ActivityDraft::default()
        };
        gateway.create::<Activity>("user_1", "jwt", &activity).unwrap();
        store
    }

    fn state(store: &SqliteStore) -> AppState {
        AppState::new(Dashboard::load(&signed_in(), store), ValidationMessages::default())
    }

    #[test]
    fn test_navigation_stays_in_bounds() {
        let store = seeded_store();
        let mut state = state(&store);
        assert_eq!(state.len(), 2);

        state.prev();
        assert_eq!(state.selected, 0);
        state.next();
        state.next();
        assert_eq!(state.selected, 1);

        state.switch_tab(state.tab.next());
        assert_eq!(state.tab, Tab::Activities);
        assert_eq!(state.selected, 0);
        assert_eq!(state.len(), 1);
        assert_eq!(Tab::Jobs.prev(), Tab::Contacts);
    }

    #[test]
    fn test_status_key_saves_and_patches() {
        let store = seeded_store();
        let mut state = state(&store);
        state.next();

        state.set_job_status(&store, 2);
        assert_eq!(state.dashboard.jobs[1].status.as_deref(), Some("applied"));
        assert_eq!(state.dashboard.jobs[0].status, None);
        assert_eq!(state.status.as_deref(), Some("#2 -> Applied"));

        let reloaded = Dashboard::load(&signed_in(), &store);
        assert_eq!(reloaded.jobs[1].status.as_deref(), Some("applied"));

        state.set_job_status(&store, 9);
        assert_eq!(state.dashboard.jobs[1].status.as_deref(), Some("applied"));
    }

    #[test]
    fn test_toggle_done_only_on_activities() {
        let store = seeded_store();
        let mut state = state(&store);

        state.toggle_done(&store);
        assert!(state.status.is_none());

        state.switch_tab(Tab::Activities);
        state.toggle_done(&store);
        assert!(state.dashboard.activities[0].done);
        assert_eq!(state.status.as_deref(), Some("#1 marked done"));

        state.toggle_done(&store);
        assert!(!state.dashboard.activities[0].done);
        assert_eq!(state.dashboard.activities[0].note.as_deref(), Some("Ask about the team"));
    }

    #[test]
    fn test_edit_without_session_reports_error() {
        let store = seeded_store();
        let mut loaded = Dashboard::load(&signed_in(), &store);
        loaded.credentials = None;
        let mut state = AppState::new(loaded, ValidationMessages::default());

        state.set_job_status(&store, 1);
        assert!(state.status.as_deref().unwrap().starts_with("Error: Not signed in"));
        assert_eq!(state.dashboard.jobs[0].status, None);
    }

    #[test]
    fn test_detail_lines() {
        let store = seeded_store();
        let state = state(&store);

        let job = state.current::<Job>().unwrap();
        assert_eq!(job.list_line(), "? #1    Engineer | ACME");
        let detail: Vec<String> = job.detail().iter().map(|l| l.to_string()).collect();
        assert_eq!(detail[0], "Engineer");
        assert_eq!(detail[1], "at ACME");
        assert_eq!(detail[2], "Status: -");

        let activity = &state.dashboard.activities[0];
        let detail: Vec<String> = activity.detail().iter().map(|l| l.to_string()).collect();
        assert!(detail.contains(&"Open".to_string()));
        assert!(detail.contains(&"  Ask about the team".to_string()));
    }

    #[test]
    fn test_help_line_lists_status_keys() {
        let help = help_line(Tab::Jobs);
        assert!(help.contains("1:wishlist"));
        assert!(help.contains("6:ghosted"));
        assert!(help_line(Tab::Activities).contains("d:toggle done"));
    }
}
