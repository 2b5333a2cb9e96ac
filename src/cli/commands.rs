use std::fmt::Write as _;
use std::io::{self, IsTerminal, Read};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use time::{Duration, Month, OffsetDateTime};

use crate::app::DiarySession;
use crate::config::AppConfig;
use crate::diary::{
    visit_message, DiaryCategory, DiaryEntry, DiaryEvent, DraftField, Mood, RemoveOptions,
    RemoveOutcome,
};
use crate::storage::KvStore;
use crate::timefmt::{
    format_day, format_relative, format_remaining, format_timestamp, parse_date_ymd,
};

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Title for the entry (derived from the content when omitted)
    #[arg()]
    pub title: Option<String>,
    /// Entry content. If omitted, reads from stdin (or prompts on a terminal).
    #[arg(long, short = 'm')]
    pub content: Option<String>,
    /// Category: work, relationship, daily, study or miscellaneous
    #[arg(long)]
    pub category: Option<DiaryCategory>,
}

#[derive(Args, Debug, Clone)]
pub struct RemoveArgs {
    /// Entry id (a unique prefix is enough)
    pub id: String,
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ToggleArgs {
    /// Entry id (a unique prefix is enough)
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MoodArgs {
    /// Mood: very_good, good, neutral, bad or very_bad
    pub mood: Mood,
    /// Day to record, as YYYY-MM-DD (today when omitted)
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CalendarArgs {
    /// Month to show, as YYYY-MM (the current month when omitted)
    #[arg(long)]
    pub month: Option<String>,
}

pub fn add_entry(config: Arc<AppConfig>, store: Arc<dyn KvStore>, args: AddArgs) -> Result<()> {
    let mut session = open_session(config.clone(), store)?;
    let content = match args.content {
        Some(content) => content,
        None => match read_stdin()? {
            Some(piped) => piped,
            None => prompt("Content")?,
        },
    };

    session.edit_draft(DraftField::Title, args.title.unwrap_or_default());
    session.edit_draft(DraftField::Content, content);
    let category = args.category.unwrap_or(config.default_category);

    match session.submit_draft(category) {
        Ok(entry) => {
            let fades = format_remaining(
                entry.created_at + config.retention_window(),
                entry.created_at,
            );
            println!("Saved '{}' ({category}) with {fades}", entry.title);
            Ok(())
        }
        Err(err) => bail!("{err}"),
    }
}

pub fn list_entries(config: Arc<AppConfig>, store: Arc<dyn KvStore>) -> Result<()> {
    let session = open_session(config.clone(), store)?;
    println!("{}", visit_message(session.visit().days_since_last_visit));

    let entries = session.entries_snapshot();
    if entries.is_empty() {
        println!("The diary is empty. 'fadelog add' starts a new entry.");
        return Ok(());
    }

    let now = OffsetDateTime::now_utc();
    let retention = config.retention_window();
    for entry in &entries {
        println!("{}", format_entry_line(entry, retention, now));
    }
    Ok(())
}

pub fn remove_entry(config: Arc<AppConfig>, store: Arc<dyn KvStore>, args: RemoveArgs) -> Result<()> {
    let session = open_session(config, store)?;
    let entry = resolve_entry(&session.entries_snapshot(), &args.id)?;

    match session.remove(
        &entry.id,
        RemoveOptions {
            skip_confirm: args.yes,
        },
    ) {
        RemoveOutcome::Removed => {
            println!("Deleted '{}'.", entry.title);
            Ok(())
        }
        RemoveOutcome::ConfirmationRequired => {
            if prompt_yes_no(&format!(
                "Delete '{}'? This cannot be undone",
                entry.title
            ))? {
                session.confirm_removal(&entry.id);
                println!("Deleted '{}'.", entry.title);
            } else {
                session.cancel_removal();
                println!("Kept '{}'.", entry.title);
            }
            Ok(())
        }
        RemoveOutcome::NotFound => bail!("no entry matches id '{}'", args.id),
    }
}

pub fn toggle_entry(config: Arc<AppConfig>, store: Arc<dyn KvStore>, args: ToggleArgs) -> Result<()> {
    let session = open_session(config, store)?;
    let entry = resolve_entry(&session.entries_snapshot(), &args.id)?;
    match session.toggle_completion(&entry.id) {
        Some(true) => println!("Marked '{}' as done.", entry.title),
        Some(false) => println!("Marked '{}' as not done.", entry.title),
        None => bail!("no entry matches id '{}'", args.id),
    }
    Ok(())
}

pub fn sweep_entries(config: Arc<AppConfig>, store: Arc<dyn KvStore>, args: SweepArgs) -> Result<()> {
    let session = open_session(config, store)?;
    let expired = session.expired_snapshot();
    if expired.is_empty() {
        println!("Nothing has expired yet.");
        return Ok(());
    }

    println!("Expired entries:");
    for entry in &expired {
        println!("  {}  {}", short_id(&entry.id), entry.title);
    }
    let confirmed = args.yes
        || prompt_yes_no(&format!(
            "Let go of {} expired {}",
            expired.len(),
            plural(expired.len(), "entry", "entries")
        ))?;
    if !confirmed {
        println!("Kept everything for now.");
        return Ok(());
    }

    let swept = session.sweep_expired();
    println!(
        "Let go of {} {}.",
        swept,
        plural(swept, "entry", "entries")
    );
    Ok(())
}

pub fn record_mood(config: Arc<AppConfig>, store: Arc<dyn KvStore>, args: MoodArgs) -> Result<()> {
    let session = open_session(config, store)?;
    let date = match args.date.as_deref() {
        Some(raw) => match parse_date_ymd(raw) {
            Some(date) => date,
            None => bail!("dates use the YYYY-MM-DD form, got '{raw}'"),
        },
        None => OffsetDateTime::now_utc().date(),
    };
    session.set_day_mood(date, args.mood);
    println!("Recorded {} for {}.", args.mood, format_day(date));
    Ok(())
}

pub fn show_calendar(
    config: Arc<AppConfig>,
    store: Arc<dyn KvStore>,
    args: CalendarArgs,
) -> Result<()> {
    let session = open_session(config, store)?;
    let (year, month) = match args.month.as_deref() {
        Some(raw) => parse_year_month(raw)?,
        None => {
            let today = OffsetDateTime::now_utc().date();
            (today.year(), today.month())
        }
    };

    println!("{month} {year}");
    let records = session.moods_in_month(year, month);
    if records.is_empty() {
        println!("(no moods recorded)");
        return Ok(());
    }
    for (date, mood) in records {
        println!("{}  {}", format_day(date), mood);
    }
    Ok(())
}

pub fn show_status(config: Arc<AppConfig>, store: Arc<dyn KvStore>) -> Result<()> {
    let session = open_session(config.clone(), store)?;
    let now = OffsetDateTime::now_utc();

    let visit = session.visit();
    println!("{}", visit_message(visit.days_since_last_visit));
    if let Some(last) = visit.last_visited_at {
        println!("Last visit recorded {}", format_relative(last, now));
    }

    let entries = session.entries_snapshot();
    let completed = entries.iter().filter(|entry| entry.is_completed).count();
    println!(
        "{} live {} ({} done), retention window {} days",
        entries.len(),
        plural(entries.len(), "entry", "entries"),
        completed,
        config.retention_days
    );

    match session.horizon() {
        Some(horizon) => println!(
            "Next fade: {} ({})",
            format_remaining(horizon, now),
            format_timestamp(horizon)
        ),
        None => println!("Nothing scheduled to fade."),
    }
    Ok(())
}

pub fn watch(config: Arc<AppConfig>, store: Arc<dyn KvStore>) -> Result<()> {
    let mut session = open_session(config.clone(), store)?;
    let events = session.subscribe();
    session.start_sweeper()?;
    println!(
        "Watching the diary; checking for expired entries every {}s. Ctrl-C to quit.",
        config.tick_seconds
    );

    for event in events.iter() {
        match event {
            DiaryEvent::Swept { expired } if expired > 0 => {
                println!(
                    "{}  let go of {} {}",
                    format_timestamp(OffsetDateTime::now_utc()),
                    expired,
                    plural(expired, "entry", "entries")
                );
            }
            DiaryEvent::PersistenceFailed { message } => {
                eprintln!("Warning: {message}");
            }
            _ => {}
        }
    }
    Ok(())
}

fn open_session(config: Arc<AppConfig>, store: Arc<dyn KvStore>) -> Result<DiarySession> {
    let mut session = DiarySession::new(config, store);
    if let Err(err) = session.load() {
        eprintln!("Warning: {err}. Starting from an empty diary.");
    }
    Ok(session)
}

fn format_entry_line(entry: &DiaryEntry, retention: Duration, now: OffsetDateTime) -> String {
    let check = if entry.is_completed { "[x]" } else { "[ ]" };
    let mut line = format!(
        "{check} {}  {:<13} {}",
        short_id(&entry.id),
        entry.category.to_string(),
        entry.title
    );
    let _ = write!(
        &mut line,
        "  ({}, written {})",
        format_remaining(entry.expires_at(retention), now),
        format_relative(entry.created_at, now)
    );
    line
}

/// Match an entry by full id or unique prefix.
fn resolve_entry(entries: &[DiaryEntry], needle: &str) -> Result<DiaryEntry> {
    if let Some(exact) = entries.iter().find(|entry| entry.id == needle) {
        return Ok(exact.clone());
    }
    let matches: Vec<&DiaryEntry> = entries
        .iter()
        .filter(|entry| entry.id.starts_with(needle))
        .collect();
    match matches.as_slice() {
        [] => bail!("no entry matches id '{needle}'"),
        [only] => Ok((*only).clone()),
        _ => bail!("id prefix '{needle}' is ambiguous"),
    }
}

fn parse_year_month(raw: &str) -> Result<(i32, Month)> {
    let parsed = raw.split_once('-').and_then(|(year, month)| {
        let year: i32 = year.parse().ok()?;
        let month: u8 = month.parse().ok()?;
        let month = Month::try_from(month).ok()?;
        Some((year, month))
    });
    match parsed {
        Some(pair) => Ok(pair),
        None => bail!("months use the YYYY-MM form, got '{raw}'"),
    }
}

fn short_id(id: &str) -> &str {
    let end = id
        .char_indices()
        .nth(8)
        .map(|(idx, _)| idx)
        .unwrap_or(id.len());
    &id[..end]
}

fn plural<'a>(count: usize, singular: &'a str, plural: &'a str) -> &'a str {
    if count == 1 {
        singular
    } else {
        plural
    }
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn prompt_yes_no(question: &str) -> Result<bool> {
    let answer = prompt(&format!("{question} [y/N]"))?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

fn read_stdin() -> Result<Option<String>> {
    if io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}
