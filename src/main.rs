mod app;
mod config;
mod domain;
mod reminder;
mod scheduler;
mod storage;

use anyhow::{bail, Context, Result};
use app::App;
use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone};
use clap::{Parser, Subcommand};
use domain::Row;
use reminder::{ReminderTarget, POLL_INTERVAL};
use std::io::Write;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lista")]
#[command(about = "A small to-do list with categories and reminders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add an item; "category: text" files it under a category
    Add {
        /// Item text
        text: Vec<String>,
    },
    /// Show the list (default when no command is given)
    List,
    /// Toggle an item done or pending
    Done {
        /// Item text to match
        text: Vec<String>,
    },
    /// Delete an item or a whole category
    Delete {
        /// Item or category to match; omit together with --done
        text: Vec<String>,
        /// Delete every done item instead
        #[arg(long)]
        done: bool,
    },
    /// Attach a note to an item (empty note clears it)
    Note {
        /// Item text to match
        text: String,
        /// Note content
        note: Vec<String>,
    },
    /// Rename an item, or rename a category (merging into an existing
    /// category of the new name)
    Edit {
        /// Current item or category text
        text: String,
        /// Replacement text
        new: Vec<String>,
    },
    /// Move an item into a category, or to the top level
    Move {
        /// Item text to match
        text: String,
        /// Destination category; omit to move to the top level
        category: Option<String>,
    },
    /// Schedule a reminder and wait for it to fire (Enter cancels)
    Remind {
        /// Item or category to match
        text: String,
        /// When to remind: "YYYY-MM-DD HH:MM", "HH:MM" (today), or "+MINUTES"
        at: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let mut app = App::open()?;
    let now = Instant::now();

    match cli.command {
        None | Some(Commands::List) => {
            print_list(&app);
        }
        Some(Commands::Add { text }) => {
            let raw = text.join(" ");
            if app.add_from_text(&raw, now).is_none() {
                bail!("nothing to add");
            }
            app.save_now()?;
        }
        Some(Commands::Done { text }) => {
            let id = lookup_item(&app, &text.join(" "))?;
            app.toggle_done(id, now);
            app.save_now()?;
        }
        Some(Commands::Delete { text, done }) => {
            if done {
                let removed = app.delete_done(now);
                println!("removed {} done item(s)", removed.len());
            } else {
                delete_by_text(&mut app, &text.join(" "), now)?;
            }
            app.save_now()?;
        }
        Some(Commands::Note { text, note }) => {
            let id = lookup_item(&app, &text)?;
            app.set_note(id, &note.join(" "), now);
            app.save_now()?;
        }
        Some(Commands::Edit { text, new }) => {
            let row = lookup_row(&app, &text)?;
            app.edit_row(row, &new.join(" "), now);
            app.save_now()?;
        }
        Some(Commands::Move { text, category }) => {
            let id = lookup_item(&app, &text)?;
            let dest = match category.as_deref() {
                Some(name) => Some(
                    app.tree()
                        .category_by_name(name)
                        .with_context(|| format!("no category matching '{name}'"))?,
                ),
                None => None,
            };
            app.move_item(id, dest, now);
            app.save_now()?;
        }
        Some(Commands::Remind { text, at }) => {
            let due_at = parse_due(&at)?;
            let target = lookup_target(&app, &text)?;
            let items: Vec<domain::ItemId> = match target {
                ReminderTarget::Item(id) => vec![id],
                ReminderTarget::Category(cat) => {
                    app.tree().children(cat).iter().map(|i| i.id).collect()
                }
            };
            let ids = app.set_reminder(target, due_at, now);
            if ids.is_empty() {
                bail!("no items to remind about in '{text}'");
            }
            println!(
                "{} reminder(s) set for {}; press Enter to cancel",
                ids.len(),
                due_at.format(reminder::backend::REMINDER_TIME_FORMAT)
            );
            wait_for_reminders(&mut app, &items);
        }
    }

    app.shutdown();
    Ok(())
}

/// Poll until the queue drains and the last save has landed. A line
/// on stdin clears the reminders just scheduled.
fn wait_for_reminders(app: &mut App, items: &[domain::ItemId]) {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_ok() {
            let _ = tx.send(());
        }
    });

    let mut stdin_open = true;
    loop {
        if stdin_open {
            use std::sync::mpsc::RecvTimeoutError;
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(()) => {
                    stdin_open = false;
                    let now = Instant::now();
                    for &id in items {
                        app.clear_reminder(id, now);
                    }
                    println!("reminder(s) cancelled");
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => stdin_open = false,
            }
        } else {
            std::thread::sleep(POLL_INTERVAL);
        }
        let more = app.tick(Instant::now(), Local::now());
        if !more && !app.save_pending() {
            break;
        }
    }
}

fn print_list(app: &App) {
    let tree = app.tree();
    if tree.is_empty() {
        println!("nothing to do");
        return;
    }
    for row in tree.top_rows() {
        match row {
            Row::Category(id) => {
                let Some(cat) = tree.category(id) else {
                    continue;
                };
                let (done, total) = tree.category_progress(id);
                println!("{} ({done}/{total})", cat.name);
                for item in tree.children(id) {
                    print_item(item, "  ");
                }
            }
            Row::Item(id) => {
                if let Some(item) = tree.item(id) {
                    print_item(item, "");
                }
            }
        }
    }
}

fn print_item(item: &domain::Item, indent: &str) {
    let mark = if item.done { "x" } else { " " };
    println!("{indent}[{mark}] {}", item.text);
    if let Some(note) = &item.note {
        println!("{indent}      {note}");
    }
}

fn lookup_item(app: &App, text: &str) -> Result<domain::ItemId> {
    app.find_item(text)
        .with_context(|| format!("no item matching '{text}'"))
}

/// Resolve text to an item row first, then to a category row
fn lookup_row(app: &App, text: &str) -> Result<Row> {
    if let Some(id) = app.find_item(text) {
        return Ok(Row::Item(id));
    }
    if let Some(cat) = app.tree().category_by_name(text) {
        return Ok(Row::Category(cat));
    }
    bail!("no item or category matching '{text}'")
}

fn lookup_target(app: &App, text: &str) -> Result<ReminderTarget> {
    Ok(match lookup_row(app, text)? {
        Row::Item(id) => ReminderTarget::Item(id),
        Row::Category(id) => ReminderTarget::Category(id),
    })
}

fn delete_by_text(app: &mut App, text: &str, now: Instant) -> Result<()> {
    if let Some(id) = app.find_item(text) {
        app.delete_item(id, now);
        return Ok(());
    }
    let Some(cat) = app.tree().category_by_name(text) else {
        bail!("no item or category matching '{text}'");
    };
    app.delete_category(cat, confirm_category_delete, now);
    Ok(())
}

/// Asked only when the category still has items in it
fn confirm_category_delete(name: &str, count: usize) -> bool {
    print!("Delete category '{name}' and its {count} item(s)? [y/N] ");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

/// Accepts "YYYY-MM-DD HH:MM", a bare "HH:MM" meaning today, or
/// "+MINUTES" relative to now.
fn parse_due(at: &str) -> Result<DateTime<Local>> {
    let at = at.trim();
    if let Some(minutes) = at.strip_prefix('+') {
        let minutes: i64 = minutes
            .parse()
            .with_context(|| format!("invalid minute offset: '{at}'"))?;
        return Ok(Local::now() + chrono::Duration::minutes(minutes));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M") {
        return Local
            .from_local_datetime(&naive)
            .single()
            .with_context(|| format!("ambiguous local time: '{at}'"));
    }
    if let Ok(time) = NaiveTime::parse_from_str(at, "%H:%M") {
        let naive = Local::now().date_naive().and_time(time);
        return Local
            .from_local_datetime(&naive)
            .single()
            .with_context(|| format!("ambiguous local time: '{at}'"));
    }
    bail!("could not parse time '{at}'; use \"YYYY-MM-DD HH:MM\", \"HH:MM\" or \"+MINUTES\"")
}
