use crate::config::AppConfig;
use crate::domain::{CategoryId, Item, ItemId, ItemTree, ReminderId, Row};
use crate::reminder::backend::BackendSlot;
use crate::reminder::{ReminderQueue, ReminderTarget};
use crate::scheduler::{SaveOutcome, SaveScheduler};
use crate::storage;
use anyhow::Result;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// Main application state: the item tree plus the reminder queue,
/// the debounced save scheduler and the notification backend slot.
/// Every mutation goes through here so the scheduler sees it.
pub struct App {
    tree: ItemTree,
    queue: ReminderQueue,
    scheduler: SaveScheduler,
    backend: BackendSlot,
    config: AppConfig,
    items_path: PathBuf,
}

impl App {
    /// Load config and the item snapshot from the data directory
    pub fn open() -> Result<Self> {
        let config = crate::config::load_or_init(storage::config_file()?);
        let items_path = storage::items_file()?;
        Self::with_paths(items_path, config)
    }

    /// Build an app against an explicit snapshot path
    pub fn with_paths(items_path: PathBuf, config: AppConfig) -> Result<Self> {
        let records = storage::load_items(&items_path)?;
        let mut tree = ItemTree::with_delimiter(&config.category_delimiter);
        for rec in records {
            tree.add_record(rec);
        }
        info!(
            "loaded {} items from {}",
            tree.item_count(),
            items_path.display()
        );
        let scheduler = SaveScheduler::new(Duration::from_millis(config.save_quiet_ms));
        Ok(Self {
            tree,
            queue: ReminderQueue::new(),
            scheduler,
            backend: BackendSlot::new(),
            config,
            items_path,
        })
    }

    pub fn tree(&self) -> &ItemTree {
        &self.tree
    }

    pub fn queue(&self) -> &ReminderQueue {
        &self.queue
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn save_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// Case-insensitive item lookup by text, for addressing items from
    /// the command line
    pub fn find_item(&self, text: &str) -> Option<ItemId> {
        let needle = text.trim().to_lowercase();
        self.tree
            .items()
            .find(|i| i.text.to_lowercase() == needle)
            .map(|i| i.id)
    }

    fn touch(&mut self, now: Instant) {
        self.scheduler.note_change(now);
    }

    pub fn add_from_text(&mut self, raw: &str, now: Instant) -> Option<ItemId> {
        let id = self.tree.add_from_text(raw)?;
        self.touch(now);
        Some(id)
    }

    pub fn toggle_done(&mut self, id: ItemId, now: Instant) {
        self.tree.toggle_done(id);
        self.touch(now);
    }

    pub fn set_note(&mut self, id: ItemId, note: &str, now: Instant) {
        self.tree.set_note(id, note);
        self.touch(now);
    }

    /// Apply an edited label to a row: item rows get renamed, category
    /// rows rename-or-merge.
    pub fn edit_row(&mut self, row: Row, text: &str, now: Instant) {
        match row {
            Row::Item(id) => self.tree.rename_item(id, text),
            Row::Category(id) => self.tree.rename_or_merge_category(id, text),
        }
        self.touch(now);
    }

    pub fn move_item(&mut self, id: ItemId, dest: Option<CategoryId>, now: Instant) {
        self.tree.move_item(id, dest);
        self.touch(now);
    }

    pub fn delete_item(&mut self, id: ItemId, now: Instant) {
        if self.tree.delete_item(id).is_some() {
            self.queue.cancel_for_item(id);
            self.touch(now);
        }
    }

    /// Delete a category and its children; `confirm` is asked only
    /// when children would go with it.
    pub fn delete_category<F>(&mut self, id: CategoryId, confirm: F, now: Instant)
    where
        F: FnOnce(&str, usize) -> bool,
    {
        let removed = self.tree.delete_category(id, confirm);
        if removed.is_empty() {
            return;
        }
        for item in &removed {
            self.queue.cancel_for_item(item.id);
        }
        self.touch(now);
    }

    /// Remove every done item
    pub fn delete_done(&mut self, now: Instant) -> Vec<Item> {
        let removed = self.tree.delete_done();
        if !removed.is_empty() {
            for item in &removed {
                self.queue.cancel_for_item(item.id);
            }
            self.touch(now);
        }
        removed
    }

    pub fn set_reminder(
        &mut self,
        target: ReminderTarget,
        due_at: DateTime<Local>,
        now: Instant,
    ) -> Vec<ReminderId> {
        let ids = self.queue.schedule(&mut self.tree, target, due_at);
        if !ids.is_empty() {
            self.touch(now);
        }
        ids
    }

    pub fn clear_reminder(&mut self, item: ItemId, now: Instant) {
        self.queue.clear_for_item(&mut self.tree, item);
        self.touch(now);
    }

    /// One scheduler beat: fire due reminders and run a pending save
    /// whose quiet interval has elapsed. Returns true while reminders
    /// remain queued.
    pub fn tick(&mut self, now: Instant, wall: DateTime<Local>) -> bool {
        let more = if self.queue.is_empty() {
            false
        } else {
            let backend = self.backend.get_or_init(self.config.backend);
            self.queue.check_due(&mut self.tree, backend, wall)
        };
        if self.scheduler.due(now) {
            self.save_at(now);
        }
        more
    }

    fn save_at(&mut self, now: Instant) -> SaveOutcome {
        let records = self.tree.snapshot();
        let path = self.items_path.clone();
        self.scheduler
            .try_save(now, || storage::save_items(&path, &records))
    }

    /// Unconditional immediate save, for one-shot commands
    pub fn save_now(&mut self) -> Result<()> {
        storage::save_items(&self.items_path, &self.tree.snapshot())?;
        self.scheduler.finish_save(Instant::now(), true);
        Ok(())
    }

    /// Flush any pending edits and release the notification backend.
    /// Called once before exit so nothing typed in the last quiet
    /// interval is lost.
    pub fn shutdown(&mut self) {
        if self.scheduler.is_pending() {
            let records = self.tree.snapshot();
            let path = self.items_path.clone();
            let _ = self
                .scheduler
                .flush(|| storage::save_items(&path, &records));
        }
        self.backend.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn test_app(dir: &std::path::Path) -> App {
        App::with_paths(dir.join("items.json"), AppConfig::default()).unwrap()
    }

    #[test]
    fn test_add_and_save_round_trip() {
        let dir = tempdir().unwrap();
        let mut app = test_app(dir.path());
        let now = Instant::now();

        app.add_from_text("work: write report", now).unwrap();
        app.add_from_text("buy milk", now).unwrap();
        app.save_now().unwrap();

        let reloaded = test_app(dir.path());
        assert_eq!(reloaded.tree().item_count(), 2);
        assert!(reloaded.tree().category_by_name("work").is_some());
    }

    #[test]
    fn test_mutations_arm_the_scheduler() {
        let dir = tempdir().unwrap();
        let mut app = test_app(dir.path());
        let now = Instant::now();
        assert!(!app.save_pending());

        let id = app.add_from_text("task", now).unwrap();
        assert!(app.save_pending());
        app.save_now().unwrap();
        assert!(!app.save_pending());

        app.toggle_done(id, now);
        assert!(app.save_pending());
    }

    #[test]
    fn test_tick_autosaves_after_quiet_interval() {
        let dir = tempdir().unwrap();
        let mut app = test_app(dir.path());
        let t0 = Instant::now();
        let quiet = Duration::from_millis(app.config().save_quiet_ms);

        app.add_from_text("task", t0).unwrap();
        app.tick(t0 + quiet - Duration::from_millis(1), Local::now());
        assert!(!dir.path().join("items.json").exists());

        app.tick(t0 + quiet, Local::now());
        assert!(dir.path().join("items.json").exists());
        assert!(!app.save_pending());
    }

    #[test]
    fn test_shutdown_flushes_pending_edits() {
        let dir = tempdir().unwrap();
        let mut app = test_app(dir.path());

        app.add_from_text("last minute", Instant::now()).unwrap();
        app.shutdown();

        let reloaded = test_app(dir.path());
        assert_eq!(reloaded.tree().item_count(), 1);
    }

    #[test]
    fn test_delete_item_cancels_its_reminder() {
        let dir = tempdir().unwrap();
        let mut app = test_app(dir.path());
        let now = Instant::now();

        let id = app.add_from_text("doomed", now).unwrap();
        app.set_reminder(
            ReminderTarget::Item(id),
            Local::now() - ChronoDuration::seconds(1),
            now,
        );
        app.delete_item(id, now);

        assert!(app.queue().is_empty());
        // The tick has nothing left to fire
        assert!(!app.tick(now, Local::now()));
    }

    #[test]
    fn test_delete_category_cancels_child_reminders() {
        let dir = tempdir().unwrap();
        let mut app = test_app(dir.path());
        let now = Instant::now();

        app.add_from_text("work: a", now).unwrap();
        app.add_from_text("work: b", now).unwrap();
        let cat = app.tree().category_by_name("work").unwrap();
        let ids = app.set_reminder(
            ReminderTarget::Category(cat),
            Local::now() + ChronoDuration::seconds(60),
            now,
        );
        assert_eq!(ids.len(), 2);

        app.delete_category(cat, |_, _| true, now);
        assert!(app.queue().is_empty());
        assert!(app.tree().is_empty());
    }

    #[test]
    fn test_clear_reminder_unschedules_item() {
        let dir = tempdir().unwrap();
        let mut app = test_app(dir.path());
        let now = Instant::now();

        let id = app.add_from_text("later", now).unwrap();
        app.set_reminder(
            ReminderTarget::Item(id),
            Local::now() + ChronoDuration::seconds(60),
            now,
        );
        assert_eq!(app.queue().len(), 1);

        app.clear_reminder(id, now);
        assert!(app.queue().is_empty());
        assert!(app.tree().item(id).unwrap().reminder.is_none());
        // A tick after the due time must stay silent
        assert!(!app.tick(now, Local::now() + ChronoDuration::seconds(120)));
    }

    #[test]
    fn test_edit_row_renames_item() {
        let dir = tempdir().unwrap();
        let mut app = test_app(dir.path());
        let now = Instant::now();

        let id = app.add_from_text("tpyo", now).unwrap();
        app.edit_row(Row::Item(id), "typo", now);
        assert_eq!(app.tree().item(id).unwrap().text, "typo");
    }

    #[test]
    fn test_edit_row_merges_categories() {
        let dir = tempdir().unwrap();
        let mut app = test_app(dir.path());
        let now = Instant::now();

        let x = app.add_from_text("a: x", now).unwrap();
        app.add_from_text("b: y", now).unwrap();
        let a = app.tree().category_by_name("a").unwrap();
        let b = app.tree().category_by_name("b").unwrap();

        app.edit_row(Row::Category(a), "b", now);
        assert!(app.tree().category(a).is_none());
        assert_eq!(app.tree().item(x).unwrap().category, Some(b));
        assert_eq!(app.tree().category_progress(b), (0, 2));
    }

    #[test]
    fn test_move_item_to_top_level_cascades_source() {
        let dir = tempdir().unwrap();
        let mut app = test_app(dir.path());
        let now = Instant::now();

        let id = app.add_from_text("work: only child", now).unwrap();
        let cat = app.tree().category_by_name("work").unwrap();

        app.move_item(id, None, now);
        assert!(app.tree().item(id).unwrap().category.is_none());
        assert!(app.tree().category(cat).is_none());
        assert!(app.save_pending());
    }

    #[test]
    fn test_find_item_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let mut app = test_app(dir.path());
        let now = Instant::now();

        let id = app.add_from_text("Buy Milk", now).unwrap();
        assert_eq!(app.find_item("buy milk"), Some(id));
        assert_eq!(app.find_item("  BUY MILK "), Some(id));
        assert!(app.find_item("missing").is_none());
    }

    #[test]
    fn test_delete_done_reports_removed() {
        let dir = tempdir().unwrap();
        let mut app = test_app(dir.path());
        let now = Instant::now();

        let a = app.add_from_text("keep", now).unwrap();
        let b = app.add_from_text("drop", now).unwrap();
        app.toggle_done(b, now);

        let removed = app.delete_done(now);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].text, "drop");
        assert!(app.tree().item(a).is_some());
    }
}
