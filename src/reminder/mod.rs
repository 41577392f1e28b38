pub mod backend;

use crate::domain::{CategoryId, ItemId, ItemTree, ReminderId};
use backend::{DueReminder, NotificationBackend};
use chrono::{DateTime, Local};
use std::time::Duration;
use tracing::{debug, warn};

/// How often the pending queue is polled against the clock
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// A scheduled notification for one item
#[derive(Debug, Clone)]
pub struct Reminder {
    pub id: ReminderId,
    pub item: ItemId,
    pub due_at: DateTime<Local>,
}

/// Target of a set-reminder action. A category fans out to its items;
/// categories never hold reminders themselves.
#[derive(Debug, Clone, Copy)]
pub enum ReminderTarget {
    Item(ItemId),
    Category(CategoryId),
}

/// Pending reminders kept in ascending due-time order, so only the
/// head needs checking. The queue owns the reminders; items hold
/// non-owning back-references for display and cancellation.
#[derive(Debug, Default)]
pub struct ReminderQueue {
    pending: Vec<Reminder>,
}

impl ReminderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn head(&self) -> Option<&Reminder> {
        self.pending.first()
    }

    pub fn get(&self, id: ReminderId) -> Option<&Reminder> {
        self.pending.iter().find(|r| r.id == id)
    }

    /// Schedule a reminder on an item, or on every item of a
    /// category. Returns the ids of the reminders created.
    pub fn schedule(
        &mut self,
        tree: &mut ItemTree,
        target: ReminderTarget,
        due_at: DateTime<Local>,
    ) -> Vec<ReminderId> {
        match target {
            ReminderTarget::Item(item) => {
                self.schedule_item(tree, item, due_at).into_iter().collect()
            }
            ReminderTarget::Category(cat) => {
                let children: Vec<ItemId> = tree.children(cat).iter().map(|i| i.id).collect();
                children
                    .into_iter()
                    .filter_map(|child| self.schedule_item(tree, child, due_at))
                    .collect()
            }
        }
    }

    fn schedule_item(
        &mut self,
        tree: &mut ItemTree,
        item: ItemId,
        due_at: DateTime<Local>,
    ) -> Option<ReminderId> {
        tree.item(item)?;
        // One reminder per item: replace any previous one
        self.clear_for_item(tree, item);
        let reminder = Reminder {
            id: ReminderId::new(),
            item,
            due_at,
        };
        let id = reminder.id;
        // Sort-preserving insert; ties keep insertion order
        let pos = self.pending.partition_point(|r| r.due_at <= due_at);
        self.pending.insert(pos, reminder);
        tree.set_reminder_ref(item, id);
        Some(id)
    }

    /// Remove a reminder from any position in the queue and clear the
    /// item's back-reference. No-op if already fired or removed.
    pub fn clear(&mut self, tree: &mut ItemTree, id: ReminderId) {
        if let Some(pos) = self.pending.iter().position(|r| r.id == id) {
            let reminder = self.pending.remove(pos);
            tree.clear_reminder_ref(reminder.item);
        }
    }

    /// Remove any reminder targeting `item` and clear its back-reference
    pub fn clear_for_item(&mut self, tree: &mut ItemTree, item: ItemId) {
        self.pending.retain(|r| r.item != item);
        tree.clear_reminder_ref(item);
    }

    /// Drop queue entries whose target item was just deleted, so the
    /// reminder can never fire for it.
    pub fn cancel_for_item(&mut self, item: ItemId) {
        self.pending.retain(|r| r.item != item);
    }

    /// Drain every currently-due entry in ascending due-time order.
    /// Targets that no longer resolve are skipped silently; items
    /// marked done are removed without notifying; backend delivery
    /// errors are logged and the reminder still counts as handled.
    ///
    /// Returns true while entries remain pending; false once the
    /// queue is empty, telling the caller to cancel the poll timer.
    pub fn check_due(
        &mut self,
        tree: &mut ItemTree,
        mut backend: Option<&mut dyn NotificationBackend>,
        now: DateTime<Local>,
    ) -> bool {
        while let Some(head) = self.pending.first() {
            if head.due_at > now {
                break;
            }
            let reminder = self.pending.remove(0);
            let Some(item) = tree.item(reminder.item) else {
                debug!("reminder target no longer exists, skipping");
                continue;
            };
            if !item.done {
                if let Some(backend) = backend.as_deref_mut() {
                    let due = DueReminder {
                        text: item.text.clone(),
                        due_at: reminder.due_at,
                    };
                    if let Err(e) = backend.notify(&due) {
                        warn!("reminder notification failed: {e}");
                    }
                }
            }
            tree.clear_reminder_ref(reminder.item);
        }
        !self.pending.is_empty()
    }
}
