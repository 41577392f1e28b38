use super::item::{CategoryId, Item, ItemId, ItemRecord, ReminderId};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Delimiter splitting "category: item" free-form input
pub const DEFAULT_DELIMITER: &str = ":";

/// A named grouping node. Categories hold items and nothing else;
/// the tree never nests deeper than category -> item.
#[derive(Debug, Clone)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// A visible top-level row: either a bare item or a category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row {
    Item(ItemId),
    Category(CategoryId),
}

/// The facts the display order is derived from. The order is always
/// recomputed from these, never from insertion order.
#[derive(Debug, Clone, Copy)]
pub struct SortKey<'a> {
    pub is_category: bool,
    pub done: bool,
    pub text: Option<&'a str>,
}

/// Total display order: categories before plain items, pending before
/// done, then case-insensitive text with missing text sorting first.
pub fn display_cmp(a: &SortKey, b: &SortKey) -> Ordering {
    if a.is_category != b.is_category {
        return if a.is_category {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    if a.done != b.done {
        return if a.done {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    match (a.text, b.text) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => collate(x, y),
    }
}

fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// The two-level item/category store with its case-insensitive
/// category name index. Every mutation that can empty a category
/// cascades the category away and keeps the index in sync.
#[derive(Debug)]
pub struct ItemTree {
    items: HashMap<ItemId, Item>,
    categories: HashMap<CategoryId, Category>,
    /// Lowercased category name -> id; always consistent with `categories`
    index: HashMap<String, CategoryId>,
    delimiter: String,
}

impl Default for ItemTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemTree {
    pub fn new() -> Self {
        Self::with_delimiter(DEFAULT_DELIMITER)
    }

    pub fn with_delimiter(delimiter: &str) -> Self {
        Self {
            items: HashMap::new(),
            categories: HashMap::new(),
            index: HashMap::new(),
            delimiter: delimiter.to_string(),
        }
    }

    /// Rebuild a tree from a flat record list, discarding anything
    /// that sanitizes away to nothing.
    pub fn from_records(records: impl IntoIterator<Item = ItemRecord>) -> Self {
        let mut tree = Self::new();
        for rec in records {
            tree.add_record(rec);
        }
        tree
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.categories.is_empty()
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.categories.get(&id)
    }

    /// Case-insensitive lookup, no creation
    pub fn category_by_name(&self, name: &str) -> Option<CategoryId> {
        self.index.get(&name.trim().to_lowercase()).copied()
    }

    /// Case-insensitive lookup; creates the category on first sight.
    /// The first-seen casing is kept for display.
    pub fn get_or_create_category(&mut self, name: &str) -> CategoryId {
        let name = name.trim();
        let key = name.to_lowercase();
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let cat = Category {
            id: CategoryId::new(),
            name: name.to_string(),
        };
        let id = cat.id;
        self.index.insert(key, id);
        self.categories.insert(id, cat);
        id
    }

    /// Add an item, creating its category on demand. Blank text is a
    /// silent no-op; a blank category name means top-level.
    pub fn add_item(&mut self, text: &str, category: Option<&str>) -> Option<ItemId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| self.get_or_create_category(c));
        let item = Item::new(text.to_string(), category);
        let id = item.id;
        self.items.insert(id, item);
        Some(id)
    }

    /// Create an item from raw entry text, splitting "category: item"
    /// on the first delimiter occurrence only.
    pub fn add_from_text(&mut self, raw: &str) -> Option<ItemId> {
        let delimiter = self.delimiter.clone();
        match raw.split_once(delimiter.as_str()) {
            Some((category, text)) => self.add_item(text, Some(category)),
            None => self.add_item(raw, None),
        }
    }

    /// Add a stored record (done flag and note carried over)
    pub fn add_record(&mut self, rec: ItemRecord) -> Option<ItemId> {
        let Some(rec) = rec.sanitized() else {
            return None;
        };
        let id = self.add_item(&rec.text, rec.category.as_deref())?;
        if let Some(item) = self.items.get_mut(&id) {
            item.done = rec.done;
            item.note = rec.note;
        }
        Some(id)
    }

    pub fn toggle_done(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(&id) {
            item.done = !item.done;
        }
    }

    pub fn rename_item(&mut self, id: ItemId, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if let Some(item) = self.items.get_mut(&id) {
            item.text = text.to_string();
        }
    }

    /// Set or clear an item note; empty text clears it
    pub fn set_note(&mut self, id: ItemId, note: &str) {
        if let Some(item) = self.items.get_mut(&id) {
            let note = note.trim();
            item.note = if note.is_empty() {
                None
            } else {
                Some(note.to_string())
            };
        }
    }

    pub(crate) fn set_reminder_ref(&mut self, id: ItemId, reminder: ReminderId) {
        if let Some(item) = self.items.get_mut(&id) {
            item.reminder = Some(reminder);
        }
    }

    pub(crate) fn clear_reminder_ref(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(&id) {
            item.reminder = None;
        }
    }

    /// Delete an item. If its category is left empty the category is
    /// deleted too, index entry included. Dangling handles are a no-op.
    pub fn delete_item(&mut self, id: ItemId) -> Option<Item> {
        let item = self.items.remove(&id)?;
        if let Some(cat) = item.category {
            self.drop_category_if_empty(cat);
        }
        Some(item)
    }

    /// Delete a category with all its children. `confirm` is consulted
    /// only when children remain; returning false aborts the whole
    /// operation with no partial mutation. Returns the removed items.
    pub fn delete_category<F>(&mut self, id: CategoryId, confirm: F) -> Vec<Item>
    where
        F: FnOnce(&str, usize) -> bool,
    {
        let Some(cat) = self.categories.get(&id) else {
            return Vec::new();
        };
        let children: Vec<ItemId> = self
            .items
            .values()
            .filter(|i| i.category == Some(id))
            .map(|i| i.id)
            .collect();
        if !children.is_empty() && !confirm(&cat.name, children.len()) {
            return Vec::new();
        }
        self.remove_category_node(id);
        children
            .into_iter()
            .filter_map(|child| self.items.remove(&child))
            .collect()
    }

    /// Rename a category, merging into an existing category when the
    /// new name already resolves to one. Children keep their handles
    /// (done, note and reminders ride along); the source category is
    /// gone afterwards with no stale index entry. Renaming to the
    /// same name is a no-op; a case-only change just updates the
    /// stored casing.
    pub fn rename_or_merge_category(&mut self, id: CategoryId, new_name: &str) {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return;
        }
        let Some(current) = self.categories.get(&id) else {
            return;
        };
        if current.name == new_name {
            return;
        }
        if current.name.to_lowercase() == new_name.to_lowercase() {
            // Same index slot, only the display casing changes
            if let Some(cat) = self.categories.get_mut(&id) {
                cat.name = new_name.to_string();
            }
            return;
        }
        let target = self.get_or_create_category(new_name);
        for item in self.items.values_mut() {
            if item.category == Some(id) {
                item.category = Some(target);
            }
        }
        self.remove_category_node(id);
    }

    /// Reparent an item to the root or into a category. Only items
    /// move; a missing item or destination is a no-op, so an illegal
    /// drop never mutates anything. Cascades the emptied source.
    pub fn move_item(&mut self, id: ItemId, dest: Option<CategoryId>) {
        if let Some(dest) = dest {
            if !self.categories.contains_key(&dest) {
                return;
            }
        }
        let Some(item) = self.items.get_mut(&id) else {
            return;
        };
        let old = item.category;
        if old == dest {
            return;
        }
        item.category = dest;
        if let Some(old) = old {
            self.drop_category_if_empty(old);
        }
    }

    /// Remove every done item, wherever it lives, cascading emptied
    /// categories. Returns the removed items.
    pub fn delete_done(&mut self) -> Vec<Item> {
        let done: Vec<ItemId> = self
            .items
            .values()
            .filter(|i| i.done)
            .map(|i| i.id)
            .collect();
        done.into_iter()
            .filter_map(|id| self.delete_item(id))
            .collect()
    }

    /// Done/total counters for a category, recomputed on every read
    pub fn category_progress(&self, id: CategoryId) -> (usize, usize) {
        let mut done = 0;
        let mut total = 0;
        for item in self.items.values().filter(|i| i.category == Some(id)) {
            total += 1;
            if item.done {
                done += 1;
            }
        }
        (done, total)
    }

    /// Items of a category in display order
    pub fn children(&self, id: CategoryId) -> Vec<&Item> {
        let mut children: Vec<&Item> = self
            .items
            .values()
            .filter(|i| i.category == Some(id))
            .collect();
        children.sort_by(|a, b| display_cmp(&item_key(a), &item_key(b)));
        children
    }

    /// Top-level rows in display order
    pub fn top_rows(&self) -> Vec<Row> {
        let mut rows: Vec<Row> = self
            .categories
            .keys()
            .map(|&c| Row::Category(c))
            .chain(
                self.items
                    .values()
                    .filter(|i| i.category.is_none())
                    .map(|i| Row::Item(i.id)),
            )
            .collect();
        rows.sort_by(|a, b| display_cmp(&self.row_key(a), &self.row_key(b)));
        rows
    }

    /// Flatten the whole tree into records, depth-first in display
    /// order: top-level rows, and for each category its children.
    pub fn snapshot(&self) -> Vec<ItemRecord> {
        let mut records = Vec::with_capacity(self.items.len());
        for row in self.top_rows() {
            match row {
                Row::Item(id) => {
                    if let Some(item) = self.items.get(&id) {
                        records.push(record_of(item, None));
                    }
                }
                Row::Category(id) => {
                    let Some(cat) = self.categories.get(&id) else {
                        continue;
                    };
                    for child in self.children(id) {
                        records.push(record_of(child, Some(cat.name.clone())));
                    }
                }
            }
        }
        records
    }

    fn row_key(&self, row: &Row) -> SortKey<'_> {
        match *row {
            Row::Category(id) => SortKey {
                is_category: true,
                done: false,
                text: self.categories.get(&id).map(|c| c.name.as_str()),
            },
            Row::Item(id) => {
                let item = self.items.get(&id);
                SortKey {
                    is_category: false,
                    done: item.map_or(false, |i| i.done),
                    text: item.map(|i| i.text.as_str()),
                }
            }
        }
    }

    fn drop_category_if_empty(&mut self, id: CategoryId) {
        if self.items.values().any(|i| i.category == Some(id)) {
            return;
        }
        self.remove_category_node(id);
    }

    fn remove_category_node(&mut self, id: CategoryId) {
        if let Some(cat) = self.categories.remove(&id) {
            let key = cat.name.to_lowercase();
            if self.index.get(&key) == Some(&id) {
                self.index.remove(&key);
            }
        }
    }
}

fn item_key(item: &Item) -> SortKey<'_> {
    SortKey {
        is_category: false,
        done: item.done,
        text: Some(&item.text),
    }
}

fn record_of(item: &Item, category: Option<String>) -> ItemRecord {
    ItemRecord {
        text: item.text.clone(),
        done: item.done,
        category,
        note: item.note.clone(),
    }
}
