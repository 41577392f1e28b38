use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable handle to a task item. Assigned at creation and never reused;
/// survives resorting and reparenting, dangles after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable handle to a category node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(Uuid);

impl CategoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CategoryId {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a pending reminder, held by the item as a non-owning
/// back-reference. The reminder queue owns the reminder itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReminderId(Uuid);

impl ReminderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReminderId {
    fn default() -> Self {
        Self::new()
    }
}

/// A single task item
#[derive(Debug, Clone)]
pub struct Item {
    /// Unique ID for internal references (not persisted)
    pub id: ItemId,
    /// Task text, non-empty after trimming
    pub text: String,
    /// Completion flag
    pub done: bool,
    /// Free-form note, empty treated as absent
    pub note: Option<String>,
    /// Owning category, or None for top-level items
    pub category: Option<CategoryId>,
    /// Back-reference to a pending reminder, if any
    pub reminder: Option<ReminderId>,
}

impl Item {
    pub fn new(text: String, category: Option<CategoryId>) -> Self {
        Self {
            id: ItemId::new(),
            text,
            done: false,
            note: None,
            category,
            reminder: None,
        }
    }
}

/// Flat persisted form of an item. Category membership is captured by
/// name; absent fields round-trip as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub text: String,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ItemRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
            category: None,
            note: None,
        }
    }

    /// Normalize a record read from storage: trim the text and drop
    /// empty optional fields. Returns None if no usable text remains,
    /// so a blank item is never constructed from storage.
    pub fn sanitized(self) -> Option<Self> {
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return None;
        }
        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        Some(Self {
            text,
            done: self.done,
            category: non_empty(self.category),
            note: non_empty(self.note),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_defaults() {
        let item = Item::new("Buy milk".to_string(), None);
        assert!(!item.done);
        assert!(item.note.is_none());
        assert!(item.category.is_none());
        assert!(item.reminder.is_none());
    }

    #[test]
    fn test_item_ids_are_unique() {
        assert_ne!(ItemId::new(), ItemId::new());
    }

    #[test]
    fn test_sanitize_trims_text() {
        let rec = ItemRecord::new("  call mom  ").sanitized().unwrap();
        assert_eq!(rec.text, "call mom");
    }

    #[test]
    fn test_sanitize_discards_blank_text() {
        assert!(ItemRecord::new("   ").sanitized().is_none());
        assert!(ItemRecord::new("").sanitized().is_none());
    }

    #[test]
    fn test_sanitize_drops_empty_optionals() {
        let rec = ItemRecord {
            text: "task".to_string(),
            done: true,
            category: Some("".to_string()),
            note: Some("  ".to_string()),
        };
        let rec = rec.sanitized().unwrap();
        assert!(rec.category.is_none());
        assert!(rec.note.is_none());
        assert!(rec.done);
    }
}
