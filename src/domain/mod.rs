pub mod item;
pub mod tree;

pub use item::{CategoryId, Item, ItemId, ItemRecord, ReminderId};
pub use tree::{display_cmp, Category, ItemTree, Row, SortKey, DEFAULT_DELIMITER};
