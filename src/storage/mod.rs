pub mod files;
pub mod store;

pub use files::{atomic_write, config_file, ensure_data_dir, get_data_dir, items_file, read_file};
pub use store::{load_items, save_items};
