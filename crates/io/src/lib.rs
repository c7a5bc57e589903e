// Sheet import and run history for stocktake

pub mod history;
pub mod tabular;

pub use history::{HistoryEntry, HistoryStore};
pub use tabular::{is_supported, read_rows};
