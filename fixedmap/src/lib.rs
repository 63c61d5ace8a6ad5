pub mod bucket;
pub mod error;
pub mod layout;
pub mod slot;
pub mod store;
pub mod table;

pub use error::{Result, TableError};
pub use layout::ValueKind;
pub use store::MmapFile;
pub use table::FixedTable;
