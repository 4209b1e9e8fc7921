pub mod memory;
pub mod table;

pub use memory::{InMemoryStorage, TableMap};
pub use table::Table;
