//! sheetcalc-core - Cell storage, dependency propagation and request surface.

pub mod api;
pub mod error;
pub mod store;
pub mod workbook;

pub use error::{Result, SheetError};
pub use store::{CellData, CellRecord, CellWrite, MemoryStore, SqliteStore, Store, StoreTx, Upserted};
pub use workbook::{WriteOutcome, Workbook};
