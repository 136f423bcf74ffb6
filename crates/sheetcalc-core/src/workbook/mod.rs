//! Workbook: reads, writes and dependency propagation over a [`Store`].

mod ops;

pub use ops::WriteOutcome;

use std::collections::BTreeMap;

use crate::error::Result;
use crate::store::{CellData, Store};

/// Entry point for cell reads and writes.
///
/// Sheet and cell IDs are case-insensitive; they are lowercased before they
/// reach the store.
pub struct Workbook<S: Store> {
    store: S,
}

impl<S: Store> Workbook<S> {
    pub fn new(store: S) -> Self {
        Workbook { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Last committed value and result of a cell.
    pub fn get_cell(&self, sheet_id: &str, cell_id: &str) -> Result<CellData> {
        self.store
            .get_cell(&sheet_id.to_lowercase(), &cell_id.to_lowercase())
    }

    /// Last committed values of every cell in a sheet.
    pub fn get_sheet(&self, sheet_id: &str) -> Result<BTreeMap<String, CellData>> {
        self.store.get_sheet(&sheet_id.to_lowercase())
    }
}
