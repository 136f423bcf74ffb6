//! Persistence contract for cells and their dependency edges.
//!
//! [`Store`] is the shared handle used for committed reads and for opening
//! transactions. Every write, and every read that a write depends on, goes
//! through one [`StoreTx`] so recursive recomputation sees its own writes.
//! Dropping a transaction without calling [`StoreTx::commit`] rolls it back.
//!
//! - [`SqliteStore`] - the authoritative SQLite implementation
//! - [`MemoryStore`] - in-memory implementation used by tests

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::Result;

/// Committed view of a single cell.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CellData {
    pub value: String,
    pub result: f64,
}

/// A stored cell including its surrogate identity.
#[derive(Clone, Debug, PartialEq)]
pub struct CellRecord {
    pub id: i64,
    pub sheet_id: String,
    pub cell_id: String,
    pub raw_value: String,
    pub result: f64,
}

/// Everything written for one cell: value, result and the full edge set.
#[derive(Clone, Debug, PartialEq)]
pub struct CellWrite {
    pub sheet_id: String,
    pub cell_id: String,
    pub raw_value: String,
    pub result: f64,
    pub dependencies: BTreeSet<String>,
}

/// Outcome of an upsert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Upserted {
    pub id: i64,
    /// `true` if the row existed before the write.
    pub updated: bool,
}

/// Shared storage handle.
pub trait Store: Send + Sync {
    /// Committed value of one cell. Missing rows and empty values are `NotFound`.
    fn get_cell(&self, sheet_id: &str, cell_id: &str) -> Result<CellData>;

    /// Committed values of every cell in a sheet. An empty sheet is `NotFound`.
    fn get_sheet(&self, sheet_id: &str) -> Result<BTreeMap<String, CellData>>;

    fn begin(&self) -> Result<Box<dyn StoreTx + '_>>;
}

/// Operations available inside one transaction.
pub trait StoreTx {
    /// Results of the given cells in a sheet. Missing cells are simply absent.
    fn batch_results(
        &mut self,
        sheet_id: &str,
        cell_ids: &BTreeSet<String>,
    ) -> Result<HashMap<String, f64>>;

    /// Insert or update a cell and replace its dependency edges.
    fn upsert(&mut self, cell: &CellWrite) -> Result<Upserted>;

    /// Stored dependencies of a cell (empty if the cell doesn't exist).
    fn dependencies_of(&mut self, sheet_id: &str, cell_id: &str) -> Result<Vec<String>>;

    /// Surrogate ids of the cells in `sheet_id` whose edges reference `cell_id`.
    fn dependent_ids(&mut self, sheet_id: &str, cell_id: &str) -> Result<Vec<i64>>;

    fn records_by_ids(&mut self, ids: &[i64]) -> Result<Vec<CellRecord>>;

    fn commit(self: Box<Self>) -> Result<()>;
}
