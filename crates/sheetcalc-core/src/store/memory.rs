use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{CellData, CellRecord, CellWrite, Store, StoreTx, Upserted};
use crate::error::{Result, SheetError};

#[derive(Clone, Debug)]
struct MemoryRow {
    sheet_id: String,
    cell_id: String,
    raw_value: String,
    result: f64,
    dependencies: BTreeSet<String>,
}

#[derive(Clone, Debug, Default)]
struct MemoryState {
    next_id: i64,
    rows: BTreeMap<i64, MemoryRow>,
    index: HashMap<(String, String), i64>,
    /// Cell IDs whose upserts fail, for exercising rollback paths.
    failing_cells: HashSet<String>,
}

impl MemoryState {
    fn row(&self, sheet_id: &str, cell_id: &str) -> Option<&MemoryRow> {
        self.index
            .get(&(sheet_id.to_string(), cell_id.to_string()))
            .and_then(|id| self.rows.get(id))
    }
}

/// In-memory cell store.
///
/// A transaction works on a private copy of the committed state and swaps it
/// in on commit, so an abandoned transaction leaves no trace. The committed
/// state stays locked for the lifetime of the transaction.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later upsert of `cell_id` fail with a storage error.
    pub fn fail_upserts_of(&self, cell_id: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_cells.insert(cell_id.to_string());
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| SheetError::Storage("memory store lock poisoned".to_string()))
    }
}

impl Store for MemoryStore {
    fn get_cell(&self, sheet_id: &str, cell_id: &str) -> Result<CellData> {
        let state = self.lock()?;
        match state.row(sheet_id, cell_id) {
            Some(row) if !row.raw_value.is_empty() => Ok(CellData {
                value: row.raw_value.clone(),
                result: row.result,
            }),
            _ => Err(SheetError::NotFound(format!("cell {}/{}", sheet_id, cell_id))),
        }
    }

    fn get_sheet(&self, sheet_id: &str) -> Result<BTreeMap<String, CellData>> {
        let state = self.lock()?;
        let cells: BTreeMap<String, CellData> = state
            .rows
            .values()
            .filter(|row| row.sheet_id == sheet_id)
            .map(|row| {
                (
                    row.cell_id.clone(),
                    CellData {
                        value: row.raw_value.clone(),
                        result: row.result,
                    },
                )
            })
            .collect();

        if cells.is_empty() {
            return Err(SheetError::NotFound(format!("sheet {}", sheet_id)));
        }
        Ok(cells)
    }

    fn begin(&self) -> Result<Box<dyn StoreTx + '_>> {
        let committed = self.lock()?;
        let working = committed.clone();
        Ok(Box::new(MemoryTx { committed, working }))
    }
}

struct MemoryTx<'a> {
    committed: MutexGuard<'a, MemoryState>,
    working: MemoryState,
}

impl StoreTx for MemoryTx<'_> {
    fn batch_results(
        &mut self,
        sheet_id: &str,
        cell_ids: &BTreeSet<String>,
    ) -> Result<HashMap<String, f64>> {
        Ok(cell_ids
            .iter()
            .filter_map(|cell_id| {
                self.working
                    .row(sheet_id, cell_id)
                    .map(|row| (cell_id.clone(), row.result))
            })
            .collect())
    }

    fn upsert(&mut self, cell: &CellWrite) -> Result<Upserted> {
        if self.working.failing_cells.contains(&cell.cell_id) {
            return Err(SheetError::Storage(format!(
                "write of {} rejected",
                cell.cell_id
            )));
        }

        let key = (cell.sheet_id.clone(), cell.cell_id.clone());
        let row = MemoryRow {
            sheet_id: cell.sheet_id.clone(),
            cell_id: cell.cell_id.clone(),
            raw_value: cell.raw_value.clone(),
            result: cell.result,
            dependencies: cell.dependencies.clone(),
        };

        match self.working.index.get(&key).copied() {
            Some(id) => {
                self.working.rows.insert(id, row);
                Ok(Upserted { id, updated: true })
            }
            None => {
                self.working.next_id += 1;
                let id = self.working.next_id;
                self.working.rows.insert(id, row);
                self.working.index.insert(key, id);
                Ok(Upserted { id, updated: false })
            }
        }
    }

    fn dependencies_of(&mut self, sheet_id: &str, cell_id: &str) -> Result<Vec<String>> {
        Ok(self
            .working
            .row(sheet_id, cell_id)
            .map(|row| row.dependencies.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn dependent_ids(&mut self, sheet_id: &str, cell_id: &str) -> Result<Vec<i64>> {
        Ok(self
            .working
            .rows
            .iter()
            .filter(|(_, row)| row.sheet_id == sheet_id && row.dependencies.contains(cell_id))
            .map(|(id, _)| *id)
            .collect())
    }

    fn records_by_ids(&mut self, ids: &[i64]) -> Result<Vec<CellRecord>> {
        let wanted: BTreeSet<i64> = ids.iter().copied().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| {
                self.working.rows.get(&id).map(|row| CellRecord {
                    id,
                    sheet_id: row.sheet_id.clone(),
                    cell_id: row.cell_id.clone(),
                    raw_value: row.raw_value.clone(),
                    result: row.result,
                })
            })
            .collect())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx {
            mut committed,
            working,
        } = *self;
        *committed = working;
        Ok(())
    }
}
