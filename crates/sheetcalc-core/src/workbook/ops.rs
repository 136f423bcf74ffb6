use std::collections::{BTreeSet, HashMap};

use sheetcalc_engine::engine::{
    calculate, detect_cycle, extract_references, format_result, recompute_order,
    substitute_references, validate_raw_value,
};
use tracing::{debug, info};

use super::Workbook;
use crate::error::{Result, SheetError};
use crate::store::{CellRecord, CellWrite, Store, StoreTx};

/// Result of a top-level write.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteOutcome {
    /// Stored (lowercased) raw value.
    pub value: String,
    pub result: f64,
    pub dependencies: BTreeSet<String>,
    /// `true` if the cell existed before this write.
    pub updated: bool,
    /// Dependents recomputed by this write, in the order they were recomputed.
    pub recomputed: Vec<String>,
}

/// What was stored for a single cell.
struct Stored {
    value: String,
    result: f64,
    dependencies: BTreeSet<String>,
    updated: bool,
}

impl<S: Store> Workbook<S> {
    /// Write a raw value to a cell and recompute everything depending on it.
    ///
    /// Runs in one transaction: either the cell and all of its recomputed
    /// dependents are committed, or nothing is.
    pub fn write(&self, sheet_id: &str, cell_id: &str, raw_value: &str) -> Result<WriteOutcome> {
        let sheet_id = sheet_id.to_lowercase();
        let cell_id = cell_id.to_lowercase();

        let mut tx = self.store.begin()?;
        let stored = evaluate_and_store(tx.as_mut(), &sheet_id, &cell_id, raw_value)?;
        let recomputed = if stored.updated {
            recompute_dependents(tx.as_mut(), &sheet_id, &cell_id)?
        } else {
            Vec::new()
        };
        tx.commit()?;

        info!(
            sheet = %sheet_id,
            cell = %cell_id,
            updated = stored.updated,
            recomputed = recomputed.len(),
            "cell written"
        );

        Ok(WriteOutcome {
            value: stored.value,
            result: stored.result,
            dependencies: stored.dependencies,
            updated: stored.updated,
            recomputed,
        })
    }
}

/// Validate, resolve, evaluate and upsert one cell inside `tx`.
fn evaluate_and_store(
    tx: &mut dyn StoreTx,
    sheet_id: &str,
    cell_id: &str,
    raw_value: &str,
) -> Result<Stored> {
    validate_raw_value(raw_value)?;
    let value = raw_value.to_lowercase();

    let references = extract_references(&value);
    if references.contains(cell_id) {
        return Err(SheetError::SelfReference(cell_id.to_string()));
    }
    if let Some(path) = detect_cycle(cell_id, &references, |c| tx.dependencies_of(sheet_id, c))? {
        return Err(SheetError::CircularDependency(path));
    }

    let expression = if references.is_empty() {
        value.clone()
    } else {
        let resolved: HashMap<String, String> = tx
            .batch_results(sheet_id, &references)?
            .into_iter()
            .map(|(id, result)| (id, format_result(result)))
            .collect();
        substitute_references(&value, &resolved)
    };

    let result = calculate(&expression)?;
    if result.is_nan() {
        return Err(SheetError::Arithmetic("result is not a number".to_string()));
    }

    let upserted = tx.upsert(&CellWrite {
        sheet_id: sheet_id.to_string(),
        cell_id: cell_id.to_string(),
        raw_value: value.clone(),
        result,
        dependencies: references.clone(),
    })?;
    debug!(sheet = %sheet_id, cell = %cell_id, %expression, result, "evaluated cell");

    Ok(Stored {
        value,
        result,
        dependencies: references,
        updated: upserted.updated,
    })
}

/// Recompute every transitive dependent of `cell_id` once, inputs first.
fn recompute_dependents(
    tx: &mut dyn StoreTx,
    sheet_id: &str,
    cell_id: &str,
) -> Result<Vec<String>> {
    let mut records: HashMap<String, CellRecord> = HashMap::new();
    let order = recompute_order::<SheetError, _>(cell_id, |current| {
        let ids = tx.dependent_ids(sheet_id, current)?;
        let mut dependents = Vec::with_capacity(ids.len());
        for record in tx.records_by_ids(&ids)? {
            dependents.push(record.cell_id.clone());
            records.insert(record.cell_id.clone(), record);
        }
        Ok(dependents)
    })?;

    for dependent in &order {
        if let Some(record) = records.get(dependent) {
            debug!(sheet = %sheet_id, cell = %dependent, trigger = %cell_id, "recomputing dependent");
            // Only the inputs changed; the stored formula is evaluated again as-is.
            evaluate_and_store(tx, &record.sheet_id, &record.cell_id, &record.raw_value)?;
        }
    }
    Ok(order)
}
