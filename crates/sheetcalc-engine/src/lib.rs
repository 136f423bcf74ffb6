//! sheetcalc_engine - Formula parsing, evaluation and reference handling.

pub mod engine;
