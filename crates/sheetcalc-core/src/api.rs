//! Request surface: payload types, identifier screening and status mapping.
//!
//! Every function returns a [`Response`] whose body serializes to the JSON a
//! client sees.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use sheetcalc_engine::engine::{ERROR_RESULT, format_result};

use crate::error::SheetError;
use crate::store::{CellData, Store};
use crate::workbook::Workbook;

/// Body of a write: `{"value": "=a+1"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub value: String,
}

/// A cell as returned to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellResponse {
    pub value: String,
    /// Six fractional digits, or `"ERROR"` for a rejected write.
    pub result: String,
}

impl From<CellData> for CellResponse {
    fn from(cell: CellData) -> Self {
        CellResponse {
            value: cell.value,
            result: format_result(cell.result),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    /// Numeric status as a string, e.g. `"404"`.
    pub code: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    Created,
    NotFound,
    Unprocessable,
    InternalError,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Created => 201,
            Status::NotFound => 404,
            Status::Unprocessable => 422,
            Status::InternalError => 500,
        }
    }

    pub fn is_success(self) -> bool {
        (200..300).contains(&self.code())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Body {
    Cell(CellResponse),
    Sheet(BTreeMap<String, CellResponse>),
    Error(ErrorBody),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status: Status,
    pub body: Body,
}

impl Response {
    fn new(status: Status, body: Body) -> Self {
        Response { status, body }
    }

    fn error(status: Status, message: &str) -> Self {
        Response::new(
            status,
            Body::Error(ErrorBody {
                message: message.to_string(),
                code: status.code().to_string(),
            }),
        )
    }
}

/// Whether a (lowercased) sheet or cell ID is acceptable.
pub fn is_valid_identifier(id: &str) -> bool {
    static IDENT_RE: OnceLock<Regex> = OnceLock::new();
    IDENT_RE
        .get_or_init(|| {
            Regex::new(r"^[a-z0-9\-_.~%!$&'()*+,;=:@/\[\]?#]+$")
                .expect("identifier regex must compile")
        })
        .is_match(id)
}

fn normalize_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Option<Vec<String>> {
    ids.into_iter()
        .map(str::to_lowercase)
        .map(|id| is_valid_identifier(&id).then_some(id))
        .collect()
}

/// Write a cell. `201` with the stored value on success; `422` echoing the
/// attempted value with an `"ERROR"` result otherwise.
pub fn write_cell<S: Store>(
    workbook: &Workbook<S>,
    sheet_id: &str,
    cell_id: &str,
    request: &WriteRequest,
) -> Response {
    let Some(ids) = normalize_ids([sheet_id, cell_id]) else {
        return Response::error(Status::Unprocessable, "not correct params");
    };

    match workbook.write(&ids[0], &ids[1], &request.value) {
        Ok(outcome) => Response::new(
            Status::Created,
            Body::Cell(CellResponse {
                value: outcome.value,
                result: format_result(outcome.result),
            }),
        ),
        Err(err) => {
            warn!(
                sheet = %ids[0],
                cell = %ids[1],
                value = %request.value,
                code = err.code(),
                error = %err,
                "write rejected"
            );
            Response::new(
                Status::Unprocessable,
                Body::Cell(CellResponse {
                    value: request.value.clone(),
                    result: ERROR_RESULT.to_string(),
                }),
            )
        }
    }
}

/// Read one cell.
pub fn read_cell<S: Store>(workbook: &Workbook<S>, sheet_id: &str, cell_id: &str) -> Response {
    let Some(ids) = normalize_ids([sheet_id, cell_id]) else {
        return Response::error(Status::NotFound, "not correct params");
    };

    match workbook.get_cell(&ids[0], &ids[1]) {
        Ok(cell) => Response::new(Status::Ok, Body::Cell(cell.into())),
        Err(err) => read_failure(err),
    }
}

/// Read every cell of a sheet, keyed by cell ID.
pub fn read_sheet<S: Store>(workbook: &Workbook<S>, sheet_id: &str) -> Response {
    let Some(ids) = normalize_ids([sheet_id]) else {
        return Response::error(Status::NotFound, "not correct params");
    };

    match workbook.get_sheet(&ids[0]) {
        Ok(cells) => Response::new(
            Status::Ok,
            Body::Sheet(
                cells
                    .into_iter()
                    .map(|(id, cell)| (id, cell.into()))
                    .collect(),
            ),
        ),
        Err(err) => read_failure(err),
    }
}

fn read_failure(err: SheetError) -> Response {
    match err {
        SheetError::NotFound(_) => Response::error(Status::NotFound, "value not found"),
        err => {
            warn!(error = %err, "read failed");
            Response::error(Status::InternalError, "store not responded")
        }
    }
}
