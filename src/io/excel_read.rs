use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};

use crate::error::{Result, SyncError};

/// Sheet holding the indicator definition table.
pub const DEFINITION_SHEET: &str = "Sheet1";

const BOARD_HEADER: &str = "板块";
const NAME_HEADER: &str = "经济指标";
const ENGLISH_HEADER: &str = "Indicator";
const CODE_HEADER: &str = "FRED 代码";

/// One row of the definition table after column inheritance has been applied.
///
/// The board and code columns model merged spreadsheet cells: a blank cell
/// inherits the nearest preceding non-blank value in that column. The display
/// name and english name columns are taken as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub board: String,
    pub name: String,
    pub english_name: String,
    pub code: String,
}

/// Reads the definition table from the given workbook.
///
/// Rows carrying neither a board nor a display name are discarded. Any
/// structural problem (missing sheet, missing header) is fatal to the run.
pub fn read_rows(path: &Path) -> Result<Vec<SourceRow>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = read_required_sheet(&mut workbook, DEFINITION_SHEET)?;

    let headers: Vec<String> = match range.rows().next() {
        Some(first_row) => first_row
            .iter()
            .map(|cell| cell_to_string(Some(cell)))
            .collect(),
        None => Vec::new(),
    };

    let board_col = column_index(&headers, BOARD_HEADER)?;
    let name_col = column_index(&headers, NAME_HEADER)?;
    let english_col = column_index(&headers, ENGLISH_HEADER)?;
    let code_col = column_index(&headers, CODE_HEADER)?;

    let mut rows = Vec::new();
    let mut inherited_board = String::new();
    let mut inherited_code = String::new();

    for row in range.rows().skip(1) {
        let board = cell_to_string(row.get(board_col));
        if !board.is_empty() {
            inherited_board = board;
        }
        let code = cell_to_string(row.get(code_col));
        if !code.is_empty() {
            inherited_code = code;
        }

        let name = cell_to_string(row.get(name_col));
        if inherited_board.is_empty() && name.is_empty() {
            continue;
        }

        rows.push(SourceRow {
            board: inherited_board.clone(),
            name,
            english_name: cell_to_string(row.get(english_col)),
            code: inherited_code.clone(),
        });
    }

    Ok(rows)
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<calamine::Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| SyncError::InvalidSheet(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(SyncError::from)?;
    Ok(range)
}

fn column_index(headers: &[String], header: &str) -> Result<usize> {
    headers
        .iter()
        .position(|cell| cell.trim() == header)
        .ok_or_else(|| SyncError::InvalidSheet(format!("missing column '{header}'")))
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
