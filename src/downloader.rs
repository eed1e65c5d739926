use crate::cell::CellValue;
use crate::error::ExportError;
use crate::production::LogTable;
use rust_xlsxwriter::{Workbook, Worksheet};

/// File name offered to the browser for the exported log.
pub const EXPORT_FILE_NAME: &str = "daily_production.xlsx";

// Largest magnitude with every integer below it representable in an f64.
const MAX_EXACT_INT: u64 = 1 << 53;

/// Convert the production log to XLSX format
///
/// Writes a single worksheet: the first row holds the column names, then one
/// row per entry. There is no index column. Text is written as strings,
/// numbers as numbers and booleans as booleans; dates are written in their
/// string form and empty cells are left blank. Integers that an f64 cannot
/// hold exactly are written as text so their digits survive.
///
/// # Arguments
/// * `table` - The log to serialize
///
/// # Returns
/// * `Result<Vec<u8>, ExportError>` - XLSX file content as bytes or an error
pub fn to_xlsx(table: &LogTable) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();

    for (c, name) in table.columns.iter().enumerate() {
        worksheet.write_string(0, column_number(c)?, name)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let r = u32::try_from(r + 1)
            .map_err(|_| ExportError::TooLarge(format!("{} rows", table.rows.len())))?;
        for (c, value) in row.iter().enumerate() {
            let c = column_number(c)?;
            match value {
                CellValue::Empty => {}
                CellValue::Text(s) if s.is_empty() => {}
                CellValue::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                CellValue::Int(i) if i.unsigned_abs() <= MAX_EXACT_INT => {
                    worksheet.write_number(r, c, *i as f64)?;
                }
                CellValue::Float(x) => {
                    worksheet.write_number(r, c, *x)?;
                }
                CellValue::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
                other => {
                    worksheet.write_string(r, c, &other.to_string())?;
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);
    Ok(workbook.save_to_buffer()?)
}

fn column_number(index: usize) -> Result<u16, ExportError> {
    u16::try_from(index).map_err(|_| ExportError::TooLarge(format!("{} columns", index + 1)))
}
