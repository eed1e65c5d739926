use crate::cell::CellValue;
use crate::error::MasterError;
use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;
use std::path::Path;

/// Header row used when the caller does not ask for another one.
pub const DEFAULT_HEADER_ROW: usize = 1;

/// First worksheet of a workbook, split into its header and the rows below it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub header: Vec<CellValue>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Load the first worksheet of a workbook file
///
/// Reads the whole file into memory and hands it to [`read_first_sheet`].
///
/// # Arguments
/// * `path` - Path to an xlsx/xls/ods workbook
/// * `header_row` - 1-based row of the sheet holding the column names
pub fn read_first_sheet_from_path(
    path: impl AsRef<Path>,
    header_row: usize,
) -> Result<RawSheet, MasterError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| MasterError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    read_first_sheet(bytes, header_row)
}

/// Parse the first worksheet of an in-memory workbook
///
/// The header row is counted from the top of the sheet, not from the first
/// non-empty row, so blank leading rows still count towards the offset. A
/// header row that sits above the used range yields a header of blank cells.
///
/// # Arguments
/// * `bytes` - Raw workbook content (for example an uploaded file)
/// * `header_row` - 1-based row of the sheet holding the column names
///
/// # Returns
/// * `Result<RawSheet, MasterError>` - Header cells plus every row below them
pub fn read_first_sheet(bytes: Vec<u8>, header_row: usize) -> Result<RawSheet, MasterError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(MasterError::NoSheet)??;

    split_header(&range, header_row)
}

fn split_header(range: &Range<Data>, header_row: usize) -> Result<RawSheet, MasterError> {
    let (first_row, _) = range.start().ok_or(MasterError::EmptySheet)?;
    let first_row = first_row as usize;
    let last = first_row + range.height();

    if header_row == 0 || header_row > last {
        return Err(MasterError::HeaderRow {
            row: header_row,
            last,
        });
    }

    let rows: Vec<Vec<CellValue>> = range
        .rows()
        .map(|row| row.iter().map(CellValue::from).collect())
        .collect();

    let header_index = header_row - 1;
    if header_index < first_row {
        return Ok(RawSheet {
            header: vec![CellValue::Empty; range.width()],
            rows,
        });
    }

    let mut rows = rows.into_iter().skip(header_index - first_row);
    let header = rows.next().unwrap_or_default();
    Ok(RawSheet {
        header,
        rows: rows.collect(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_xlsxwriter::{Workbook, Worksheet};

    /// Builds an xlsx where cells that parse as numbers are written as numbers.
    pub(crate) fn workbook(rows: &[&[&str]]) -> Vec<u8> {
        workbook_at(0, rows)
    }

    pub(crate) fn workbook_at(first_row: u32, rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let mut worksheet = Worksheet::new();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let (r, c) = (first_row + r as u32, c as u16);
                if value.is_empty() {
                    continue;
                }
                let written = match value.parse::<f64>() {
                    Ok(n) => worksheet.write_number(r, c, n).map(|_| ()),
                    Err(_) => worksheet.write_string(r, c, *value).map(|_| ()),
                };
                written.unwrap();
            }
        }
        workbook.push_worksheet(worksheet);
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn reads_header_and_rows() {
        let bytes = workbook(&[&["LINE No", "Weld No"], &["L1", "W1"], &["L2", "7"]]);
        let sheet = read_first_sheet(bytes, DEFAULT_HEADER_ROW).unwrap();

        assert_eq!(
            sheet.header,
            vec![CellValue::text("LINE No"), CellValue::text("Weld No")]
        );
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[1][1], CellValue::Float(7.0));
    }

    #[test]
    fn header_offset_skips_title_rows() {
        let bytes = workbook(&[
            &["Project BOP", ""],
            &["", ""],
            &["LINE No", "Weld No"],
            &["L1", "W1"],
        ]);
        let sheet = read_first_sheet(bytes, 3).unwrap();

        assert_eq!(sheet.header[0], CellValue::text("LINE No"));
        assert_eq!(sheet.rows, vec![vec![CellValue::text("L1"), CellValue::text("W1")]]);
    }

    #[test]
    fn header_offset_counts_blank_leading_rows() {
        let bytes = workbook_at(2, &[&["LINE No", "Weld No"], &["L1", "W1"]]);
        let sheet = read_first_sheet(bytes, 3).unwrap();

        assert_eq!(sheet.header[1], CellValue::text("Weld No"));
        assert_eq!(sheet.rows.len(), 1);
    }

    #[test]
    fn header_row_beyond_sheet_is_an_error() {
        let bytes = workbook(&[&["A"], &["1"]]);
        let err = read_first_sheet(bytes, 5).unwrap_err();
        assert!(matches!(err, MasterError::HeaderRow { row: 5, last: 2 }));

        let bytes = workbook(&[&["A"], &["1"]]);
        assert!(matches!(
            read_first_sheet(bytes, 0),
            Err(MasterError::HeaderRow { row: 0, .. })
        ));
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let err = read_first_sheet(b"not a workbook".to_vec(), 1).unwrap_err();
        assert!(matches!(err, MasterError::Workbook(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_first_sheet_from_path(dir.path().join("bop.xlsx"), 1).unwrap_err();
        assert!(matches!(err, MasterError::Read { .. }));
    }
}
