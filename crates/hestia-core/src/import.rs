//! Spreadsheet and CSV rows as header-keyed records.
//!
//! Only the first sheet is read and its first row is the header. Callers turn
//! each [`Row`] into an entity with their own alias list and defaults.

use std::collections::BTreeMap;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use chrono::{Duration, NaiveDate};
use tracing::{debug, info, instrument};

use crate::error::ImportError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: BTreeMap<String, String>,
}

impl Row {
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells.get(header).map(String::as_str)
    }

    /// First alias whose cell is present and not blank.
    pub fn first(&self, aliases: &[&str]) -> Option<&str> {
        aliases
            .iter()
            .filter_map(|alias| self.get(alias))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    pub fn is_blank(&self) -> bool {
        self.cells.values().all(|v| v.trim().is_empty())
    }
}

/// Reads every data row of `path` and hands each to `convert`.
#[instrument(skip(convert), fields(path = %path.display()))]
pub fn import_with<T, F>(path: &Path, convert: F) -> Result<Vec<T>, ImportError>
where
    F: FnMut(&Row) -> T,
{
    let rows = read_rows(path)?;
    Ok(rows.iter().map(convert).collect())
}

#[instrument(fields(path = %path.display()))]
pub fn read_rows(path: &Path) -> Result<Vec<Row>, ImportError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let rows = match ext.as_str() {
        "csv" => read_csv(path)?,
        "xlsx" | "xls" | "xlsm" | "ods" => read_workbook(path)?,
        other => return Err(ImportError::UnsupportedExtension(format!(".{other}"))),
    };

    info!(count = rows.len(), "read spreadsheet rows");
    Ok(rows)
}

fn read_csv(path: &Path) -> Result<Vec<Row>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    debug!(?headers, "csv headers");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = zip_row(&headers, record.iter().map(str::to_string));
        if !row.is_blank() {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn read_workbook(path: &Path) -> Result<Vec<Row>, ImportError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::NoSheets)??;

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row.iter().map(cell_to_string).collect();
    debug!(?headers, "sheet headers");

    Ok(sheet_rows
        .map(|cells| zip_row(&headers, cells.iter().map(cell_to_string)))
        .filter(|row| !row.is_blank())
        .collect())
}

fn zip_row(headers: &[String], values: impl Iterator<Item = String>) -> Row {
    let cells = headers
        .iter()
        .zip(values)
        .filter(|(header, _)| !header.is_empty())
        .map(|(header, value)| (header.clone(), value.trim().to_string()));
    Row::from_pairs(cells)
}

pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => format_float(*f),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR({e:?})"),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| format_float(dt.as_f64())),
        Data::DateTimeIso(s) => s.get(..10).unwrap_or(s.as_str()).to_string(),
        Data::DurationIso(s) => s.clone(),
    }
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Excel's day zero is 1899-12-30 once the 1900 leap-year bug is accounted for.
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Leading integer of a cell, the way a lenient form parser reads it:
/// `"5"`, `" 5 "`, `"5.7"` and `"5 kg"` are all 5.
pub fn leading_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map(|(idx, _)| idx)
        .unwrap_or(digits.len());
    let number: i64 = digits.get(..end)?.parse().ok()?;
    Some(sign * number)
}

/// A cell as a non-negative count, or `default` when it has no number.
pub fn count_or(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(leading_integer)
        .map(|n| n.clamp(0, i64::from(u32::MAX)) as u32)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::Builder;

    use super::*;

    #[test]
    fn first_skips_blank_aliases() {
        let row = Row::from_pairs([("name", " "), ("Nombre", "Arroz")]);
        assert_eq!(row.first(&["name", "Nombre", "Articulo"]), Some("Arroz"));
        assert_eq!(row.first(&["unit", "Unidad"]), None);
    }

    #[test]
    fn leading_integer_matches_lenient_parsing() {
        assert_eq!(leading_integer("5"), Some(5));
        assert_eq!(leading_integer(" 12 "), Some(12));
        assert_eq!(leading_integer("5.7"), Some(5));
        assert_eq!(leading_integer("3 kg"), Some(3));
        assert_eq!(leading_integer("-2"), Some(-2));
        assert_eq!(leading_integer("abc"), None);
        assert_eq!(leading_integer(""), None);
    }

    #[test]
    fn count_clamps_negative_values() {
        assert_eq!(count_or(Some("-4"), 1), 0);
        assert_eq!(count_or(Some("x"), 1), 1);
        assert_eq!(count_or(None, 7), 7);
    }

    #[test]
    fn whole_floats_render_without_decimals() {
        assert_eq!(cell_to_string(&Data::Float(5.0)), "5");
        assert_eq!(cell_to_string(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_to_string(&Data::Int(3)), "3");
    }

    #[test]
    fn excel_serials_become_dates() {
        assert_eq!(
            excel_serial_to_date(45292.0),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
    }

    #[test]
    fn csv_rows_are_keyed_by_header() {
        let mut file = Builder::new().suffix(".csv").tempfile().expect("tempfile");
        writeln!(file, "\u{feff}Nombre,Cantidad").unwrap();
        writeln!(file, "Arroz,5").unwrap();
        writeln!(file, ",").unwrap();
        writeln!(file, "Leche, 2 ").unwrap();
        file.flush().unwrap();

        let rows = read_rows(file.path()).expect("read csv");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Nombre"), Some("Arroz"));
        assert_eq!(rows[1].get("Cantidad"), Some("2"));
    }

    #[test]
    fn import_with_converts_every_row() {
        let mut file = Builder::new().suffix(".csv").tempfile().expect("tempfile");
        writeln!(file, "Tarea,Prioridad").unwrap();
        writeln!(file, "Lavar,Alta").unwrap();
        writeln!(file, "Planchar,").unwrap();
        file.flush().unwrap();

        let titles = import_with(file.path(), |row| {
            row.first(&["title", "Tarea"]).unwrap_or_default().to_string()
        })
        .expect("import");
        assert_eq!(titles, vec!["Lavar", "Planchar"]);
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        let err = read_rows(Path::new("inventario.pdf")).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedExtension(ext) if ext == ".pdf"));
    }

    #[test]
    fn garbage_workbook_is_an_error() {
        let mut file = Builder::new().suffix(".xlsx").tempfile().expect("tempfile");
        file.write_all(b"definitely not a zip archive").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            read_rows(file.path()),
            Err(ImportError::Workbook(_))
        ));
    }
}
