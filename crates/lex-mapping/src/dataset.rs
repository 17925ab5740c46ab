//! Dataset ingestion and export.
//!
//! Uploaded files (CSV, TSV, JSON, NDJSON, Parquet and, with the `excel`
//! feature, spreadsheets) are read into a Polars [`DataFrame`]; only the
//! column names take part in classification and mapping. After confirmation the
//! input columns are renamed to their standard names and the result is
//! written as CSV.

use crate::error::{MappingError, Result, ResultExt};
use crate::reconcile::ConfirmedMapping;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File formats that can be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    Tsv,
    Json,
    NdJson,
    Parquet,
    /// First worksheet of an `xlsx`, `xlsm`, `xls` or `ods` workbook.
    Spreadsheet,
}

impl DatasetFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            "json" => Ok(Self::Json),
            "ndjson" | "jsonl" => Ok(Self::NdJson),
            "parquet" => Ok(Self::Parquet),
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(Self::Spreadsheet),
            "" => Err(MappingError::UnsupportedFormat(format!(
                "{} has no file extension",
                path.display()
            ))),
            other => Err(MappingError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Load a dataset, choosing the reader from the file extension.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let format = DatasetFormat::from_path(path)?;
    debug!("Loading {} as {:?}", path.display(), format);

    let df = match format {
        DatasetFormat::Spreadsheet => read_spreadsheet(path),
        _ => read_with_polars(path, format).map_err(MappingError::from),
    }
    .context(format!("Failed to read {}", path.display()))?;

    info!(
        "Loaded {}: {} rows x {} columns",
        path.display(),
        df.height(),
        df.width()
    );
    Ok(df)
}

/// Formats Polars reads natively.
fn read_with_polars(path: &Path, format: DatasetFormat) -> PolarsResult<DataFrame> {
    match format {
        DatasetFormat::Csv | DatasetFormat::Tsv => {
            let separator = if format == DatasetFormat::Tsv { b'\t' } else { b',' };
            CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(1000))
                .with_parse_options(
                    CsvParseOptions::default()
                        .with_separator(separator)
                        .with_quote_char(Some(b'"')),
                )
                .try_into_reader_with_file_path(Some(path.to_path_buf()))?
                .finish()
        }
        DatasetFormat::Json => JsonReader::new(File::open(path)?).finish(),
        DatasetFormat::NdJson => JsonReader::new(File::open(path)?)
            .with_json_format(JsonFormat::JsonLines)
            .finish(),
        DatasetFormat::Parquet => ParquetReader::new(File::open(path)?).finish(),
        DatasetFormat::Spreadsheet => Err(PolarsError::ComputeError(
            "spreadsheets are not read by Polars".into(),
        )),
    }
}

/// Read the first worksheet; its first row holds the column names.
///
/// Columns whose cells are all numbers become `Float64`, all booleans
/// become `Boolean`, anything else is read as text. Empty cells are null.
#[cfg(feature = "excel")]
fn read_spreadsheet(path: &Path) -> Result<DataFrame> {
    use calamine::{Reader, open_workbook_auto};

    let mut workbook = open_workbook_auto(path)?;
    let sheet = workbook.sheet_names().first().cloned().ok_or_else(|| {
        MappingError::UnsupportedFormat(format!("{} has no worksheets", path.display()))
    })?;
    let range = workbook.worksheet_range(&sheet)?;

    let mut rows = range.rows();
    let header = rows.next().ok_or_else(|| {
        MappingError::UnsupportedFormat(format!("worksheet '{}' is empty", sheet))
    })?;
    let names: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell.to_string().trim() {
            "" => format!("column_{}", i + 1),
            name => name.to_string(),
        })
        .collect();
    let body: Vec<_> = rows.collect();

    let columns = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let cells: Vec<Option<&calamine::Data>> = body
                .iter()
                .map(|row| row.get(i).filter(|cell| !matches!(cell, calamine::Data::Empty)))
                .collect();
            spreadsheet_column(name, &cells)
        })
        .collect();

    let df = DataFrame::new(columns)?;
    debug!("Read worksheet '{}' from {}", sheet, path.display());
    Ok(df)
}

#[cfg(feature = "excel")]
fn spreadsheet_column(name: &str, cells: &[Option<&calamine::Data>]) -> Column {
    use calamine::Data;

    let present: Vec<&Data> = cells.iter().flatten().copied().collect();
    if !present.is_empty() && present.iter().all(|c| matches!(c, Data::Int(_) | Data::Float(_))) {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|cell| match cell {
                Some(Data::Int(v)) => Some(*v as f64),
                Some(Data::Float(v)) => Some(*v),
                _ => None,
            })
            .collect();
        return Column::new(name.into(), values);
    }
    if !present.is_empty() && present.iter().all(|c| matches!(c, Data::Bool(_))) {
        let values: Vec<Option<bool>> = cells
            .iter()
            .map(|cell| match cell {
                Some(Data::Bool(v)) => Some(*v),
                _ => None,
            })
            .collect();
        return Column::new(name.into(), values);
    }

    let values: Vec<Option<String>> = cells
        .iter()
        .map(|cell| cell.map(|c| c.to_string()))
        .collect();
    Column::new(name.into(), values)
}

#[cfg(not(feature = "excel"))]
fn read_spreadsheet(path: &Path) -> Result<DataFrame> {
    Err(MappingError::UnsupportedFormat(format!(
        "{}: spreadsheet support requires the \"excel\" feature",
        path.display()
    )))
}

/// Column names of `df`, in order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Rename mapped input columns to their standard names.
///
/// Columns without a mapping keep their names. All renames are applied at
/// once, so swapping names between columns works.
///
/// # Errors
///
/// [`MappingError::UnknownInputColumn`] when a mapped input column is not
/// in `df`. A Polars error when a renamed column would collide with an
/// unmapped column of the same name.
pub fn apply_mapping(df: &mut DataFrame, confirmed: &ConfirmedMapping) -> Result<()> {
    let renames = confirmed.rename_pairs();
    let current = column_names(df);

    let present: HashSet<&str> = current.iter().map(String::as_str).collect();
    if let Some(missing) = renames.keys().find(|input| !present.contains(input.as_str())) {
        return Err(MappingError::UnknownInputColumn(missing.clone()));
    }

    let renamed: Vec<String> = current
        .iter()
        .map(|name| renames.get(name).unwrap_or(name).clone())
        .collect();

    df.set_column_names(renamed)
        .context("Failed to rename mapped columns")?;
    debug!("Renamed {} columns", renames.len());
    Ok(())
}

/// Write `df` as CSV with a header row, creating parent directories.
pub fn write_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)
        .context(format!("Failed to write {}", path.display()))?;

    info!("Dataset saved: {}", path.display());
    Ok(())
}

/// Apply `confirmed` to `df` and write it to `<output_dir>/<output_name>.csv`.
pub fn export_mapped(
    mut df: DataFrame,
    confirmed: &ConfirmedMapping,
    output_dir: impl AsRef<Path>,
    output_name: &str,
) -> Result<PathBuf> {
    apply_mapping(&mut df, confirmed)?;
    let path = output_dir.as_ref().join(format!("{}.csv", output_name));
    write_csv(&mut df, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, ColumnMapping};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample_df() -> DataFrame {
        df! {
            "invoice_amt" => [10.5, 20.0],
            "invoice_date" => ["2024-01-01", "2024-02-01"],
            "notes" => ["a", "b"],
        }
        .unwrap()
    }

    fn confirmed(pairs: &[(&str, &str)]) -> ConfirmedMapping {
        let mut mapping = ColumnMapping::new();
        for (standard, input) in pairs {
            mapping.insert(*standard, Some(input.to_string()));
        }
        mapping.insert("DueDate", None);
        ConfirmedMapping {
            category: Category::Billing,
            mapping,
            confirmed_at: Utc::now(),
        }
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            DatasetFormat::from_path(Path::new("data.CSV")).unwrap(),
            DatasetFormat::Csv
        );
        assert_eq!(
            DatasetFormat::from_path(Path::new("data.jsonl")).unwrap(),
            DatasetFormat::NdJson
        );
        assert_eq!(
            DatasetFormat::from_path(Path::new("report.XLSX")).unwrap(),
            DatasetFormat::Spreadsheet
        );
        assert!(matches!(
            DatasetFormat::from_path(Path::new("data.numbers")).unwrap_err(),
            MappingError::UnsupportedFormat(_)
        ));
        assert!(DatasetFormat::from_path(Path::new("data")).is_err());
    }

    #[test]
    fn test_apply_mapping_renames_mapped_columns_only() {
        let mut df = sample_df();
        apply_mapping(
            &mut df,
            &confirmed(&[("Revenue", "invoice_amt"), ("BillingDate", "invoice_date")]),
        )
        .unwrap();

        assert_eq!(column_names(&df), vec!["Revenue", "BillingDate", "notes"]);
    }

    #[test]
    fn test_apply_mapping_swaps_names() {
        let mut df = df! { "a" => [1], "b" => [2] }.unwrap();
        apply_mapping(&mut df, &confirmed(&[("a", "b"), ("b", "a")])).unwrap();

        assert_eq!(column_names(&df), vec!["b", "a"]);
    }

    #[test]
    fn test_apply_mapping_missing_input() {
        let mut df = sample_df();
        let err = apply_mapping(&mut df, &confirmed(&[("Revenue", "amount")])).unwrap_err();
        assert!(matches!(err, MappingError::UnknownInputColumn(ref c) if c == "amount"));
    }

    #[test]
    fn test_export_and_reload_csv() {
        let dir = TempDir::new().unwrap();
        let path = export_mapped(
            sample_df(),
            &confirmed(&[("Revenue", "invoice_amt")]),
            dir.path().join("out"),
            "mapped_data",
        )
        .unwrap();

        assert_eq!(path, dir.path().join("out").join("mapped_data.csv"));
        let reloaded = load_dataset(&path).unwrap();
        assert_eq!(
            column_names(&reloaded),
            vec!["Revenue", "invoice_date", "notes"]
        );
        assert_eq!(reloaded.height(), 2);
    }

    #[test]
    fn test_load_tsv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.tsv");
        fs::write(&path, "cust_id\tamount\n1\t9.5\n").unwrap();

        let df = load_dataset(&path).unwrap();
        assert_eq!(column_names(&df), vec!["cust_id", "amount"]);
    }

    #[test]
    fn test_load_ndjson() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.ndjson");
        fs::write(&path, "{\"ticket\": 1, \"opened\": \"2024-01-01\"}\n").unwrap();

        let df = load_dataset(&path).unwrap();
        assert_eq!(df.height(), 1);
        assert!(column_names(&df).contains(&"ticket".to_string()));
    }

    #[cfg(feature = "excel")]
    #[test]
    fn test_load_spreadsheet_first_sheet() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/billing_small.xlsx");

        let df = load_dataset(&path).unwrap();
        assert_eq!(column_names(&df), vec!["inv_id", "amt", "due"]);
        assert_eq!(df.height(), 3);
        assert_eq!(df.column("amt").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("due").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("due").unwrap().null_count(), 1);
    }

    #[cfg(feature = "excel")]
    #[test]
    fn test_corrupt_spreadsheet_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.xlsx");
        fs::write(&path, "not a workbook").unwrap();

        let err = load_dataset(&path).unwrap_err();
        assert_eq!(err.error_code(), "SPREADSHEET_ERROR");
    }
}
