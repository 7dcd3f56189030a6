use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, instrument, trace};

use crate::domain::{
    EDITABLE_COLUMNS, EXPORT_FILE_NAME, EXPORT_MIME_TYPE, FEError, POSTAL_CODE_COLUMN,
};
use crate::editor::{FlagColumn, PageData, TextColumn};

/// Row range of one page. `page` is 1-based and always within `[1, total_pages]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBounds {
    pub page: usize,
    pub total_pages: usize,
    pub start: usize,
    pub end: usize,
}

impl PageBounds {
    pub fn total_pages(total_rows: usize, page_size: usize) -> usize {
        if total_rows == 0 {
            1
        } else {
            (total_rows - 1) / page_size + 1
        }
    }

    /// Clamps `page` into the valid range before computing `[start, end)`.
    pub fn new(page: usize, page_size: usize, total_rows: usize) -> Self {
        let total_pages = Self::total_pages(total_rows, page_size);
        let page = page.clamp(1, total_pages);
        let start = std::cmp::min((page - 1) * page_size, total_rows);
        let end = std::cmp::min(start + page_size, total_rows);
        PageBounds {
            page,
            total_pages,
            start,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

/// A file ready to be handed to the user.
#[derive(Debug)]
pub struct Download {
    pub file_name: &'static str,
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

impl Download {
    pub fn save(&self, dir: &Path) -> Result<PathBuf, FEError> {
        let path = dir.join(self.file_name);
        fs::write(&path, &self.data)?;
        info!(
            "Wrote {} bytes of {} to {}",
            self.data.len(),
            self.mime_type,
            path.display()
        );
        Ok(path)
    }
}

/// The uploaded dataset. All columns are held as text, the flag columns as booleans.
#[derive(Debug)]
pub struct Table {
    name: String,
    df: DataFrame,
}

impl Table {
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, FEError> {
        let path = Self::check_file(path)?;
        let start_time = Instant::now();
        let df = Self::load_csv(&path)?.collect()?;
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        let table = Self::from_frame(name, df)?;
        info!(
            "Loaded {} rows x {} columns in {}ms",
            table.height(),
            table.df.width(),
            start_time.elapsed().as_millis()
        );
        Ok(table)
    }

    /// Validates the expected columns and converts the flag columns to booleans.
    pub fn from_frame(name: String, mut df: DataFrame) -> Result<Self, FEError> {
        for required in EDITABLE_COLUMNS.iter().chain([POSTAL_CODE_COLUMN].iter()) {
            if df.column(required).is_err() {
                return Err(FEError::MissingColumn(required.to_string()));
            }
        }

        for name in EDITABLE_COLUMNS {
            let column = df.column(name)?;
            if column.dtype() == &DataType::Boolean {
                continue;
            }
            let text = column.cast(&DataType::String)?;
            let values = text
                .str()?
                .into_iter()
                .map(|value| Self::parse_flag(name, value))
                .collect::<Result<Vec<Option<bool>>, FEError>>()?;
            df.with_column(Series::new(name.into(), values))?;
            trace!("Converted column {name} to booleans");
        }

        Ok(Table { name, df })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn bounds(&self, page: usize, page_size: usize) -> PageBounds {
        PageBounds::new(page, page_size, self.height())
    }

    /// Detached copy of the rows in `bounds`, restricted to the given columns.
    pub fn page(
        &self,
        bounds: &PageBounds,
        display_columns: &[String],
        editable_columns: &[&str],
    ) -> Result<PageData, FEError> {
        let frame = self.df.slice(bounds.start as i64, bounds.len());

        let display_data = display_columns
            .par_iter()
            .map(|name| Self::text_column(&frame, name))
            .collect::<Result<Vec<TextColumn>, FEError>>()?;

        let editable = editable_columns
            .iter()
            .map(|name| Self::flag_column(&frame, name))
            .collect::<Result<Vec<FlagColumn>, FEError>>()?;

        trace!(
            "Page {}/{}: rows [{}, {}), {} display, {} editable columns",
            bounds.page,
            bounds.total_pages,
            bounds.start,
            bounds.end,
            display_data.len(),
            editable.len()
        );
        Ok(PageData::new(bounds.start, display_data, editable))
    }

    /// Writes the flag values of `edited` into rows `[start, end)` of `bounds`.
    /// Display columns of `edited` are ignored.
    pub fn commit_edits(&mut self, bounds: &PageBounds, edited: &PageData) -> Result<(), FEError> {
        for column in edited.editable() {
            if !EDITABLE_COLUMNS.contains(&column.name.as_str()) {
                return Err(FEError::EditNotAllowed(column.name.clone()));
            }
            if column.values.len() != bounds.len() {
                return Err(FEError::LoadingFailed(format!(
                    "Edited column {} has {} rows, page has {}",
                    column.name,
                    column.values.len(),
                    bounds.len()
                )));
            }

            let mut values: Vec<Option<bool>> =
                self.df.column(&column.name)?.bool()?.into_iter().collect();
            if values[bounds.start..bounds.end] == column.values[..] {
                continue;
            }
            values[bounds.start..bounds.end].copy_from_slice(&column.values);
            self.df
                .with_column(Series::new(column.name.as_str().into(), values))?;
            debug!(
                "Committed column {} for rows [{}, {})",
                column.name, bounds.start, bounds.end
            );
        }
        Ok(())
    }

    /// Full table as csv, header included, no index column.
    pub fn to_csv(&self) -> Result<Vec<u8>, FEError> {
        let mut df = self.df.clone();
        let mut buffer = Vec::new();
        CsvWriter::new(&mut buffer)
            .include_header(true)
            .finish(&mut df)?;
        Ok(buffer)
    }

    pub fn export(&self) -> Result<Download, FEError> {
        Ok(Download {
            file_name: EXPORT_FILE_NAME,
            mime_type: EXPORT_MIME_TYPE,
            data: self.to_csv()?,
        })
    }

    fn parse_flag(column: &str, value: Option<&str>) -> Result<Option<bool>, FEError> {
        let Some(value) = value else {
            return Ok(None);
        };
        let value = value.trim();
        if value.is_empty() {
            Ok(None)
        } else if value.eq_ignore_ascii_case("true") || value == "1" {
            Ok(Some(true))
        } else if value.eq_ignore_ascii_case("false") || value == "0" {
            Ok(Some(false))
        } else {
            Err(FEError::LoadingFailed(format!(
                "\"{value}\" in column {column} is not a boolean"
            )))
        }
    }

    fn text_column(frame: &DataFrame, name: &str) -> Result<TextColumn, FEError> {
        let col = frame
            .column(name)
            .map_err(|_| FEError::MissingColumn(name.to_string()))?
            .cast(&DataType::String)?;
        let values = col
            .str()?
            .into_iter()
            .map(|value| match value {
                Some(s) => s.replace("\r\n", " ↵ ").replace('\n', " ↵ "),
                None => String::from("∅"),
            })
            .collect();
        Ok(TextColumn {
            name: name.to_string(),
            values,
        })
    }

    fn flag_column(frame: &DataFrame, name: &str) -> Result<FlagColumn, FEError> {
        let values = frame
            .column(name)
            .map_err(|_| FEError::MissingColumn(name.to_string()))?
            .bool()?
            .into_iter()
            .collect();
        Ok(FlagColumn {
            name: name.to_string(),
            values,
        })
    }

    fn check_file(path: &Path) -> Result<PathBuf, FEError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => FEError::FileNotFound,
            ErrorKind::PermissionDenied => FEError::PermissionDenied,
            _ => FEError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(FEError::LoadingFailed("Not a file!".into()));
        }
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(path.to_path_buf()),
            _ => Err(FEError::UnknownFileType),
        }
    }

    // Schema inference is disabled so every column stays text, postal codes included.
    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    pub(crate) const HEADER: &str = "company_name,job_title,postal_code,place,rating,review_count,is_recruiter,show_in_salary_analysis_graphic,show_in_competitive_analysis_graphic";

    pub(crate) fn write_csv(rows: usize) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for i in 0..rows {
            writeln!(
                file,
                "Company {i},Engineer {i},02134,Boston,4.5,{i},false,{},false",
                i % 2 == 0
            )
            .unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn flags(table: &Table, name: &str) -> Vec<Option<bool>> {
        table
            .df
            .column(name)
            .unwrap()
            .bool()
            .unwrap()
            .into_iter()
            .collect()
    }

    fn all_editable() -> Vec<&'static str> {
        EDITABLE_COLUMNS.to_vec()
    }

    #[test]
    fn test_pagination_coverage() {
        let first = PageBounds::new(1, 20, 45);
        let second = PageBounds::new(2, 20, 45);
        let third = PageBounds::new(3, 20, 45);
        assert_eq!(first.total_pages, 3);
        assert_eq!((first.start, first.end), (0, 20));
        assert_eq!((second.start, second.end), (20, 40));
        assert_eq!((third.start, third.end), (40, 45));
        assert_eq!(third.len(), 5);
    }

    #[test]
    fn test_page_is_clamped() {
        assert_eq!(PageBounds::new(0, 20, 45).page, 1);
        assert_eq!(PageBounds::new(99, 20, 45).page, 3);
        let empty = PageBounds::new(1, 20, 0);
        assert_eq!(empty.total_pages, 1);
        assert_eq!(empty.len(), 0);
    }

    #[test]
    fn test_load_keeps_postal_code_as_text() {
        let file = write_csv(25);
        let table = Table::load(file.path()).unwrap();
        assert_eq!(table.height(), 25);

        let bounds = table.bounds(1, 20);
        let page = table
            .page(&bounds, &["postal_code".to_string()], &all_editable())
            .unwrap();
        assert_eq!(page.display()[0].values[0], "02134");

        let csv = String::from_utf8(table.to_csv().unwrap()).unwrap();
        assert!(csv.contains(",02134,"));
        assert!(!csv.contains(",2134,"));
    }

    #[test]
    fn test_round_trip() {
        let file = write_csv(45);
        let table = Table::load(file.path()).unwrap();
        let first = table.to_csv().unwrap();

        let mut again = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        again.write_all(&first).unwrap();
        again.flush().unwrap();
        let second = Table::load(again.path()).unwrap().to_csv().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_commit_only_touches_page_rows() {
        let file = write_csv(45);
        let mut table = Table::load(file.path()).unwrap();
        let before_recruiter = flags(&table, "is_recruiter");
        let before_salary = flags(&table, "show_in_salary_analysis_graphic");

        let bounds = table.bounds(2, 20);
        let page = table
            .page(&bounds, &["company_name".to_string()], &all_editable())
            .unwrap();
        let mut display = page.display().to_vec();
        display[0].values[0] = "changed".to_string();
        let mut editable = page.editable().to_vec();
        editable[0].values = vec![Some(true); bounds.len()];
        let edited = PageData::new(page.start(), display, editable);
        table.commit_edits(&bounds, &edited).unwrap();

        let after = flags(&table, "is_recruiter");
        assert_eq!(after[..20], before_recruiter[..20]);
        assert_eq!(after[40..], before_recruiter[40..]);
        assert!(after[20..40].iter().all(|v| *v == Some(true)));
        assert_eq!(flags(&table, "show_in_salary_analysis_graphic"), before_salary);

        let fresh = table
            .page(&bounds, &["company_name".to_string()], &all_editable())
            .unwrap();
        assert_eq!(fresh.display()[0].values[0], "Company 20");
    }

    #[test]
    fn test_page_is_detached() {
        let file = write_csv(5);
        let mut table = Table::load(file.path()).unwrap();
        let bounds = table.bounds(1, 20);
        let page = table.page(&bounds, &[], &all_editable()).unwrap();
        assert_eq!(page.start(), 0);
        assert_eq!(page.height(), 5);

        let mut editable = page.editable().to_vec();
        editable[0].values[0] = Some(true);
        table
            .commit_edits(&bounds, &PageData::new(0, Vec::new(), editable))
            .unwrap();
        assert_eq!(page.editable()[0].values[0], Some(false));
        assert_eq!(flags(&table, "is_recruiter")[0], Some(true));
    }

    #[test]
    fn test_commit_rejects_foreign_columns() {
        let file = write_csv(5);
        let mut table = Table::load(file.path()).unwrap();
        let bounds = table.bounds(1, 20);
        let foreign = FlagColumn {
            name: "rating".to_string(),
            values: vec![Some(true); 5],
        };
        let result = table.commit_edits(&bounds, &PageData::new(0, Vec::new(), vec![foreign]));
        assert!(matches!(result, Err(FEError::EditNotAllowed(_))));
    }

    #[test]
    fn test_missing_column() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "company_name,is_recruiter").unwrap();
        writeln!(file, "ACME,true").unwrap();
        file.flush().unwrap();
        let result = Table::load(file.path());
        assert!(matches!(result, Err(FEError::MissingColumn(_))));
    }

    #[test]
    fn test_missing_display_column() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "postal_code,is_recruiter,show_in_salary_analysis_graphic,show_in_competitive_analysis_graphic").unwrap();
        writeln!(file, "01234,True,False,1").unwrap();
        file.flush().unwrap();
        let table = Table::load(file.path()).unwrap();
        assert_eq!(flags(&table, "is_recruiter"), vec![Some(true)]);
        assert_eq!(flags(&table, "show_in_competitive_analysis_graphic"), vec![Some(true)]);

        let bounds = table.bounds(1, 20);
        let result = table.page(&bounds, &["place".to_string()], &all_editable());
        assert!(matches!(result, Err(FEError::MissingColumn(name)) if name == "place"));
    }

    #[test]
    fn test_export_writes_canonical_flags() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "ACME,Dev,01234,Here,4.0,3,True,0,").unwrap();
        file.flush().unwrap();
        let table = Table::load(file.path()).unwrap();
        let csv = String::from_utf8(table.to_csv().unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[1], "ACME,Dev,01234,Here,4.0,3,true,false,");
    }

    #[test]
    fn test_invalid_flag_value() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "ACME,Dev,01234,Here,4.0,3,maybe,false,false").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            Table::load(file.path()),
            Err(FEError::LoadingFailed(_))
        ));
    }

    #[test]
    fn test_check_file() {
        assert!(matches!(
            Table::load(Path::new("/nonexistent/data.csv")),
            Err(FEError::FileNotFound)
        ));
        let txt = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        assert!(matches!(
            Table::load(txt.path()),
            Err(FEError::UnknownFileType)
        ));
    }

    #[test]
    fn test_download_save() {
        let file = write_csv(3);
        let table = Table::load(file.path()).unwrap();
        let dir = TempDir::new().unwrap();
        let download = table.export().unwrap();
        assert_eq!(download.mime_type, "text/csv");
        let path = download.save(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "updated_data.csv");
        let written = fs::read_to_string(path).unwrap();
        assert!(written.starts_with("company_name,job_title,postal_code"));
        assert_eq!(written.lines().count(), 4);
    }
}
