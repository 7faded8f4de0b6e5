use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

/// Cell spellings that pandas' CSV reader treats as missing values.
const MISSING_MARKERS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const TRUE_MARKERS: [&str; 3] = ["True", "TRUE", "true"];
const FALSE_MARKERS: [&str; 3] = ["False", "FALSE", "false"];

/// Rendering of a missing cell when values are stringified.
pub const MISSING_VALUE: &str = "nan";

/// Column type inferred the way pandas assigns dtypes when reading a CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    Bool,
    Object,
}

impl ColumnType {
    pub fn dtype_name(self) -> &'static str {
        match self {
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::Object => "object",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int64 | Self::Float64)
    }

    pub fn is_text(self) -> bool {
        self == Self::Object
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    Io { path: PathBuf, message: String },
    Csv(String),
    NoColumns,
}

impl Display for DatasetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => {
                write!(f, "unable to read {}: {message}", path.display())
            }
            Self::Csv(msg) => write!(f, "invalid CSV data: {msg}"),
            Self::NoColumns => write!(f, "dataset has no columns"),
        }
    }
}

impl Error for DatasetError {}

/// An immutable, named table loaded from delimited text.
///
/// The source CSV text is retained so the same bytes can be handed to the
/// Python side, keeping the Rust schema view and the dataframe in agreement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
    source_csv: String,
}

impl Dataset {
    pub fn from_path(name: impl Into<String>, path: &Path) -> Result<Self, DatasetError> {
        let text = fs::read_to_string(path).map_err(|err| DatasetError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_csv_str(name, &text)
    }

    pub fn from_csv_str(name: impl Into<String>, text: &str) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|err| DatasetError::Csv(err.to_string()))?
            .iter()
            .map(ToOwned::to_owned)
            .collect();
        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(DatasetError::NoColumns);
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| DatasetError::Csv(err.to_string()))?;
            rows.push(record.iter().map(ToOwned::to_owned).collect::<Vec<_>>());
        }

        let columns = headers
            .into_iter()
            .enumerate()
            .map(|(index, name)| Column {
                column_type: infer_column_type(rows.iter().map(|row| row[index].as_str())),
                name,
            })
            .collect();

        Ok(Self {
            name: name.into(),
            columns,
            rows,
            source_csv: text.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn source_csv(&self) -> &str {
        &self.source_csv
    }

    pub fn head(&self, n: usize) -> &[Vec<String>] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Distinct stringified values of a column in first-seen order. Missing
    /// cells collapse into a single `nan` entry.
    pub fn distinct_values(&self, column_index: usize) -> Vec<String> {
        let mut seen = Vec::<String>::new();
        for row in &self.rows {
            let value = display_value(&row[column_index]);
            if !seen.iter().any(|existing| existing == value) {
                seen.push(value.to_string());
            }
        }
        seen
    }
}

/// Derives a catalog name from an uploaded file: the file stem with its first
/// letter upper-cased and the remainder lower-cased.
pub fn dataset_name_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let mut chars = stem.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect())
}

/// Matches the raw cell: pandas keeps `" NA"` as a string.
pub fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell)
}

pub fn display_value(cell: &str) -> &str {
    if is_missing(cell) { MISSING_VALUE } else { cell }
}

fn infer_column_type<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut cells = cells.peekable();
    // Header-only input: pandas reads every column as object.
    if cells.peek().is_none() {
        return ColumnType::Object;
    }

    let mut has_missing = false;
    let mut all_int = true;
    let mut all_float = true;
    let mut all_bool = true;

    for cell in cells {
        if is_missing(cell) {
            has_missing = true;
            continue;
        }
        let trimmed = cell.trim();
        all_int &= trimmed.parse::<i64>().is_ok();
        all_float &= trimmed.parse::<f64>().is_ok();
        all_bool &= TRUE_MARKERS.contains(&trimmed) || FALSE_MARKERS.contains(&trimmed);
    }

    // Rows present but every cell missing: read as all-NaN floats.
    if all_int && all_float && all_bool {
        return ColumnType::Float64;
    }

    if all_int {
        if has_missing {
            ColumnType::Float64
        } else {
            ColumnType::Int64
        }
    } else if all_float {
        ColumnType::Float64
    } else if all_bool && !has_missing {
        ColumnType::Bool
    } else {
        ColumnType::Object
    }
}
