use polars::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::domain::CTError;

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

/// Numeric fields a table can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    Ranking,
    Fees,
    Placement,
    UserRating,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::Ranking,
        SortKey::Fees,
        SortKey::Placement,
        SortKey::UserRating,
    ];

    fn column_aliases(self) -> &'static [&'static str] {
        match self {
            SortKey::Ranking => &["ranking", "rank", "cdrank"],
            SortKey::Fees => &["fees", "fee", "coursefees"],
            SortKey::Placement => &["placement"],
            SortKey::UserRating => &["userrating", "userreviews", "rating"],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollegeRecord {
    pub id: u32,
    pub name: String,
    pub ranking: f64,
    pub fees: f64,
    pub placement: f64,
    pub user_rating: f64,
}

impl CollegeRecord {
    pub fn value(&self, key: SortKey) -> f64 {
        match key {
            SortKey::Ranking => self.ranking,
            SortKey::Fees => self.fees,
            SortKey::Placement => self.placement,
            SortKey::UserRating => self.user_rating,
        }
    }
}

/// The ordered, read-only list of colleges the table pages through.
#[derive(Debug, Default)]
pub struct CollegeSource {
    name: String,
    records: Vec<CollegeRecord>,
}

impl CollegeSource {
    pub fn new(name: impl Into<String>, records: Vec<CollegeRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Up to `count` records starting at `offset`. Reading past the end gives
    /// a shorter (possibly empty) slice.
    pub fn slice(&self, offset: usize, count: usize) -> &[CollegeRecord] {
        let begin = offset.min(self.records.len());
        let end = offset.saturating_add(count).min(self.records.len());
        &self.records[begin..end]
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: PathBuf) -> Result<Self, CTError> {
        let path = Self::check_file(path)?;
        let frame = match Self::detect_file_type(&path)? {
            FileType::CSV => Self::load_csv(&path)?,
            FileType::PARQUET => Self::load_parquet(&path)?,
            FileType::ARROW => Self::load_arrow(&path)?,
        };

        let start_time = Instant::now();
        let df = frame.collect()?;
        let records = Self::records_from_frame(&df)?;
        info!(
            "Loaded {} colleges in {}ms",
            records.len(),
            start_time.elapsed().as_millis()
        );

        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        Ok(Self::new(name, records))
    }

    #[instrument(skip_all)]
    fn records_from_frame(df: &DataFrame) -> Result<Vec<CollegeRecord>, CTError> {
        let nrows = df.height();

        let name_column = Self::find_column(df, &["name", "college", "collegename"])
            .ok_or_else(|| CTError::MissingColumn("name".into()))?;
        let names = Self::load_names(df, &name_column)?;

        let ids = match Self::find_column(df, &["id"]) {
            Some(column) => Self::load_ids(df, &column)?,
            None => vec![None; nrows],
        };

        // One column per task, the numeric columns are independent of each other.
        let numeric: Result<Vec<Vec<f64>>, CTError> = SortKey::ALL
            .par_iter()
            .map(|key| {
                let column = Self::find_column(df, key.column_aliases())
                    .ok_or_else(|| CTError::MissingColumn(key.column_aliases()[0].into()))?;
                debug!("Reading {key:?} from column \"{column}\"");
                Self::load_numbers(df, &column)
            })
            .collect();
        let [ranking, fees, placement, user_rating]: [Vec<f64>; 4] = numeric?
            .try_into()
            .map_err(|_| CTError::loading_failed("numeric columns out of step"))?;

        let records = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| CollegeRecord {
                id: ids[idx].unwrap_or(idx as u32),
                name,
                ranking: ranking[idx],
                fees: fees[idx],
                placement: placement[idx],
                user_rating: user_rating[idx],
            })
            .collect::<Vec<_>>();
        Ok(records)
    }

    fn normalize_column_name(name: &str) -> String {
        name.chars()
            .filter(|c| *c != '_' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect()
    }

    fn find_column(df: &DataFrame, aliases: &[&str]) -> Option<String> {
        df.get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .find(|name| aliases.contains(&Self::normalize_column_name(name).as_str()))
    }

    fn load_names(df: &DataFrame, column: &str) -> Result<Vec<String>, PolarsError> {
        let col = df.column(column)?.cast(&DataType::String)?;
        Ok(col
            .str()?
            .into_iter()
            .map(|value| value.unwrap_or_default().to_string())
            .collect())
    }

    fn load_ids(df: &DataFrame, column: &str) -> Result<Vec<Option<u32>>, PolarsError> {
        let col = df.column(column)?.cast(&DataType::UInt32)?;
        Ok(col.u32()?.into_iter().collect())
    }

    fn load_numbers(df: &DataFrame, column: &str) -> Result<Vec<f64>, CTError> {
        let col = df.column(column)?.cast(&DataType::Float64)?;
        Ok(col
            .f64()?
            .into_iter()
            .map(|value| value.unwrap_or(f64::NAN))
            .collect())
    }

    fn check_file(path: PathBuf) -> Result<PathBuf, CTError> {
        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CTError::FileNotFound,
            ErrorKind::PermissionDenied => CTError::PermissionDenied,
            _ => CTError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(CTError::loading_failed("Not a file!"));
        }
        Ok(path)
    }

    fn detect_file_type(path: &Path) -> Result<FileType, CTError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(CTError::UnknownFileType),
        }
    }

    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }
}

#[cfg(test)]
pub(crate) fn sample_source(n: usize) -> CollegeSource {
    let records = (1..=n)
        .map(|i| CollegeRecord {
            id: i as u32,
            name: format!("College {i:02}"),
            ranking: i as f64,
            fees: ((i * 7) % 25) as f64 * 1000.0,
            placement: 50.0 + (i % 5) as f64,
            user_rating: 3.0 + (i % 3) as f64 * 0.5,
        })
        .collect();
    CollegeSource::new("sample", records)
}
