use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::domain::{DiversityRating, RankingBallot, SingleRating};

pub const SINGLE_FILE: &str = "responses_a.csv";
pub const RANKING_FILE: &str = "responses_b.csv";
pub const DIVERSITY_FILE: &str = "responses_c.csv";

/// Storage abstraction so the service and routes can be exercised without a
/// real disk. Appends must preserve submission order; the list methods
/// return records oldest first.
pub trait ResponseStore: Send + Sync {
    fn append_single(&self, record: &SingleRating) -> Result<(), StoreError>;
    fn append_ranking(&self, record: &RankingBallot) -> Result<(), StoreError>;
    fn append_diversity(&self, record: &DiversityRating) -> Result<(), StoreError>;

    fn singles(&self) -> Result<Vec<SingleRating>, StoreError>;
    fn rankings(&self) -> Result<Vec<RankingBallot>, StoreError>;
    fn diversities(&self) -> Result<Vec<DiversityRating>, StoreError>;

    /// Write timestamped CSV snapshots of all three parts into `dir`.
    fn export(&self, dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
        std::fs::create_dir_all(dir).map_err(StoreError::Io)?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");

        let single_path = dir.join(format!("responses_a_{stamp}.csv"));
        write_snapshot(&single_path, &self.singles()?)?;

        let ranking_rows: Vec<RankingCsvRow> = self
            .rankings()?
            .iter()
            .map(RankingCsvRow::try_from)
            .collect::<Result<_, _>>()?;
        let ranking_path = dir.join(format!("responses_b_{stamp}.csv"));
        write_snapshot(&ranking_path, &ranking_rows)?;

        let diversity_rows: Vec<DiversityCsvRow> = self
            .diversities()?
            .iter()
            .map(DiversityCsvRow::try_from)
            .collect::<Result<_, _>>()?;
        let diversity_path = dir.join(format!("responses_c_{stamp}.csv"));
        write_snapshot(&diversity_path, &diversity_rows)?;

        Ok(vec![single_path, ranking_path, diversity_path])
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("response CSV failure: {0}")]
    Csv(#[from] csv::Error),
    #[error("response encoding failure: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Append-only CSV files under the resolved storage root, one per survey
/// part. Headers are written when a file is first created.
pub struct CsvResponseStore {
    root: PathBuf,
    // csv appends are not atomic; serialize writers within this process.
    write_lock: Mutex<()>,
}

impl CsvResponseStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn append<T: Serialize>(&self, file_name: &str, record: &T) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().expect("store mutex poisoned");
        let path = self.root.join(file_name);
        let write_headers = match std::fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_headers)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, file_name: &str) -> Result<Vec<T>, StoreError> {
        let path = self.root.join(file_name);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_reader(File::open(path)?);
        let mut records = Vec::new();
        for record in reader.deserialize::<T>() {
            records.push(record?);
        }
        Ok(records)
    }
}

impl ResponseStore for CsvResponseStore {
    fn append_single(&self, record: &SingleRating) -> Result<(), StoreError> {
        self.append(SINGLE_FILE, record)
    }

    fn append_ranking(&self, record: &RankingBallot) -> Result<(), StoreError> {
        self.append(RANKING_FILE, &RankingCsvRow::try_from(record)?)
    }

    fn append_diversity(&self, record: &DiversityRating) -> Result<(), StoreError> {
        self.append(DIVERSITY_FILE, &DiversityCsvRow::try_from(record)?)
    }

    fn singles(&self) -> Result<Vec<SingleRating>, StoreError> {
        self.read(SINGLE_FILE)
    }

    fn rankings(&self) -> Result<Vec<RankingBallot>, StoreError> {
        self.read::<RankingCsvRow>(RANKING_FILE)?
            .into_iter()
            .map(RankingBallot::try_from)
            .collect()
    }

    fn diversities(&self) -> Result<Vec<DiversityRating>, StoreError> {
        self.read::<DiversityCsvRow>(DIVERSITY_FILE)?
            .into_iter()
            .map(DiversityRating::try_from)
            .collect()
    }
}

/// Flat CSV shape for ballots; the per-provider maps ride along as JSON
/// columns so the column set stays stable across provider configurations.
#[derive(Debug, Serialize, Deserialize)]
struct RankingCsvRow {
    rater_id: String,
    category_id: String,
    prompt_id: String,
    seed_label: u32,
    ranks_json: String,
    images_json: String,
    elapsed_ms: i64,
    submitted_utc: String,
}

impl TryFrom<&RankingBallot> for RankingCsvRow {
    type Error = StoreError;

    fn try_from(ballot: &RankingBallot) -> Result<Self, Self::Error> {
        Ok(Self {
            rater_id: ballot.rater_id.clone(),
            category_id: ballot.category_id.clone(),
            prompt_id: ballot.prompt_id.clone(),
            seed_label: ballot.seed_label,
            ranks_json: serde_json::to_string(&ballot.ranks)?,
            images_json: serde_json::to_string(&ballot.images)?,
            elapsed_ms: ballot.elapsed_ms,
            submitted_utc: ballot.submitted_utc.clone(),
        })
    }
}

impl TryFrom<RankingCsvRow> for RankingBallot {
    type Error = StoreError;

    fn try_from(row: RankingCsvRow) -> Result<Self, Self::Error> {
        Ok(Self {
            rater_id: row.rater_id,
            category_id: row.category_id,
            prompt_id: row.prompt_id,
            seed_label: row.seed_label,
            ranks: serde_json::from_str(&row.ranks_json)?,
            images: serde_json::from_str(&row.images_json)?,
            elapsed_ms: row.elapsed_ms,
            submitted_utc: row.submitted_utc,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DiversityCsvRow {
    rater_id: String,
    provider: String,
    category_id: String,
    prompt_id: String,
    diversity: u8,
    image_paths_json: String,
    elapsed_ms: i64,
    submitted_utc: String,
}

impl TryFrom<&DiversityRating> for DiversityCsvRow {
    type Error = StoreError;

    fn try_from(rating: &DiversityRating) -> Result<Self, Self::Error> {
        Ok(Self {
            rater_id: rating.rater_id.clone(),
            provider: rating.provider.clone(),
            category_id: rating.category_id.clone(),
            prompt_id: rating.prompt_id.clone(),
            diversity: rating.diversity,
            image_paths_json: serde_json::to_string(&rating.image_paths)?,
            elapsed_ms: rating.elapsed_ms,
            submitted_utc: rating.submitted_utc.clone(),
        })
    }
}

impl TryFrom<DiversityCsvRow> for DiversityRating {
    type Error = StoreError;

    fn try_from(row: DiversityCsvRow) -> Result<Self, Self::Error> {
        Ok(Self {
            rater_id: row.rater_id,
            provider: row.provider,
            category_id: row.category_id,
            prompt_id: row.prompt_id,
            diversity: row.diversity,
            image_paths: serde_json::from_str(&row.image_paths_json)?,
            elapsed_ms: row.elapsed_ms,
            submitted_utc: row.submitted_utc,
        })
    }
}

fn write_snapshot<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StoreError> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
