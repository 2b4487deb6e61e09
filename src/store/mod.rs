//! SQLite-backed persistence for the library index, its aggregate
//! statistics, and the history of vetting runs. One pool, one writer at a
//! time by convention (SQLite itself serializes writers); reads go
//! through the same pool since WAL mode lets them proceed concurrently.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Row};
use thiserror::Error;

use crate::domain::{
    BatchDeleteReport, BatchSaveOutcome, BatchSaveReport, LibraryFile, LibraryStatistics,
    VettingSession,
};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 100;
const RETRY_BACKOFF_FACTOR: u64 = 2;
const RETRYABLE_MESSAGES: [&str; 3] = ["database is locked", "database is busy", "unable to open database file"];

const ALLOWED_UPDATE_COLUMNS: [&str; 11] = [
    "artist",
    "title",
    "album",
    "year",
    "duration",
    "file_format",
    "file_size",
    "metadata_hash",
    "file_content_hash",
    "file_mtime",
    "last_verified",
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no row found for this query")]
    RowNotFound,

    #[error("database connection error: {0}")]
    ConnectionError(String),

    #[error("failed to decode a row: {0}")]
    RowDecodingError(String),

    #[error("a constraint was violated: {0}")]
    ConstraintViolation(String),

    #[error("database error: {0}")]
    Generic(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Validation(#[from] crate::domain::ValidationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::RowNotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StoreError::ConnectionError(err.to_string()),
            sqlx::Error::Decode(decode_err) => StoreError::RowDecodingError(decode_err.to_string()),
            sqlx::Error::Database(db_error) => {
                if let Some(code) = db_error.code() {
                    // SQLite: 19 generic constraint, 2067 unique, 1555 primary key, 787 foreign key.
                    if ["19", "2067", "1555", "787"].contains(&code.as_ref()) {
                        return StoreError::ConstraintViolation(db_error.message().to_string());
                    }
                }
                StoreError::Generic(err)
            }
            _ => StoreError::Generic(err),
        }
    }

    fn is_retryable(&self) -> bool {
        let message = self.to_string();
        RETRYABLE_MESSAGES.iter().any(|needle| message.contains(needle))
    }
}

/// Runs `f` up to `MAX_RETRIES` additional times with exponential backoff
/// when the error looks like transient SQLite contention, rather than
/// surfacing a lock error to the caller on the first busy connection.
async fn with_retry<T, F, Fut>(mut f: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    let mut delay_ms = RETRY_BASE_DELAY_MS;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_RETRIES && err.is_retryable() => {
                attempt += 1;
                warn!("store operation failed ({err}), retrying ({attempt}/{MAX_RETRIES})");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms *= RETRY_BACKOFF_FACTOR;
            }
            Err(err) => return Err(err),
        }
    }
}

#[derive(FromRow)]
struct DbLibraryFile {
    id: i64,
    file_path: String,
    filename: String,
    artist: Option<String>,
    title: Option<String>,
    album: Option<String>,
    year: Option<i64>,
    duration: Option<f64>,
    file_format: String,
    file_size: i64,
    metadata_hash: String,
    file_content_hash: String,
    indexed_at: DateTime<Utc>,
    file_mtime: DateTime<Utc>,
    last_verified: Option<DateTime<Utc>>,
    is_active: bool,
}

impl From<DbLibraryFile> for LibraryFile {
    fn from(row: DbLibraryFile) -> Self {
        LibraryFile::from_row(
            row.id,
            row.file_path,
            row.filename,
            row.artist,
            row.title,
            row.album,
            row.year.map(|y| y as i32),
            row.duration,
            row.file_format,
            row.file_size,
            row.metadata_hash,
            row.file_content_hash,
            row.indexed_at,
            row.file_mtime,
            row.last_verified,
            row.is_active,
        )
    }
}

const SELECT_COLUMNS: &str = "id, file_path, filename, artist, title, album, year, duration, \
     file_format, file_size, metadata_hash, file_content_hash, indexed_at, file_mtime, last_verified, is_active";

/// A column/value pair accepted by [`LibraryStore::update_file`]. Only
/// names in `ALLOWED_UPDATE_COLUMNS` are accepted, mirroring the write
/// whitelist the Python store enforces so a typo'd column name fails
/// loudly instead of silently being ignored by the database driver.
pub enum ColumnUpdate {
    Text(Option<String>),
    Int(Option<i64>),
    Float(Option<f64>),
    Timestamp(Option<DateTime<Utc>>),
}

/// Which hash column [`LibraryStore::get_batch_by_hashes`] searches.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HashAxis {
    Metadata,
    Content,
}

impl HashAxis {
    fn column(self) -> &'static str {
        match self {
            HashAxis::Metadata => "metadata_hash",
            HashAxis::Content => "file_content_hash",
        }
    }
}

pub struct LibraryStore {
    pool: SqlitePool,
}

impl LibraryStore {
    pub async fn connect(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(&db_url)
            .await
            .map_err(StoreError::from_sqlx)?;

        sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await.map_err(StoreError::from_sqlx)?;
        sqlx::query("PRAGMA synchronous=NORMAL;").execute(&pool).await.map_err(StoreError::from_sqlx)?;
        sqlx::query("PRAGMA cache_size=10000;").execute(&pool).await.map_err(StoreError::from_sqlx)?;
        sqlx::query("PRAGMA temp_store=MEMORY;").execute(&pool).await.map_err(StoreError::from_sqlx)?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("library store opened at {}", db_path.display());

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn add_file(&self, file: &LibraryFile) -> Result<i64, StoreError> {
        with_retry(|| async {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO library_index \
                 (file_path, filename, artist, title, album, year, duration, file_format, \
                  file_size, metadata_hash, file_content_hash, indexed_at, file_mtime, last_verified, is_active) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 RETURNING id",
            )
            .bind(file.file_path())
            .bind(file.filename())
            .bind(file.artist())
            .bind(file.title())
            .bind(file.album())
            .bind(file.year())
            .bind(file.duration())
            .bind(file.file_format())
            .bind(file.file_size())
            .bind(file.metadata_hash())
            .bind(file.file_content_hash())
            .bind(file.indexed_at())
            .bind(file.file_mtime())
            .bind(file.last_verified())
            .bind(file.is_active())
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

            Ok(id)
        })
        .await
    }

    /// Inserts rows one statement per row inside a single transaction,
    /// falling back to a per-row transaction when the batched one fails
    /// so one bad row doesn't sink the rest of the batch.
    pub async fn batch_add_files(&self, files: &[LibraryFile]) -> Result<BatchSaveReport, StoreError> {
        let mut report = BatchSaveReport::new();
        if files.is_empty() {
            return Ok(report);
        }

        match self.try_batch_add(files).await {
            Ok(ids) => {
                for (index, id) in ids.into_iter().enumerate() {
                    report.outcomes.push(BatchSaveOutcome { batch_index: index, result: Ok(id) });
                }
            }
            Err(err) => {
                warn!("batched insert failed ({err}), falling back to per-row inserts");
                for (index, file) in files.iter().enumerate() {
                    let result = self.add_file(file).await;
                    report.outcomes.push(BatchSaveOutcome { batch_index: index, result });
                }
            }
        }

        Ok(report)
    }

    async fn try_batch_add(&self, files: &[LibraryFile]) -> Result<Vec<i64>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        let mut ids = Vec::with_capacity(files.len());

        for file in files {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO library_index \
                 (file_path, filename, artist, title, album, year, duration, file_format, \
                  file_size, metadata_hash, file_content_hash, indexed_at, file_mtime, last_verified, is_active) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 RETURNING id",
            )
            .bind(file.file_path())
            .bind(file.filename())
            .bind(file.artist())
            .bind(file.title())
            .bind(file.album())
            .bind(file.year())
            .bind(file.duration())
            .bind(file.file_format())
            .bind(file.file_size())
            .bind(file.metadata_hash())
            .bind(file.file_content_hash())
            .bind(file.indexed_at())
            .bind(file.file_mtime())
            .bind(file.last_verified())
            .bind(file.is_active())
            .fetch_one(&mut *tx)
            .await
            .map_err(StoreError::from_sqlx)?;

            ids.push(id);
        }

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(ids)
    }

    pub async fn update_file(&self, id: i64, updates: HashMap<&str, ColumnUpdate>) -> Result<(), StoreError> {
        for column in updates.keys() {
            if !ALLOWED_UPDATE_COLUMNS.contains(column) {
                return Err(StoreError::Validation(crate::domain::ValidationError::UnknownColumn(
                    column.to_string(),
                )));
            }
        }

        if updates.is_empty() {
            return Ok(());
        }

        with_retry(|| async {
            let mut qb = sqlx::QueryBuilder::new("UPDATE library_index SET ");
            let mut separated = qb.separated(", ");
            for (column, value) in &updates {
                separated.push(format!("{column} = "));
                match value {
                    ColumnUpdate::Text(v) => {
                        qb.push_bind(v.clone());
                    }
                    ColumnUpdate::Int(v) => {
                        qb.push_bind(*v);
                    }
                    ColumnUpdate::Float(v) => {
                        qb.push_bind(*v);
                    }
                    ColumnUpdate::Timestamp(v) => {
                        qb.push_bind(*v);
                    }
                }
            }
            qb.push(" WHERE id = ");
            qb.push_bind(id);

            qb.build().execute(&self.pool).await.map_err(StoreError::from_sqlx)?;
            Ok(())
        })
        .await
    }

    pub async fn get_file_by_path(&self, file_path: &str) -> Result<Option<LibraryFile>, StoreError> {
        let row: Option<DbLibraryFile> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM library_index WHERE file_path = ? LIMIT 1"
        ))
        .bind(file_path)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(row.map(LibraryFile::from))
    }

    pub async fn get_file_by_metadata_hash(&self, metadata_hash: &str) -> Result<Option<LibraryFile>, StoreError> {
        let row: Option<DbLibraryFile> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM library_index WHERE is_active = 1 AND metadata_hash = ? LIMIT 1"
        ))
        .bind(metadata_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(row.map(LibraryFile::from))
    }

    pub async fn get_files_by_metadata_hash(&self, metadata_hash: &str) -> Result<Vec<LibraryFile>, StoreError> {
        let rows: Vec<DbLibraryFile> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM library_index WHERE is_active = 1 AND metadata_hash = ?"
        ))
        .bind(metadata_hash)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(rows.into_iter().map(LibraryFile::from).collect())
    }

    /// Looks up many hashes in one round trip, chunked at 500 bound
    /// parameters per statement (SQLite's default `SQLITE_MAX_VARIABLE_NUMBER`
    /// budget leaves comfortable headroom below that). Used by the Detector's
    /// batch path so tiers 1 and 2 cost O(batches), not O(candidates).
    pub async fn get_batch_by_hashes(
        &self,
        hashes: &[String],
        axis: HashAxis,
    ) -> Result<HashMap<String, Vec<LibraryFile>>, StoreError> {
        const CHUNK_SIZE: usize = 500;

        let mut out: HashMap<String, Vec<LibraryFile>> = HashMap::new();
        if hashes.is_empty() {
            return Ok(out);
        }

        let column = axis.column();
        for chunk in hashes.chunks(CHUNK_SIZE) {
            let mut qb = sqlx::QueryBuilder::new(format!(
                "SELECT {SELECT_COLUMNS} FROM library_index WHERE is_active = 1 AND {column} IN ("
            ));
            let mut separated = qb.separated(", ");
            for hash in chunk {
                separated.push_bind(hash);
            }
            qb.push(")");

            let rows: Vec<DbLibraryFile> = qb.build_query_as().fetch_all(&self.pool).await.map_err(StoreError::from_sqlx)?;
            for row in rows {
                let file = LibraryFile::from(row);
                let key = match axis {
                    HashAxis::Metadata => file.metadata_hash().to_string(),
                    HashAxis::Content => file.file_content_hash().to_string(),
                };
                out.entry(key).or_default().push(file);
            }
        }

        Ok(out)
    }

    pub async fn get_file_by_content_hash(&self, content_hash: &str) -> Result<Option<LibraryFile>, StoreError> {
        let row: Option<DbLibraryFile> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM library_index WHERE is_active = 1 AND file_content_hash = ? LIMIT 1"
        ))
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(row.map(LibraryFile::from))
    }

    /// Case-insensitive lookup used by the Detector's fuzzy tier, backed
    /// by `idx_artist_title`/`idx_active_artist` so an artist-only scan
    /// (the common case — titles are compared fuzzily, not exactly)
    /// stays an index seek.
    pub async fn search_by_artist_title(
        &self,
        artist: Option<&str>,
        title: Option<&str>,
    ) -> Result<Vec<LibraryFile>, StoreError> {
        let mut qb = sqlx::QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM library_index WHERE is_active = 1"));

        if let Some(artist) = artist {
            qb.push(" AND LOWER(artist) = LOWER(");
            qb.push_bind(artist.to_string());
            qb.push(")");
        }

        if let Some(title) = title {
            qb.push(" AND LOWER(title) = LOWER(");
            qb.push_bind(title.to_string());
            qb.push(")");
        }

        let rows: Vec<DbLibraryFile> = qb.build_query_as().fetch_all(&self.pool).await.map_err(StoreError::from_sqlx)?;
        Ok(rows.into_iter().map(LibraryFile::from).collect())
    }

    pub async fn get_all_files(&self, active_only: bool) -> Result<Vec<LibraryFile>, StoreError> {
        let query = if active_only {
            format!("SELECT {SELECT_COLUMNS} FROM library_index WHERE is_active = 1")
        } else {
            format!("SELECT {SELECT_COLUMNS} FROM library_index")
        };

        let rows: Vec<DbLibraryFile> = sqlx::query_as(&query).fetch_all(&self.pool).await.map_err(StoreError::from_sqlx)?;
        Ok(rows.into_iter().map(LibraryFile::from).collect())
    }

    /// Looks up many paths in one round trip; used by the Indexer to
    /// split a scan batch into inserts/updates/skips without a query per
    /// file.
    pub async fn batch_get_files_by_paths(&self, paths: &[String]) -> Result<HashMap<String, LibraryFile>, StoreError> {
        if paths.is_empty() {
            return Ok(HashMap::new());
        }

        let mut qb = sqlx::QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM library_index WHERE file_path IN ("));
        let mut separated = qb.separated(", ");
        for path in paths {
            separated.push_bind(path);
        }
        qb.push(")");

        let rows: Vec<DbLibraryFile> = qb.build_query_as().fetch_all(&self.pool).await.map_err(StoreError::from_sqlx)?;
        Ok(rows.into_iter().map(|row| (row.file_path.clone(), LibraryFile::from(row))).collect())
    }

    pub async fn mark_inactive(&self, file_path: &str) -> Result<(), StoreError> {
        with_retry(|| async {
            sqlx::query("UPDATE library_index SET is_active = 0 WHERE file_path = ?")
                .bind(file_path)
                .execute(&self.pool)
                .await
                .map_err(StoreError::from_sqlx)?;
            Ok(())
        })
        .await
    }

    pub async fn batch_mark_inactive(&self, file_paths: &[String]) -> Result<BatchDeleteReport, StoreError> {
        let mut report = BatchDeleteReport::new();
        for path in file_paths {
            match self.mark_inactive(path).await {
                Ok(()) => report.deleted_paths.push(path.clone()),
                Err(err) => report.failed.push((path.clone(), err)),
            }
        }
        Ok(report)
    }

    pub async fn delete_file(&self, file_path: &str) -> Result<(), StoreError> {
        with_retry(|| async {
            let result = sqlx::query("DELETE FROM library_index WHERE file_path = ?")
                .bind(file_path)
                .execute(&self.pool)
                .await
                .map_err(StoreError::from_sqlx)?;

            if result.rows_affected() == 0 {
                return Err(StoreError::RowNotFound);
            }
            Ok(())
        })
        .await
    }

    pub async fn get_file_count(&self, active_only: bool) -> Result<i64, StoreError> {
        let query = if active_only {
            "SELECT COUNT(*) FROM library_index WHERE is_active = 1"
        } else {
            "SELECT COUNT(*) FROM library_index"
        };
        sqlx::query_scalar(query).fetch_one(&self.pool).await.map_err(StoreError::from_sqlx)
    }

    pub async fn verify_file_exists(&self, file_path: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM library_index WHERE file_path = ? LIMIT 1)")
            .bind(file_path)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(count == 1)
    }

    pub async fn save_statistics(&self, stats: &LibraryStatistics) -> Result<(), StoreError> {
        let formats_json = serde_json::to_string(&stats.formats_breakdown).unwrap_or_else(|_| "{}".to_string());

        with_retry(|| async {
            sqlx::query(
                "INSERT INTO library_stats \
                 (total_files, total_size, formats_breakdown, artists_count, albums_count, \
                  last_index_time, index_duration, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(stats.total_files)
            .bind(stats.total_size)
            .bind(&formats_json)
            .bind(stats.artists_count)
            .bind(stats.albums_count)
            .bind(stats.last_index_time)
            .bind(stats.index_duration)
            .bind(stats.created_at)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
            Ok(())
        })
        .await
    }

    pub async fn get_statistics(&self) -> Result<Option<LibraryStatistics>, StoreError> {
        let row = sqlx::query(
            "SELECT total_files, total_size, formats_breakdown, artists_count, albums_count, \
             last_index_time, index_duration, created_at \
             FROM library_stats ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        let Some(row) = row else { return Ok(None) };

        let formats_json: String = row.try_get("formats_breakdown").map_err(StoreError::from_sqlx)?;
        let formats_breakdown = serde_json::from_str(&formats_json).unwrap_or_default();

        Ok(Some(LibraryStatistics {
            total_files: row.try_get("total_files").map_err(StoreError::from_sqlx)?,
            total_size: row.try_get("total_size").map_err(StoreError::from_sqlx)?,
            formats_breakdown,
            artists_count: row.try_get("artists_count").map_err(StoreError::from_sqlx)?,
            albums_count: row.try_get("albums_count").map_err(StoreError::from_sqlx)?,
            last_index_time: row.try_get("last_index_time").map_err(StoreError::from_sqlx)?,
            index_duration: row.try_get("index_duration").map_err(StoreError::from_sqlx)?,
            created_at: row.try_get("created_at").map_err(StoreError::from_sqlx)?,
        }))
    }

    pub async fn save_vetting_result(&self, session: &VettingSession) -> Result<i64, StoreError> {
        with_retry(|| async {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO vetting_history \
                 (import_folder, total_files, duplicates_found, new_songs, uncertain_matches, threshold_used, vetted_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?) \
                 RETURNING id",
            )
            .bind(&session.import_folder)
            .bind(session.total_files)
            .bind(session.duplicates_found)
            .bind(session.new_songs)
            .bind(session.uncertain_matches)
            .bind(session.threshold_used)
            .bind(session.vetted_at)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
            Ok(id)
        })
        .await
    }

    pub async fn get_vetting_history(&self, limit: i64) -> Result<Vec<VettingSession>, StoreError> {
        if !(1..=1000).contains(&limit) {
            return Err(StoreError::Validation(crate::domain::ValidationError::LimitOutOfRange {
                min: 1,
                max: 1000,
                got: limit,
            }));
        }

        let rows = sqlx::query(
            "SELECT id, import_folder, total_files, duplicates_found, new_songs, uncertain_matches, \
             threshold_used, vetted_at FROM vetting_history ORDER BY vetted_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        rows.into_iter()
            .map(|row| {
                Ok(VettingSession {
                    id: Some(row.try_get("id").map_err(StoreError::from_sqlx)?),
                    import_folder: row.try_get("import_folder").map_err(StoreError::from_sqlx)?,
                    total_files: row.try_get("total_files").map_err(StoreError::from_sqlx)?,
                    duplicates_found: row.try_get("duplicates_found").map_err(StoreError::from_sqlx)?,
                    new_songs: row.try_get("new_songs").map_err(StoreError::from_sqlx)?,
                    uncertain_matches: row.try_get("uncertain_matches").map_err(StoreError::from_sqlx)?,
                    threshold_used: row.try_get("threshold_used").map_err(StoreError::from_sqlx)?,
                    vetted_at: row.try_get("vetted_at").map_err(StoreError::from_sqlx)?,
                })
            })
            .collect()
    }

    /// Uses SQLite's own backup API via `VACUUM INTO`, which produces a
    /// consistent snapshot even while other connections hold read locks.
    pub async fn backup_database(&self, destination: &Path) -> Result<(), StoreError> {
        let destination_str = destination.to_string_lossy().into_owned();
        sqlx::query("VACUUM INTO ?").bind(destination_str).execute(&self.pool).await.map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    pub async fn verify_database_integrity(&self) -> Result<bool, StoreError> {
        let result: String = sqlx::query_scalar("PRAGMA integrity_check").fetch_one(&self.pool).await.map_err(StoreError::from_sqlx)?;
        Ok(result == "ok")
    }

    pub async fn optimize_database(&self) -> Result<(), StoreError> {
        sqlx::query("VACUUM").execute(&self.pool).await.map_err(StoreError::from_sqlx)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    pub async fn prepare_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");

        sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");
        pool
    }

    /// Used by other modules' tests (Detector, Vetter) that need a real
    /// `LibraryStore` rather than a bare pool.
    pub(crate) async fn prepare_store() -> super::LibraryStore {
        super::LibraryStore { pool: prepare_pool().await }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::library_file::NewLibraryFile;
    use std::path::PathBuf;

    async fn store() -> LibraryStore {
        let pool = test_helpers::prepare_pool().await;
        LibraryStore { pool }
    }

    fn new_file(path: &str) -> LibraryFile {
        LibraryFile::new(NewLibraryFile {
            file_path: PathBuf::from(path),
            artist: Some("Artist".to_string()),
            title: Some("Title".to_string()),
            album: None,
            year: Some(2020),
            duration: Some(180.0),
            file_format: "mp3".to_string(),
            file_size: 4096,
            metadata_hash: "hash1".to_string(),
            file_content_hash: "4096_abc".to_string(),
            file_mtime: Utc::now(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn add_and_fetch_by_path_round_trips() {
        let store = store().await;
        let file = new_file("/music/a.mp3");
        let id = store.add_file(&file).await.unwrap();
        assert!(id > 0);

        let fetched = store.get_file_by_path("/music/a.mp3").await.unwrap().unwrap();
        assert_eq!(fetched.id(), Some(id));
        assert_eq!(fetched.artist(), Some("Artist"));
    }

    #[tokio::test]
    async fn duplicate_path_is_a_constraint_violation() {
        let store = store().await;
        store.add_file(&new_file("/music/dup.mp3")).await.unwrap();
        let result = store.add_file(&new_file("/music/dup.mp3")).await;
        assert!(matches!(result, Err(StoreError::ConstraintViolation(_))));
    }

    #[tokio::test]
    async fn update_file_rejects_unknown_column() {
        let store = store().await;
        let id = store.add_file(&new_file("/music/b.mp3")).await.unwrap();

        let mut updates = HashMap::new();
        updates.insert("id", ColumnUpdate::Int(Some(99)));

        let result = store.update_file(id, updates).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    #[tokio::test]
    async fn mark_inactive_excludes_from_active_lookups() {
        let store = store().await;
        store.add_file(&new_file("/music/c.mp3")).await.unwrap();
        store.mark_inactive("/music/c.mp3").await.unwrap();

        let active = store.get_all_files(true).await.unwrap();
        assert!(active.is_empty());

        let all = store.get_all_files(false).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn batch_add_files_inserts_all_rows() {
        let store = store().await;
        let files = vec![new_file("/music/d1.mp3"), new_file("/music/d2.mp3")];
        let report = store.batch_add_files(&files).await.unwrap();
        assert_eq!(report.successful_ids().len(), 2);
    }

    #[tokio::test]
    async fn get_batch_by_hashes_groups_by_the_requested_axis() {
        let store = store().await;

        let mk = |path: &str, content_hash: &str| {
            LibraryFile::new(NewLibraryFile {
                file_path: PathBuf::from(path),
                artist: Some("Artist".to_string()),
                title: Some("Title".to_string()),
                album: None,
                year: Some(2020),
                duration: Some(180.0),
                file_format: "mp3".to_string(),
                file_size: 4096,
                metadata_hash: "shared".to_string(),
                file_content_hash: content_hash.to_string(),
                file_mtime: Utc::now(),
            })
            .unwrap()
        };

        store.add_file(&mk("/music/e1.mp3", "c1")).await.unwrap();
        store.add_file(&mk("/music/e2.mp3", "c2")).await.unwrap();

        let matches = store
            .get_batch_by_hashes(&["shared".to_string(), "missing".to_string()], HashAxis::Metadata)
            .await
            .unwrap();
        assert_eq!(matches.get("shared").map(Vec::len), Some(2));
        assert!(!matches.contains_key("missing"));

        let by_content = store.get_batch_by_hashes(&["c1".to_string()], HashAxis::Content).await.unwrap();
        assert_eq!(by_content.get("c1").map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn get_batch_by_hashes_is_empty_for_an_empty_input() {
        let store = store().await;
        let matches = store.get_batch_by_hashes(&[], HashAxis::Metadata).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn vetting_history_round_trips_and_validates_limit() {
        let store = store().await;
        let session = VettingSession::new("/import".to_string(), 10, 2, 7, 1, 0.8).unwrap();
        store.save_vetting_result(&session).await.unwrap();

        let history = store.get_vetting_history(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].import_folder, "/import");

        let bad = store.get_vetting_history(0).await;
        assert!(matches!(bad, Err(StoreError::Validation(_))));
    }
}
