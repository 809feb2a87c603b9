use chrono::NaiveDate;
use freelytics_scanner::{
    ContractType, CrawlStats, JobRecord, PayPeriod, RecordSink, SalaryRange, ScanError,
};
use rusqlite::{Connection, OptionalExtension, Result, Row, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite store for crawl sessions and the job records they produced.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(SessionStatus::Running),
            "completed" => Some(SessionStatus::Completed),
            "failed" => Some(SessionStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub status: SessionStatus,
    pub start_urls: Vec<String>,
    pub listing_pages: i64,
    pub listing_failures: i64,
    pub detail_pages: i64,
    pub detail_failures: i64,
    pub skipped_cards: i64,
    pub records: i64,
    pub unmatched: i64,
    pub incomplete: i64,
    pub duplicates: i64,
    pub error: Option<String>,
}

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn parse_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok())
}

/// Pay bounds as SQLite integers; a bound past `i64::MAX` is a conversion error.
fn range_bounds(range: Option<&SalaryRange>) -> Result<(Option<i64>, Option<i64>)> {
    let to_sql = |value: u64| {
        i64::try_from(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
    };
    match range {
        Some(r) => Ok((Some(to_sql(r.min)?), Some(to_sql(r.max)?))),
        None => Ok((None, None)),
    }
}

fn range_from_columns(
    min: Option<i64>,
    max: Option<i64>,
    currency: Option<String>,
    period: Option<String>,
) -> Option<SalaryRange> {
    let period = period
        .as_deref()
        .and_then(PayPeriod::from_str)
        .unwrap_or(PayPeriod::Unspecified);
    Some(SalaryRange::new(
        u64::try_from(min?).ok()?,
        u64::try_from(max?).ok()?,
        &currency?,
        period,
    ))
}

const SESSION_COLUMNS: &str = "id, start_time, end_time, status, start_urls, listing_pages, \
    listing_failures, detail_pages, detail_failures, skipped_cards, records_emitted, unmatched, \
    incomplete, duplicates, error";

fn session_from_row(row: &Row) -> Result<SessionInfo> {
    let status: String = row.get(3)?;
    let start_urls: String = row.get(4)?;
    Ok(SessionInfo {
        id: row.get(0)?,
        start_time: row.get(1)?,
        end_time: row.get(2)?,
        status: SessionStatus::from_str(&status).unwrap_or(SessionStatus::Failed),
        start_urls: serde_json::from_str(&start_urls).unwrap_or_default(),
        listing_pages: row.get(5)?,
        listing_failures: row.get(6)?,
        detail_pages: row.get(7)?,
        detail_failures: row.get(8)?,
        skipped_cards: row.get(9)?,
        records: row.get(10)?,
        unmatched: row.get(11)?,
        incomplete: row.get(12)?,
        duplicates: row.get(13)?,
        error: row.get(14)?,
    })
}

const RECORD_COLUMNS: &str = "url, title, company, location, location_needs_review, contract_type, \
    raw_contract, salary_min, salary_max, salary_currency, salary_period, daily_rate_min, \
    daily_rate_max, daily_rate_currency, description, posted_date, updated_date, start_date, \
    start_asap, duration_days, experience, remote_work, skills, company_location, company_size, \
    company_type";

fn record_from_row(row: &Row) -> Result<JobRecord> {
    let contract: String = row.get(5)?;
    let skills: String = row.get(22)?;
    Ok(JobRecord {
        url: row.get(0)?,
        title: row.get(1)?,
        company: row.get(2)?,
        company_location: row.get(23)?,
        company_size: row.get(24)?,
        company_type: row.get(25)?,
        location: row.get(3)?,
        location_needs_review: row.get(4)?,
        contract_type: ContractType::from_str(&contract).unwrap_or(ContractType::Unknown),
        raw_contract: row.get(6)?,
        salary_range: range_from_columns(row.get(7)?, row.get(8)?, row.get(9)?, row.get(10)?),
        daily_rate: range_from_columns(
            row.get(11)?,
            row.get(12)?,
            row.get(13)?,
            Some(PayPeriod::Daily.as_str().to_string()),
        ),
        description: row.get(14)?,
        posted_date: parse_date(row.get(15)?),
        updated_date: parse_date(row.get(16)?),
        start_date: parse_date(row.get(17)?),
        start_asap: row.get(18)?,
        duration_days: row.get(19)?,
        experience: row.get(20)?,
        remote_work: row.get(21)?,
        skills: serde_json::from_str(&skills).unwrap_or_default(),
    })
}

impl Database {
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            "
            -- Crawl runs
            CREATE TABLE IF NOT EXISTS crawl_sessions (
    id TEXT PRIMARY KEY,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed')),
    start_urls TEXT NOT NULL,  -- JSON array
    configuration TEXT,        -- JSON configuration used

    -- Run counters
    listing_pages INTEGER NOT NULL DEFAULT 0,
    listing_failures INTEGER NOT NULL DEFAULT 0,
    detail_pages INTEGER NOT NULL DEFAULT 0,
    detail_failures INTEGER NOT NULL DEFAULT 0,
    skipped_cards INTEGER NOT NULL DEFAULT 0,
    records_emitted INTEGER NOT NULL DEFAULT 0,
    unmatched INTEGER NOT NULL DEFAULT 0,
    incomplete INTEGER NOT NULL DEFAULT 0,
    duplicates INTEGER NOT NULL DEFAULT 0,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_sessions_start ON crawl_sessions(start_time);

-- Normalized job postings
CREATE TABLE IF NOT EXISTS job_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    company TEXT NOT NULL,
    company_location TEXT,
    company_size TEXT,
    company_type TEXT,
    location TEXT NOT NULL,
    location_needs_review BOOLEAN NOT NULL DEFAULT 0,
    contract_type TEXT NOT NULL CHECK(contract_type IN ('permanent', 'freelance', 'internship', 'unknown')),
    raw_contract TEXT,

    -- Compensation
    salary_min INTEGER,
    salary_max INTEGER,
    salary_currency TEXT,
    salary_period TEXT,
    daily_rate_min INTEGER,
    daily_rate_max INTEGER,
    daily_rate_currency TEXT,

    description TEXT NOT NULL,

    -- Dates as YYYY-MM-DD
    posted_date TEXT,
    updated_date TEXT,
    start_date TEXT,
    start_asap BOOLEAN NOT NULL DEFAULT 0,
    duration_days REAL,

    experience TEXT,
    remote_work TEXT,
    skills TEXT NOT NULL DEFAULT '[]',  -- JSON array
    scraped_at INTEGER NOT NULL,

    FOREIGN KEY(session_id) REFERENCES crawl_sessions(id) ON DELETE CASCADE,
    UNIQUE(session_id, url)
);

CREATE INDEX IF NOT EXISTS idx_records_session ON job_records(session_id);
CREATE INDEX IF NOT EXISTS idx_records_contract ON job_records(contract_type);
CREATE INDEX IF NOT EXISTS idx_records_location ON job_records(location);
            ",
        )?;
        Ok(())
    }

    // Session management
    pub fn create_session(&self, start_urls: &[String], configuration: Option<&str>) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let timestamp = current_timestamp();
        let start_urls = serde_json::to_string(start_urls).unwrap_or_else(|_| "[]".to_string());

        self.conn().execute(
            "INSERT INTO crawl_sessions (id, start_time, status, start_urls, configuration) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![&session_id, timestamp, SessionStatus::Running.as_str(), start_urls, configuration],
        )?;

        Ok(session_id)
    }

    pub fn complete_session(&self, session_id: &str, stats: &CrawlStats) -> Result<()> {
        let timestamp = current_timestamp();
        self.conn().execute(
            "UPDATE crawl_sessions SET status = ?1, end_time = ?2,
                listing_pages = ?3, listing_failures = ?4, detail_pages = ?5, detail_failures = ?6,
                skipped_cards = ?7, records_emitted = ?8, unmatched = ?9, incomplete = ?10, duplicates = ?11
             WHERE id = ?12",
            params![
                SessionStatus::Completed.as_str(),
                timestamp,
                stats.listing_pages as i64,
                stats.listing_failures as i64,
                stats.detail_pages as i64,
                stats.detail_failures as i64,
                stats.skipped_cards as i64,
                stats.assembly.emitted as i64,
                stats.assembly.unmatched as i64,
                stats.assembly.incomplete as i64,
                stats.assembly.duplicates as i64,
                session_id,
            ],
        )?;
        Ok(())
    }

    pub fn fail_session(&self, session_id: &str, error: &str) -> Result<()> {
        let timestamp = current_timestamp();
        self.conn().execute(
            "UPDATE crawl_sessions SET status = ?1, end_time = ?2, error = ?3,
                records_emitted = (SELECT COUNT(*) FROM job_records WHERE session_id = ?4)
             WHERE id = ?4",
            params![SessionStatus::Failed.as_str(), timestamp, error, session_id],
        )?;
        Ok(())
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionInfo>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM crawl_sessions WHERE id = ?1",
            SESSION_COLUMNS
        ))?;
        stmt.query_row(params![session_id], session_from_row).optional()
    }

    /// All sessions, newest first.
    pub fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM crawl_sessions ORDER BY start_time DESC, rowid DESC",
            SESSION_COLUMNS
        ))?;
        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(sessions)
    }

    pub fn latest_completed_session(&self) -> Result<Option<SessionInfo>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM crawl_sessions WHERE status = 'completed'
             ORDER BY start_time DESC, rowid DESC LIMIT 1",
            SESSION_COLUMNS
        ))?;
        stmt.query_row([], session_from_row).optional()
    }

    // Record operations
    pub fn insert_record(&self, session_id: &str, record: &JobRecord) -> Result<i64> {
        let timestamp = current_timestamp();
        let salary = record.salary_range.as_ref();
        let daily = record.daily_rate.as_ref();
        let (salary_min, salary_max) = range_bounds(salary)?;
        let (daily_min, daily_max) = range_bounds(daily)?;
        let skills = serde_json::to_string(&record.skills).unwrap_or_else(|_| "[]".to_string());

        let conn = self.conn();
        conn.execute(
            "INSERT INTO job_records (
                session_id, url, title, company, location, location_needs_review, contract_type,
                raw_contract, salary_min, salary_max, salary_currency, salary_period,
                daily_rate_min, daily_rate_max, daily_rate_currency, description, posted_date,
                updated_date, start_date, start_asap, duration_days, experience, remote_work,
                skills, scraped_at, company_location, company_size, company_type
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28)",
            params![
                session_id,
                &record.url,
                &record.title,
                &record.company,
                &record.location,
                record.location_needs_review,
                record.contract_type.as_str(),
                &record.raw_contract,
                salary_min,
                salary_max,
                salary.map(|s| s.currency.as_str()),
                salary.map(|s| s.period.as_str()),
                daily_min,
                daily_max,
                daily.map(|d| d.currency.as_str()),
                &record.description,
                format_date(record.posted_date),
                format_date(record.updated_date),
                format_date(record.start_date),
                record.start_asap,
                record.duration_days,
                &record.experience,
                &record.remote_work,
                skills,
                timestamp,
                &record.company_location,
                &record.company_size,
                &record.company_type,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    pub fn get_records_by_session(&self, session_id: &str) -> Result<Vec<JobRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM job_records WHERE session_id = ?1 ORDER BY id",
            RECORD_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![session_id], record_from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(records)
    }

    pub fn get_contract_counts(&self, session_id: &str) -> Result<Vec<(String, i64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT contract_type, COUNT(*) FROM job_records WHERE session_id = ?1
             GROUP BY contract_type ORDER BY COUNT(*) DESC, contract_type",
        )?;

        let counts = stmt
            .query_map(params![session_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>>>()?;

        Ok(counts)
    }
}

/// Writes every assembled record of one session into the database.
pub struct SessionSink {
    db: Arc<Database>,
    session_id: String,
}

impl SessionSink {
    pub fn new(db: Arc<Database>, session_id: impl Into<String>) -> Self {
        Self {
            db,
            session_id: session_id.into(),
        }
    }
}

impl RecordSink for SessionSink {
    fn write(&self, record: &JobRecord) -> freelytics_scanner::error::Result<()> {
        self.db
            .insert_record(&self.session_id, record)
            .map(|_| ())
            .map_err(|e| ScanError::Sink(format!("failed to store {}: {}", record.url, e)))
    }
}
