// Tests for database functionality

use chrono::NaiveDate;
use freelytics_core::data::{Database, SessionSink, SessionStatus};
use freelytics_scanner::{
    AssemblyReport, ContractType, CrawlStats, JobRecord, PayPeriod, RecordSink, SalaryRange,
};
use std::sync::Arc;
use tempfile::TempDir;

fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}

fn sample_record(url: &str) -> JobRecord {
    JobRecord {
        url: url.to_string(),
        title: "Data Engineer H/F".to_string(),
        company: "Acme".to_string(),
        company_location: Some("Paris, France".to_string()),
        company_size: Some("250 - 999 salariés".to_string()),
        company_type: Some("ESN".to_string()),
        location: "paris".to_string(),
        location_needs_review: false,
        contract_type: ContractType::Freelance,
        raw_contract: Some("Freelance".to_string()),
        salary_range: Some(SalaryRange::new(45000, 55000, "EUR", PayPeriod::Annual)),
        daily_rate: Some(SalaryRange::new(400, 650, "EUR", PayPeriod::Daily)),
        description: "Build pipelines".to_string(),
        posted_date: NaiveDate::from_ymd_opt(2025, 7, 21),
        updated_date: NaiveDate::from_ymd_opt(2025, 7, 23),
        start_date: None,
        start_asap: true,
        duration_days: Some(180.0),
        experience: Some("5 à 10 ans".to_string()),
        remote_work: Some("Télétravail partiel".to_string()),
        skills: vec!["Python".to_string(), "SQL".to_string()],
    }
}

fn sample_stats(emitted: usize) -> CrawlStats {
    CrawlStats {
        listing_pages: 3,
        listing_failures: 1,
        stubs: 40,
        skipped_cards: 2,
        detail_pages: 38,
        detail_failures: 2,
        assembly: AssemblyReport {
            emitted,
            unmatched: 2,
            incomplete: 1,
            duplicates: 0,
        },
    }
}

// ============================================================================
// Database Creation Tests
// ============================================================================

#[test]
fn test_database_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let db = Database::new(&db_path);
    assert!(db.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_database_exists() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    assert!(!Database::exists(&db_path));

    let _db = Database::new(&db_path).unwrap();
    assert!(Database::exists(&db_path));
}

#[test]
fn test_database_drop() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let db = Database::new(&db_path).unwrap();
    drop(db);
    assert!(Database::exists(&db_path));

    Database::drop(&db_path).unwrap();
    assert!(!Database::exists(&db_path));
}

#[test]
fn test_database_reopen_keeps_data() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let session_id = {
        let db = Database::new(&db_path).unwrap();
        let id = db.create_session(&["https://example.com/jobs".to_string()], None).unwrap();
        db.insert_record(&id, &sample_record("https://example.com/job/1")).unwrap();
        id
    };

    let db = Database::new(&db_path).unwrap();
    assert_eq!(db.get_records_by_session(&session_id).unwrap().len(), 1);
}

// ============================================================================
// Session Tests
// ============================================================================

#[test]
fn test_create_session() {
    let (_temp_dir, db) = create_test_db();

    let urls = vec!["https://example.com/jobs?query=rust".to_string()];
    let session_id = db.create_session(&urls, Some("{}")).unwrap();
    assert!(!session_id.is_empty());

    let session = db.get_session(&session_id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Running);
    assert_eq!(session.start_urls, urls);
    assert_eq!(session.end_time, None);
}

#[test]
fn test_create_multiple_sessions() {
    let (_temp_dir, db) = create_test_db();

    let session1 = db.create_session(&[], None).unwrap();
    let session2 = db.create_session(&[], None).unwrap();

    assert_ne!(session1, session2);
    assert_eq!(db.list_sessions().unwrap().len(), 2);
}

#[test]
fn test_complete_session_stores_counters() {
    let (_temp_dir, db) = create_test_db();
    let session_id = db.create_session(&[], None).unwrap();

    db.complete_session(&session_id, &sample_stats(35)).unwrap();

    let session = db.get_session(&session_id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.end_time.is_some());
    assert_eq!(session.listing_pages, 3);
    assert_eq!(session.detail_failures, 2);
    assert_eq!(session.records, 35);
    assert_eq!(session.unmatched, 2);
    assert_eq!(session.incomplete, 1);
}

#[test]
fn test_fail_session() {
    let (_temp_dir, db) = create_test_db();
    let session_id = db.create_session(&[], None).unwrap();
    db.insert_record(&session_id, &sample_record("https://example.com/job/1")).unwrap();

    db.fail_session(&session_id, "Record sink failed: disk full").unwrap();

    let session = db.get_session(&session_id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.error.as_deref(), Some("Record sink failed: disk full"));
    assert_eq!(session.records, 1);
}

#[test]
fn test_get_unknown_session() {
    let (_temp_dir, db) = create_test_db();
    assert!(db.get_session("missing").unwrap().is_none());
}

#[test]
fn test_latest_completed_session() {
    let (_temp_dir, db) = create_test_db();
    assert!(db.latest_completed_session().unwrap().is_none());

    let first = db.create_session(&[], None).unwrap();
    db.complete_session(&first, &sample_stats(1)).unwrap();
    let second = db.create_session(&[], None).unwrap();
    db.complete_session(&second, &sample_stats(2)).unwrap();
    let failed = db.create_session(&[], None).unwrap();
    db.fail_session(&failed, "boom").unwrap();

    let latest = db.latest_completed_session().unwrap().unwrap();
    assert_eq!(latest.id, second);
}

// ============================================================================
// Record Tests
// ============================================================================

#[test]
fn test_insert_and_read_record() {
    let (_temp_dir, db) = create_test_db();
    let session_id = db.create_session(&[], None).unwrap();
    let record = sample_record("https://example.com/job/1");

    let id = db.insert_record(&session_id, &record).unwrap();
    assert!(id > 0);

    let records = db.get_records_by_session(&session_id).unwrap();
    assert_eq!(records, vec![record]);
}

#[test]
fn test_record_without_optional_fields() {
    let (_temp_dir, db) = create_test_db();
    let session_id = db.create_session(&[], None).unwrap();

    let mut record = sample_record("https://example.com/job/2");
    record.salary_range = None;
    record.daily_rate = None;
    record.posted_date = None;
    record.updated_date = None;
    record.duration_days = None;
    record.experience = None;
    record.skills.clear();
    record.contract_type = ContractType::Unknown;
    record.raw_contract = None;
    record.company_location = None;
    record.company_size = None;
    record.company_type = None;

    db.insert_record(&session_id, &record).unwrap();
    assert_eq!(db.get_records_by_session(&session_id).unwrap(), vec![record]);
}

#[test]
fn test_record_with_out_of_range_pay_is_rejected() {
    let (_temp_dir, db) = create_test_db();
    let session_id = db.create_session(&[], None).unwrap();

    let mut record = sample_record("https://example.com/job/1");
    record.salary_range = Some(SalaryRange::new(45000, u64::MAX, "EUR", PayPeriod::Annual));
    assert!(db.insert_record(&session_id, &record).is_err());

    let mut record = sample_record("https://example.com/job/2");
    record.daily_rate = Some(SalaryRange::new(u64::MAX, u64::MAX, "EUR", PayPeriod::Daily));
    assert!(db.insert_record(&session_id, &record).is_err());

    assert!(db.get_records_by_session(&session_id).unwrap().is_empty());
}

#[test]
fn test_largest_pay_bound_round_trips() {
    let (_temp_dir, db) = create_test_db();
    let session_id = db.create_session(&[], None).unwrap();

    let mut record = sample_record("https://example.com/job/1");
    record.salary_range = Some(SalaryRange::new(0, i64::MAX as u64, "EUR", PayPeriod::Annual));
    db.insert_record(&session_id, &record).unwrap();

    assert_eq!(db.get_records_by_session(&session_id).unwrap(), vec![record]);
}

#[test]
fn test_duplicate_url_in_session_is_rejected() {
    let (_temp_dir, db) = create_test_db();
    let session_id = db.create_session(&[], None).unwrap();
    let record = sample_record("https://example.com/job/1");

    db.insert_record(&session_id, &record).unwrap();
    assert!(db.insert_record(&session_id, &record).is_err());
}

#[test]
fn test_same_url_in_two_sessions() {
    let (_temp_dir, db) = create_test_db();
    let first = db.create_session(&[], None).unwrap();
    let second = db.create_session(&[], None).unwrap();
    let record = sample_record("https://example.com/job/1");

    db.insert_record(&first, &record).unwrap();
    db.insert_record(&second, &record).unwrap();

    assert_eq!(db.get_records_by_session(&first).unwrap().len(), 1);
    assert_eq!(db.get_records_by_session(&second).unwrap().len(), 1);
}

#[test]
fn test_records_are_scoped_to_session() {
    let (_temp_dir, db) = create_test_db();
    let first = db.create_session(&[], None).unwrap();
    let second = db.create_session(&[], None).unwrap();

    db.insert_record(&first, &sample_record("https://example.com/job/1")).unwrap();
    db.insert_record(&first, &sample_record("https://example.com/job/2")).unwrap();

    assert_eq!(db.get_records_by_session(&first).unwrap().len(), 2);
    assert!(db.get_records_by_session(&second).unwrap().is_empty());
}

#[test]
fn test_contract_counts() {
    let (_temp_dir, db) = create_test_db();
    let session_id = db.create_session(&[], None).unwrap();

    let mut permanent = sample_record("https://example.com/job/1");
    permanent.contract_type = ContractType::Permanent;
    db.insert_record(&session_id, &permanent).unwrap();
    db.insert_record(&session_id, &sample_record("https://example.com/job/2")).unwrap();
    db.insert_record(&session_id, &sample_record("https://example.com/job/3")).unwrap();

    let counts = db.get_contract_counts(&session_id).unwrap();
    assert_eq!(
        counts,
        vec![("freelance".to_string(), 2), ("permanent".to_string(), 1)]
    );
}

// ============================================================================
// Session Sink Tests
// ============================================================================

#[test]
fn test_session_sink_writes_records() {
    let (_temp_dir, db) = create_test_db();
    let db = Arc::new(db);
    let session_id = db.create_session(&[], None).unwrap();

    let sink = SessionSink::new(db.clone(), session_id.clone());
    sink.write(&sample_record("https://example.com/job/1")).unwrap();

    assert_eq!(db.get_records_by_session(&session_id).unwrap().len(), 1);
}

#[test]
fn test_session_sink_reports_storage_errors() {
    let (_temp_dir, db) = create_test_db();
    let db = Arc::new(db);

    // Foreign key violation: the session does not exist
    let sink = SessionSink::new(db, "no-such-session");
    let result = sink.write(&sample_record("https://example.com/job/1"));

    assert!(matches!(result, Err(freelytics_scanner::ScanError::Sink(_))));
}
