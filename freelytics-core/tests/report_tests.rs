// Tests for record exports and report generation

use chrono::NaiveDate;
use freelytics_core::data::{SessionInfo, SessionStatus};
use freelytics_core::report::{
    ReportFormat, dated_export_name, generate_csv, generate_json_report, generate_jsonl,
    generate_text_report, render_records, save_report,
};
use freelytics_scanner::{ContractType, JobRecord, PayPeriod, SalaryRange};
use tempfile::TempDir;

fn create_test_record(url: &str, contract_type: ContractType) -> JobRecord {
    JobRecord {
        url: url.to_string(),
        title: "Data Engineer".to_string(),
        company: "Acme".to_string(),
        company_location: None,
        company_size: None,
        company_type: None,
        location: "lyon".to_string(),
        location_needs_review: false,
        contract_type,
        raw_contract: None,
        salary_range: None,
        daily_rate: None,
        description: "Build data pipelines".to_string(),
        posted_date: NaiveDate::from_ymd_opt(2025, 7, 21),
        updated_date: None,
        start_date: None,
        start_asap: false,
        duration_days: None,
        experience: None,
        remote_work: None,
        skills: Vec::new(),
    }
}

fn create_test_session() -> SessionInfo {
    SessionInfo {
        id: "session-1".to_string(),
        start_time: 1_700_000_000,
        end_time: Some(1_700_000_042),
        status: SessionStatus::Completed,
        start_urls: vec!["https://example.com/jobs?query=rust".to_string()],
        listing_pages: 2,
        listing_failures: 0,
        detail_pages: 2,
        detail_failures: 0,
        skipped_cards: 0,
        records: 2,
        unmatched: 1,
        incomplete: 0,
        duplicates: 0,
        error: None,
    }
}

// ============================================================================
// Report Format Tests
// ============================================================================

#[test]
fn test_report_format_from_str() {
    assert_eq!(ReportFormat::from_str("text"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("txt"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("json"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("jsonl"), Some(ReportFormat::Jsonl));
    assert_eq!(ReportFormat::from_str("ndjson"), Some(ReportFormat::Jsonl));
    assert_eq!(ReportFormat::from_str("csv"), Some(ReportFormat::Csv));
}

#[test]
fn test_report_format_from_str_case_insensitive() {
    assert_eq!(ReportFormat::from_str("CSV"), Some(ReportFormat::Csv));
    assert_eq!(ReportFormat::from_str("Json"), Some(ReportFormat::Json));
}

#[test]
fn test_report_format_from_str_invalid() {
    assert_eq!(ReportFormat::from_str("xml"), None);
    assert_eq!(ReportFormat::from_str(""), None);
}

#[test]
fn test_report_format_extension() {
    assert_eq!(ReportFormat::Text.extension(), "txt");
    assert_eq!(ReportFormat::Jsonl.extension(), "jsonl");
    assert_eq!(ReportFormat::Csv.extension(), "csv");
}

#[test]
fn test_dated_export_name() {
    let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
    assert_eq!(dated_export_name(date), "scraped_jobs_2025-03-07.csv");
}

// ============================================================================
// CSV Tests
// ============================================================================

#[test]
fn test_csv_empty_has_header_only() {
    let csv = generate_csv(&[]);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with(
        "url,title,company,company_location,company_size,company_type,location"
    ));
    assert_eq!(lines[0].split(',').count(), 26);
}

#[test]
fn test_csv_row_values() {
    let mut record = create_test_record("https://example.com/job/1", ContractType::Freelance);
    record.daily_rate = Some(SalaryRange::new(500, 600, "EUR", PayPeriod::Daily));
    record.skills = vec!["Rust".to_string(), "SQL".to_string()];
    record.start_asap = true;

    let csv = generate_csv(&[record]);
    let row = csv.lines().nth(1).unwrap();

    assert!(row.starts_with("https://example.com/job/1,Data Engineer,Acme,,,,lyon,false,freelance,"));
    assert!(row.contains(",500,600,EUR,"));
    assert!(row.contains(",2025-07-21,"));
    assert!(row.contains(",true,"));
    assert!(row.contains("Rust; SQL"));
    assert!(row.ends_with("Build data pipelines"));
}

#[test]
fn test_csv_company_profile_columns() {
    let mut record = create_test_record("https://example.com/job/1", ContractType::Permanent);
    record.company_location = Some("Paris, France".to_string());
    record.company_size = Some("250 - 999 salariés".to_string());
    record.company_type = Some("ESN".to_string());

    let csv = generate_csv(&[record]);
    let row = csv.lines().nth(1).unwrap();

    assert!(row.starts_with(
        "https://example.com/job/1,Data Engineer,Acme,\"Paris, France\",250 - 999 salariés,ESN,lyon,"
    ));
}

#[test]
fn test_csv_escapes_special_characters() {
    let mut record = create_test_record("https://example.com/job/1", ContractType::Permanent);
    record.title = "Engineer, \"Senior\"".to_string();
    record.description = "line one\nline two".to_string();

    let csv = generate_csv(&[record]);

    assert!(csv.contains("\"Engineer, \"\"Senior\"\"\""));
    assert!(csv.contains("\"line one\nline two\""));
}

// ============================================================================
// JSON Tests
// ============================================================================

#[test]
fn test_jsonl_one_object_per_line() {
    let records = vec![
        create_test_record("https://example.com/job/1", ContractType::Permanent),
        create_test_record("https://example.com/job/2", ContractType::Internship),
    ];

    let output = generate_jsonl(&records).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);

    let parsed: JobRecord = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(parsed, records[1]);
}

#[test]
fn test_json_report_structure() {
    let records = vec![
        create_test_record("https://example.com/job/1", ContractType::Permanent),
        create_test_record("https://example.com/job/2", ContractType::Permanent),
        create_test_record("https://example.com/job/3", ContractType::Freelance),
    ];
    let session = create_test_session();

    let output = generate_json_report(&records, Some(&session)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    let report = &value["report"];

    assert_eq!(report["metadata"]["generator"], "FreeLytics");
    assert_eq!(report["session"]["id"], "session-1");
    assert_eq!(report["session"]["status"], "completed");
    assert_eq!(report["summary"]["total_records"], 3);
    assert_eq!(report["summary"]["contract_breakdown"]["permanent"], 2);
    assert_eq!(report["summary"]["contract_breakdown"]["freelance"], 1);
    assert_eq!(report["records"].as_array().unwrap().len(), 3);
    assert!(report["records"][0]["company_type"].is_null());
}

#[test]
fn test_json_report_company_profile() {
    let mut record = create_test_record("https://example.com/job/1", ContractType::Permanent);
    record.company_size = Some("< 20 salariés".to_string());
    record.company_type = Some("Cabinet de recrutement / placement".to_string());

    let output = generate_json_report(&[record], None).unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    let exported = &value["report"]["records"][0];

    assert!(exported["company_location"].is_null());
    assert_eq!(exported["company_size"], "< 20 salariés");
    assert_eq!(exported["company_type"], "Cabinet de recrutement / placement");
}

#[test]
fn test_json_report_without_session() {
    let output = generate_json_report(&[], None).unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();

    assert!(value["report"]["session"].is_null());
    assert_eq!(value["report"]["summary"]["total_records"], 0);
}

// ============================================================================
// Text Report Tests
// ============================================================================

#[test]
fn test_text_report_content() {
    let mut record = create_test_record("https://example.com/job/1", ContractType::Freelance);
    record.location_needs_review = true;
    record.salary_range = Some(SalaryRange::new(50000, 50000, "EUR", PayPeriod::Annual));
    record.company_type = Some("ESN".to_string());
    record.company_size = Some("> 1 000 salariés".to_string());
    let session = create_test_session();

    let report = generate_text_report(&[record], Some(&session));

    assert!(report.contains("FREELYTICS JOB REPORT"));
    assert!(report.contains("Session ID:   session-1"));
    assert!(report.contains("Duration:     42 seconds"));
    assert!(report.contains("[1] Data Engineer"));
    assert!(report.contains("Company info: ESN | > 1 000 salariés"));
    assert!(report.contains("Location:     lyon (needs review)"));
    assert!(report.contains("Salary:       50000 EUR"));
    assert!(report.contains("URL:          https://example.com/job/1"));
}

#[test]
fn test_render_records_dispatches_format() {
    let records = vec![create_test_record("https://example.com/job/1", ContractType::Permanent)];

    let csv = render_records(&records, ReportFormat::Csv, None).unwrap();
    assert!(csv.starts_with("url,"));

    let jsonl = render_records(&records, ReportFormat::Jsonl, None).unwrap();
    assert_eq!(jsonl.lines().count(), 1);

    let text = render_records(&records, ReportFormat::Text, None).unwrap();
    assert!(text.contains("Records:      1"));
}

// ============================================================================
// Save Report Tests
// ============================================================================

#[test]
fn test_save_report_creates_parent_dirs() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("exports").join("jobs.csv");

    save_report("url\n", &path).unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "url\n");
}
