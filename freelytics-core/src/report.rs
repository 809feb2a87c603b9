// Record exports and run reports

use crate::data::SessionInfo;
use chrono::NaiveDate;
use freelytics_scanner::{JobRecord, SalaryRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

const CSV_HEADER: &[&str] = &[
    "url",
    "title",
    "company",
    "company_location",
    "company_size",
    "company_type",
    "location",
    "location_needs_review",
    "contract_type",
    "raw_contract",
    "salary_min",
    "salary_max",
    "salary_currency",
    "salary_period",
    "daily_rate_min",
    "daily_rate_max",
    "daily_rate_currency",
    "posted_date",
    "updated_date",
    "start_date",
    "start_asap",
    "duration_days",
    "experience",
    "remote_work",
    "skills",
    "description",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Jsonl,
    Csv,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "jsonl" | "ndjson" => Some(ReportFormat::Jsonl),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Jsonl => "jsonl",
            ReportFormat::Csv => "csv",
        }
    }
}

/// Render records in the requested format.
pub fn render_records(
    records: &[JobRecord],
    format: ReportFormat,
    session: Option<&SessionInfo>,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(records, session)),
        ReportFormat::Json => generate_json_report(records, session),
        ReportFormat::Jsonl => generate_jsonl(records),
        ReportFormat::Csv => Ok(generate_csv(records)),
    }
}

/// `scraped_jobs_<YYYY-MM-DD>.csv`, the daily export name.
pub fn dated_export_name(date: NaiveDate) -> String {
    format!("scraped_jobs_{}.csv", date.format("%Y-%m-%d"))
}

pub fn generate_csv(records: &[JobRecord]) -> String {
    let mut out = String::new();
    out.push_str(&CSV_HEADER.join(","));
    out.push('\n');

    for record in records {
        let (salary_min, salary_max, salary_currency, salary_period) =
            range_columns(record.salary_range.as_ref());
        let (daily_min, daily_max, daily_currency, _) = range_columns(record.daily_rate.as_ref());

        let fields = [
            record.url.clone(),
            record.title.clone(),
            record.company.clone(),
            record.company_location.clone().unwrap_or_default(),
            record.company_size.clone().unwrap_or_default(),
            record.company_type.clone().unwrap_or_default(),
            record.location.clone(),
            record.location_needs_review.to_string(),
            record.contract_type.as_str().to_string(),
            record.raw_contract.clone().unwrap_or_default(),
            salary_min,
            salary_max,
            salary_currency,
            salary_period,
            daily_min,
            daily_max,
            daily_currency,
            format_date(record.posted_date),
            format_date(record.updated_date),
            format_date(record.start_date),
            record.start_asap.to_string(),
            record.duration_days.map(|d| d.to_string()).unwrap_or_default(),
            record.experience.clone().unwrap_or_default(),
            record.remote_work.clone().unwrap_or_default(),
            record.skills.join("; "),
            record.description.clone(),
        ];

        let line: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }

    out
}

fn range_columns(range: Option<&SalaryRange>) -> (String, String, String, String) {
    match range {
        Some(r) => (
            r.min.to_string(),
            r.max.to_string(),
            r.currency.clone(),
            r.period.as_str().to_string(),
        ),
        None => Default::default(),
    }
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// One JSON object per line.
pub fn generate_jsonl(records: &[JobRecord]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

pub fn generate_json_report(
    records: &[JobRecord],
    session: Option<&SessionInfo>,
) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "FreeLytics",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "session": session.map(|s| serde_json::json!({
                "id": s.id,
                "status": s.status.as_str(),
                "start_time": format_iso8601_timestamp(s.start_time),
                "end_time": s.end_time.map(format_iso8601_timestamp),
                "start_urls": s.start_urls,
                "unmatched": s.unmatched,
                "incomplete": s.incomplete,
                "duplicates": s.duplicates,
            })),
            "summary": {
                "total_records": records.len(),
                "contract_breakdown": contract_breakdown(records),
                "with_salary": records.iter().filter(|r| r.salary_range.is_some()).count(),
                "with_daily_rate": records.iter().filter(|r| r.daily_rate.is_some()).count(),
                "locations_needing_review": records.iter().filter(|r| r.location_needs_review).count()
            },
            "records": records
        }
    });

    serde_json::to_string_pretty(&json_report)
}

fn contract_breakdown(records: &[JobRecord]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.contract_type.as_str()).or_insert(0) += 1;
    }
    counts
}

pub fn generate_text_report(records: &[JobRecord], session: Option<&SessionInfo>) -> String {
    let mut report = String::new();
    let bar = "━".repeat(80);

    report.push_str(&format!("{}\n", bar));
    report.push_str("                          FREELYTICS JOB REPORT\n");
    report.push_str(&format!("{}\n\n", bar));

    if let Some(session) = session {
        report.push_str(&format!("Session ID:   {}\n", session.id));
        report.push_str(&format!("Status:       {}\n", session.status.as_str()));
        report.push_str(&format!("Crawl Date:   {}\n", format_timestamp(session.start_time)));
        if let Some(end_time) = session.end_time {
            report.push_str(&format!("Duration:     {} seconds\n", end_time - session.start_time));
        }
        report.push_str(&format!("Searches:     {}\n", session.start_urls.len()));
    }
    report.push_str(&format!("Records:      {}\n\n", records.len()));

    if !records.is_empty() {
        report.push_str("By contract:\n");
        for (contract, count) in contract_breakdown(records) {
            report.push_str(&format!("  {:<12} {}\n", contract, count));
        }
        report.push('\n');
    }

    for (idx, record) in records.iter().enumerate() {
        report.push_str(&format!("{}\n", "─".repeat(80)));
        report.push_str(&format!("[{}] {}\n", idx + 1, record.title));
        report.push_str(&format!("Company:      {}\n", record.company));
        let profile: Vec<&str> = [&record.company_type, &record.company_size, &record.company_location]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .collect();
        if !profile.is_empty() {
            report.push_str(&format!("Company info: {}\n", profile.join(" | ")));
        }

        let review = if record.location_needs_review { " (needs review)" } else { "" };
        report.push_str(&format!("Location:     {}{}\n", record.location, review));
        report.push_str(&format!("Contract:     {}\n", record.contract_type));

        if let Some(ref salary) = record.salary_range {
            report.push_str(&format!("Salary:       {}\n", format_range(salary)));
        }
        if let Some(ref rate) = record.daily_rate {
            report.push_str(&format!("Daily rate:   {}\n", format_range(rate)));
        }
        if let Some(posted) = record.posted_date {
            report.push_str(&format!("Posted:       {}\n", posted));
        }
        if record.start_asap {
            report.push_str("Start:        as soon as possible\n");
        } else if let Some(start) = record.start_date {
            report.push_str(&format!("Start:        {}\n", start));
        }
        if let Some(days) = record.duration_days {
            report.push_str(&format!("Duration:     {} days\n", days));
        }
        if !record.skills.is_empty() {
            report.push_str(&format!("Skills:       {}\n", record.skills.join(", ")));
        }
        report.push_str(&format!("URL:          {}\n\n", record.url));
    }

    report
}

fn format_range(range: &SalaryRange) -> String {
    if range.min == range.max {
        format!("{} {}", range.min, range.currency)
    } else {
        format!("{}-{} {}", range.min, range.max, range.currency)
    }
}

fn format_timestamp(timestamp: i64) -> String {
    use chrono::{DateTime, Utc};
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn format_iso8601_timestamp(timestamp: i64) -> String {
    use chrono::{DateTime, Utc};
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
