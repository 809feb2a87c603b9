use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Which kind of page a piece of markup came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Listing,
    Detail,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageKind::Listing => "listing",
            PageKind::Detail => "detail",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "listing" | "list" => Some(PageKind::Listing),
            "detail" | "job" => Some(PageKind::Detail),
            _ => None,
        }
    }
}

/// Partial job parsed from a search results card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListingStub {
    pub url: String,
    pub title: String,
    pub company: String,
    pub raw_location: Option<String>,
    pub raw_contract: Option<String>,
    pub posted_date: Option<String>,
}

impl JobListingStub {
    pub fn new(url: String, title: String) -> Self {
        Self {
            url,
            title,
            company: String::new(),
            raw_location: None,
            raw_contract: None,
            posted_date: None,
        }
    }
}

/// Partial job parsed from the job's own page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDetail {
    pub url: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub description: String,
    pub raw_salary: Option<String>,
    pub raw_daily_rate: Option<String>,
    pub raw_location: Option<String>,
    pub raw_contract: Option<String>,
    pub raw_company_description: Option<String>,
    pub raw_publication: Option<String>,
    pub raw_start_date: Option<String>,
    pub raw_duration: Option<String>,
    pub experience: Option<String>,
    pub remote_work: Option<String>,
    pub skills: Vec<String>,
}

impl JobDetail {
    pub fn new(url: String) -> Self {
        Self {
            url,
            ..Default::default()
        }
    }
}

/// Anything the assembler can merge into a pending job.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Stub(JobListingStub),
    Detail(JobDetail),
}

impl Fragment {
    pub fn url(&self) -> &str {
        match self {
            Fragment::Stub(stub) => &stub.url,
            Fragment::Detail(detail) => &detail.url,
        }
    }

    pub fn kind(&self) -> PageKind {
        match self {
            Fragment::Stub(_) => PageKind::Listing,
            Fragment::Detail(_) => PageKind::Detail,
        }
    }
}

impl From<JobListingStub> for Fragment {
    fn from(stub: JobListingStub) -> Self {
        Fragment::Stub(stub)
    }
}

impl From<JobDetail> for Fragment {
    fn from(detail: JobDetail) -> Self {
        Fragment::Detail(detail)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractType {
    Permanent,
    Freelance,
    Internship,
    Unknown,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::Permanent => "permanent",
            ContractType::Freelance => "freelance",
            ContractType::Internship => "internship",
            ContractType::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "permanent" => Some(ContractType::Permanent),
            "freelance" => Some(ContractType::Freelance),
            "internship" => Some(ContractType::Internship),
            "unknown" => Some(ContractType::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayPeriod {
    Annual,
    Daily,
    Unspecified,
}

impl PayPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayPeriod::Annual => "annual",
            PayPeriod::Daily => "daily",
            PayPeriod::Unspecified => "unspecified",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "annual" => Some(PayPeriod::Annual),
            "daily" => Some(PayPeriod::Daily),
            "unspecified" => Some(PayPeriod::Unspecified),
            _ => None,
        }
    }
}

/// Numeric pay range. `min <= max` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: u64,
    pub max: u64,
    pub currency: String,
    pub period: PayPeriod,
}

impl SalaryRange {
    pub fn new(min: u64, max: u64, currency: &str, period: PayPeriod) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            currency: currency.to_string(),
            period,
        }
    }

    /// `(min, max, currency)` view.
    pub fn as_triple(&self) -> (u64, u64, &str) {
        (self.min, self.max, self.currency.as_str())
    }
}

/// A complete, normalized job posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub url: String,
    pub title: String,
    pub company: String,
    pub company_location: Option<String>,
    pub company_size: Option<String>,
    pub company_type: Option<String>,
    pub location: String,
    pub location_needs_review: bool,
    pub contract_type: ContractType,
    pub raw_contract: Option<String>,
    pub salary_range: Option<SalaryRange>,
    pub daily_rate: Option<SalaryRange>,
    pub description: String,
    pub posted_date: Option<NaiveDate>,
    pub updated_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub start_asap: bool,
    pub duration_days: Option<f64>,
    pub experience: Option<String>,
    pub remote_work: Option<String>,
    pub skills: Vec<String>,
}

impl JobRecord {
    /// Names of the required fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.url.trim().is_empty() {
            missing.push("url");
        }
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.company.trim().is_empty() {
            missing.push("company");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        missing
    }
}

/// Canonical form of a job URL: absolute http(s), fragment removed.
pub fn canonical_url(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url.trim()).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    parsed.set_fragment(None);
    Some(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_url_strips_fragment() {
        assert_eq!(
            canonical_url("https://www.free-work.com/fr/job-mission/abc#apply"),
            Some("https://www.free-work.com/fr/job-mission/abc".to_string())
        );
    }

    #[test]
    fn test_canonical_url_rejects_relative_and_other_schemes() {
        assert_eq!(canonical_url("/fr/job-mission/abc"), None);
        assert_eq!(canonical_url("mailto:jobs@example.com"), None);
    }

    #[test]
    fn test_salary_range_orders_bounds() {
        let range = SalaryRange::new(55000, 45000, "EUR", PayPeriod::Annual);
        assert_eq!(range.as_triple(), (45000, 55000, "EUR"));
    }

    #[test]
    fn test_contract_type_round_trip_names() {
        for kind in [
            ContractType::Permanent,
            ContractType::Freelance,
            ContractType::Internship,
            ContractType::Unknown,
        ] {
            assert_eq!(ContractType::from_str(kind.as_str()), Some(kind));
        }
    }
}
