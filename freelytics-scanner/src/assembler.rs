use crate::error::{Result, ScanError};
use crate::model::{
    Fragment, JobDetail, JobListingStub, JobRecord, PayPeriod, canonical_url,
};
use crate::normalize::{
    NormalizeRules, clean_text, normalize_contract, normalize_location, parse_company_description,
    parse_duration_days, parse_publication_date, parse_salary, parse_start_date,
};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Destination for completed records.
pub trait RecordSink: Send + Sync {
    fn write(&self, record: &JobRecord) -> Result<()>;
}

/// Sink that keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<JobRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<JobRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemorySink {
    fn write(&self, record: &JobRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| ScanError::Sink("memory sink lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}

/// Counters describing what happened to every job seen during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub emitted: usize,
    /// Jobs still waiting for their other half when the run ended
    pub unmatched: usize,
    /// Jobs dropped for a missing required field or unusable url
    pub incomplete: usize,
    /// Fragments received after their job was already emitted
    pub duplicates: usize,
}

#[derive(Debug, Default)]
struct PendingJob {
    stub: Option<JobListingStub>,
    detail: Option<JobDetail>,
}

impl PendingJob {
    fn merge(&mut self, fragment: Fragment, url: &str) {
        match fragment {
            Fragment::Stub(stub) => {
                if self.stub.is_some() {
                    debug!("Replacing listing stub for {}", url);
                }
                self.stub = Some(stub);
            }
            Fragment::Detail(detail) => {
                if self.detail.is_some() {
                    debug!("Replacing job detail for {}", url);
                }
                self.detail = Some(detail);
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.stub.is_some() && self.detail.is_some()
    }
}

/// Joins listing stubs with their detail pages into normalized records.
///
/// Fragments for the same url may arrive in any order and from any task.
/// Each url is emitted to the sink at most once per assembler.
pub struct Assembler {
    sink: Arc<dyn RecordSink>,
    rules: NormalizeRules,
    pending: DashMap<String, PendingJob>,
    emitted: DashSet<String>,
    emitted_count: AtomicUsize,
    incomplete: AtomicUsize,
    duplicates: AtomicUsize,
}

impl Assembler {
    pub fn new(sink: Arc<dyn RecordSink>, rules: NormalizeRules) -> Self {
        Self {
            sink,
            rules,
            pending: DashMap::new(),
            emitted: DashSet::new(),
            emitted_count: AtomicUsize::new(0),
            incomplete: AtomicUsize::new(0),
            duplicates: AtomicUsize::new(0),
        }
    }

    /// Merge a fragment and emit the record once both halves are present.
    ///
    /// Only sink failures are returned as errors.
    pub fn accept(&self, fragment: impl Into<Fragment>) -> Result<Option<JobRecord>> {
        let fragment = fragment.into();
        let Some(url) = canonical_url(fragment.url()) else {
            debug!("Dropping {} fragment with unusable url {:?}", fragment.kind().as_str(), fragment.url());
            self.incomplete.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        // The emitted check happens under the entry lock so two halves
        // racing for the same url cannot both complete it.
        let ready = match self.pending.entry(url.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().merge(fragment, &url);
                if entry.get().is_ready() {
                    self.emitted.insert(url.clone());
                    Some(entry.remove())
                } else {
                    None
                }
            }
            Entry::Vacant(entry) => {
                if self.emitted.contains(&url) {
                    debug!("Ignoring {} fragment for already emitted {}", fragment.kind().as_str(), url);
                    self.duplicates.fetch_add(1, Ordering::Relaxed);
                    return Ok(None);
                }
                let mut job = PendingJob::default();
                job.merge(fragment, &url);
                entry.insert(job);
                None
            }
        };

        let Some(PendingJob {
            stub: Some(stub),
            detail: Some(detail),
        }) = ready
        else {
            return Ok(None);
        };

        let record = self.assemble(url, stub, detail);
        let missing = record.missing_fields();
        if !missing.is_empty() {
            debug!("Dropping {}: missing {}", record.url, missing.join(", "));
            self.incomplete.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        self.sink.write(&record)?;
        self.emitted_count.fetch_add(1, Ordering::Relaxed);
        debug!("Emitted {}", record.url);
        Ok(Some(record))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> AssemblyReport {
        AssemblyReport {
            emitted: self.emitted_count.load(Ordering::Relaxed),
            unmatched: self.pending.len(),
            incomplete: self.incomplete.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
        }
    }

    /// End the run: report and discard every job still pending.
    pub fn finish(&self) -> AssemblyReport {
        let report = self.stats();
        if report.unmatched > 0 {
            warn!("{} listed jobs never received a detail page", report.unmatched);
            for entry in self.pending.iter() {
                debug!("Unmatched: {}", entry.key());
            }
        }
        self.pending.clear();
        report
    }

    fn assemble(&self, url: String, stub: JobListingStub, detail: JobDetail) -> JobRecord {
        let title = prefer(Some(stub.title), detail.title);
        let company = prefer(Some(stub.company), detail.company);

        let raw_location = detail.raw_location.or(stub.raw_location);
        let location = normalize_location(raw_location.as_deref().unwrap_or(""), &self.rules.locations);

        let raw_contract = detail.raw_contract.or(stub.raw_contract);
        let contract_type = normalize_contract(raw_contract.as_deref().unwrap_or(""), &self.rules.contracts);

        let daily_rate = detail.raw_daily_rate.as_deref().and_then(parse_salary).map(|mut range| {
            range.period = PayPeriod::Daily;
            range
        });

        let publication = detail
            .raw_publication
            .as_deref()
            .map(parse_publication_date)
            .unwrap_or_default();
        let posted_date = publication.published.or_else(|| {
            stub.posted_date
                .as_deref()
                .and_then(|raw| parse_publication_date(raw).published)
        });

        let company_profile = detail
            .raw_company_description
            .as_deref()
            .map(parse_company_description)
            .unwrap_or_default();

        let start = detail
            .raw_start_date
            .as_deref()
            .map(parse_start_date)
            .unwrap_or_default();

        JobRecord {
            url,
            title,
            company,
            company_location: company_profile.location,
            company_size: company_profile.size,
            company_type: company_profile.kind,
            location: location.value,
            location_needs_review: location.needs_review,
            contract_type,
            raw_contract,
            salary_range: detail.raw_salary.as_deref().and_then(parse_salary),
            daily_rate,
            description: detail.description.trim().to_string(),
            posted_date,
            updated_date: publication.updated,
            start_date: start.date,
            start_asap: start.asap,
            duration_days: detail.raw_duration.as_deref().and_then(parse_duration_days),
            experience: detail.experience,
            remote_work: detail.remote_work,
            skills: detail.skills,
        }
    }
}

fn prefer(first: Option<String>, fallback: Option<String>) -> String {
    first
        .map(|s| clean_text(&s))
        .filter(|s| !s.is_empty())
        .or_else(|| fallback.map(|s| clean_text(&s)))
        .unwrap_or_default()
}
