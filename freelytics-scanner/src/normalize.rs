//! Rule-based canonicalization of the free-text fields scraped from job pages.
//!
//! Every function here is total: unparseable input yields a fallback value
//! (`Unknown`, a passthrough location, `None`) and never an error.

use crate::model::{ContractType, PayPeriod, SalaryRange};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

// Group 1: thousands-grouped amount, group 2: plain or decimal amount, group 3: "k" suffix
static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:([0-9]{1,3}(?:[ ,.][0-9]{3})+)|([0-9]+(?:[.,][0-9]{1,2})?))\s*(k)?")
        .expect("amount pattern is valid")
});

static DMY_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([0-9]{1,2})/([0-9]{1,2})/([0-9]{4})\b").expect("date pattern is valid")
});

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([0-9]{4})-([0-9]{2})-([0-9]{2})\b").expect("iso date pattern is valid")
});

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+(?:[.,][0-9]+)?)\s*(\p{L}+)").expect("duration pattern is valid")
});

const ASAP_INDICATORS: &[&str] = &[
    "dès que possible",
    "des que possible",
    "asap",
    "immédiatement",
    "immediatement",
    "immediately",
    "tout de suite",
    "maintenant",
    "disponible",
];

/// Ordered keyword table mapping contract wording to the canonical vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractVocabulary {
    entries: Vec<(ContractType, Vec<String>)>,
}

impl ContractVocabulary {
    pub fn new(entries: Vec<(ContractType, Vec<String>)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(kind, keywords)| {
                let keywords = keywords
                    .iter()
                    .map(|k| clean_text(k).to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                (kind, keywords)
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[(ContractType, Vec<String>)] {
        &self.entries
    }
}

impl Default for ContractVocabulary {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self::new(vec![
            (
                ContractType::Permanent,
                words(&["cdi", "permanent", "full-time", "full time", "salarié"]),
            ),
            (
                ContractType::Freelance,
                words(&["freelance", "indépendant", "independant", "contractor", "portage"]),
            ),
            (
                ContractType::Internship,
                words(&["stage", "stagiaire", "internship", "alternance"]),
            ),
        ])
    }
}

/// Canonical location tokens and the aliases that map onto them.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationTable {
    entries: Vec<(String, Vec<String>)>,
}

impl LocationTable {
    /// The canonical token always matches itself, aliases are added on top.
    pub fn new(entries: Vec<(String, Vec<String>)>) -> Self {
        let entries = entries
            .into_iter()
            .filter_map(|(token, aliases)| {
                let token = clean_text(&token);
                if token.is_empty() {
                    return None;
                }
                let mut all = vec![token.to_lowercase()];
                all.extend(
                    aliases
                        .iter()
                        .map(|a| clean_text(a).to_lowercase())
                        .filter(|a| !a.is_empty()),
                );
                Some((token, all))
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[(String, Vec<String>)] {
        &self.entries
    }
}

impl Default for LocationTable {
    fn default() -> Self {
        let entry = |token: &str, aliases: &[&str]| {
            (
                token.to_string(),
                aliases.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            )
        };
        Self::new(vec![
            entry(
                "remote",
                &["télétravail", "teletravail", "full remote", "100% remote"],
            ),
            entry("paris", &["île-de-france", "ile-de-france"]),
            entry("lyon", &[]),
            entry("marseille", &[]),
            entry("toulouse", &[]),
            entry("nantes", &[]),
            entry("bordeaux", &[]),
            entry("lille", &[]),
            entry("fr", &["france"]),
        ])
    }
}

/// Tables the assembler normalizes with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeRules {
    pub contracts: ContractVocabulary,
    pub locations: LocationTable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedLocation {
    pub value: String,
    pub needs_review: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compensation {
    pub salary: Option<String>,
    pub daily_rate: Option<String>,
}

/// Company location, size band and kind from the company blurb of a job page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyProfile {
    pub location: Option<String>,
    pub size: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublicationDates {
    pub published: Option<NaiveDate>,
    pub updated: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartDate {
    pub date: Option<NaiveDate>,
    pub asap: bool,
}

/// Replace non-breaking spaces, collapse whitespace runs and trim.
pub fn clean_text(raw: &str) -> String {
    raw.replace(['\u{a0}', '\u{202f}'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn normalize_contract(raw: &str, vocabulary: &ContractVocabulary) -> ContractType {
    let lowered = clean_text(raw).to_lowercase();
    if lowered.is_empty() {
        return ContractType::Unknown;
    }

    vocabulary
        .entries()
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k.as_str())))
        .map(|(kind, _)| *kind)
        .unwrap_or(ContractType::Unknown)
}

pub fn normalize_location(raw: &str, table: &LocationTable) -> NormalizedLocation {
    let cleaned = clean_text(raw);
    let lowered = cleaned.to_lowercase();
    if lowered.is_empty() {
        return NormalizedLocation {
            value: String::new(),
            needs_review: true,
        };
    }

    // Leading matches beat later ones across the whole table
    let by_prefix = table.entries().iter().find(|(_, aliases)| {
        aliases
            .iter()
            .any(|a| word_positions(&lowered, a).any(|at| at == 0))
    });
    let matched = by_prefix.or_else(|| {
        table.entries().iter().find(|(_, aliases)| {
            aliases
                .iter()
                .any(|a| word_positions(&lowered, a).next().is_some())
        })
    });

    match matched {
        Some((token, _)) => NormalizedLocation {
            value: token.clone(),
            needs_review: false,
        },
        None => NormalizedLocation {
            value: cleaned,
            needs_review: true,
        },
    }
}

/// Byte offsets where `needle` occurs as whole words: "fr" is found in
/// "paris, fr" but not in "frankfurt" or "africa".
fn word_positions<'a>(haystack: &'a str, needle: &'a str) -> impl Iterator<Item = usize> + 'a {
    haystack.match_indices(needle).filter_map(move |(at, _)| {
        let before = haystack[..at].chars().next_back();
        let after = haystack[at + needle.len()..].chars().next();
        let is_word = |c: Option<char>| c.is_some_and(char::is_alphanumeric);
        (!needle.is_empty() && !is_word(before) && !is_word(after)).then_some(at)
    })
}

/// Split a sidebar pay value into yearly salary and daily rate.
///
/// Only a value with exactly two comma-separated parts carrying both the
/// yearly (`€⁄an`) and daily (`€⁄j`) markers is split; anything else lands
/// in `salary` unless it is daily only.
pub fn split_compensation(raw: &str) -> Compensation {
    let value = clean_text(raw);
    if value.is_empty() {
        return Compensation::default();
    }

    let yearly = value.contains("€⁄an");
    let daily = value.contains("€⁄j");

    if yearly && daily {
        let parts: Vec<&str> = value.split(", ").collect();
        if parts.len() == 2 {
            return Compensation {
                salary: non_empty(parts[0]),
                daily_rate: non_empty(parts[1]),
            };
        }
        Compensation {
            salary: Some(value),
            daily_rate: None,
        }
    } else if daily {
        Compensation {
            salary: None,
            daily_rate: Some(value),
        }
    } else {
        Compensation {
            salary: Some(value),
            daily_rate: None,
        }
    }
}

// Larger amounts are markup noise (phone numbers, ids), not pay
const MAX_PAY_AMOUNT: f64 = 1_000_000_000.0;

struct Amount {
    value: f64,
    thousands: bool,
    start: usize,
    end: usize,
}

fn parse_amount(grouped: Option<&str>, plain: Option<&str>) -> Option<f64> {
    match (grouped, plain) {
        (Some(digits), _) => digits
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse::<f64>()
            .ok(),
        (None, Some(digits)) => digits.replace(',', ".").parse::<f64>().ok(),
        (None, None) => None,
    }
}

fn is_range_separator(between: &str) -> bool {
    let between = between.trim_matches(|c: char| c.is_whitespace() || "€$£".contains(c));
    matches!(between, "-" | "à" | "a" | "to" | "~")
}

fn detect_currency(text: &str) -> &'static str {
    if text.contains('$') || text.contains("usd") {
        "USD"
    } else if text.contains('£') || text.contains("gbp") {
        "GBP"
    } else if text.contains("chf") {
        "CHF"
    } else {
        "EUR"
    }
}

fn detect_period(text: &str) -> PayPeriod {
    const ANNUAL: &[&str] = &["⁄an", "/an", "par an", "per year", "/year", "annuel", "annual"];
    const DAILY: &[&str] = &["⁄j", "/j", "par jour", "per day", "/day", "tjm", "daily"];

    if ANNUAL.iter().any(|marker| text.contains(marker)) {
        PayPeriod::Annual
    } else if DAILY.iter().any(|marker| text.contains(marker)) {
        PayPeriod::Daily
    } else {
        PayPeriod::Unspecified
    }
}

/// Extract a numeric pay range from heterogeneous text.
///
/// `"45-55k€"` gives `(45000, 55000, "EUR")`; text without any number gives `None`.
/// Bounds are whole currency units: decimals are rounded half away from zero,
/// so `"45,50 €"` gives `(46, 46)`. Amounts above one billion give `None`.
pub fn parse_salary(raw: &str) -> Option<SalaryRange> {
    let text = raw
        .replace(['\u{a0}', '\u{202f}'], " ")
        .replace(['–', '—', '‑', '−'], "-")
        .to_lowercase();

    let amounts: Vec<Amount> = AMOUNT
        .captures_iter(&text)
        .filter_map(|caps| {
            let value = parse_amount(
                caps.get(1).map(|m| m.as_str()),
                caps.get(2).map(|m| m.as_str()),
            )?;
            let whole = caps.get(0)?;
            Some(Amount {
                value,
                thousands: caps.get(3).is_some(),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect();

    let low = amounts.first()?;
    let high = match amounts.get(1) {
        Some(next) if is_range_separator(&text[low.end..next.start]) => next,
        _ => low,
    };

    // A single "k" on either bound applies to both ("45-55k")
    let any_thousands = low.thousands || high.thousands;
    let scale = |amount: &Amount| {
        let value = if amount.thousands || (any_thousands && amount.value < 1000.0) {
            amount.value * 1000.0
        } else {
            amount.value
        };
        whole_units(value)
    };

    Some(SalaryRange::new(
        scale(low)?,
        scale(high)?,
        detect_currency(&text),
        detect_period(&text),
    ))
}

fn whole_units(value: f64) -> Option<u64> {
    let rounded = value.round();
    if !rounded.is_finite() || !(0.0..=MAX_PAY_AMOUNT).contains(&rounded) {
        return None;
    }
    Some(rounded as u64)
}

/// Split "Paris, France , 250 - 999 salariés , ESN" into its parts.
///
/// The meaning of each comma-separated part depends on how many there are:
/// one is the company kind, two are size and kind, three are location, size
/// and kind, four are a two-part location, size and kind. Any other count
/// yields an empty profile.
pub fn parse_company_description(raw: &str) -> CompanyProfile {
    let parts: Vec<String> = raw
        .split(',')
        .map(clean_text)
        .filter(|part| !part.is_empty())
        .collect();

    match parts.as_slice() {
        [kind] => CompanyProfile {
            kind: Some(kind.clone()),
            ..Default::default()
        },
        [size, kind] => CompanyProfile {
            location: None,
            size: Some(size.clone()),
            kind: Some(kind.clone()),
        },
        [location, size, kind] => CompanyProfile {
            location: Some(location.clone()),
            size: Some(size.clone()),
            kind: Some(kind.clone()),
        },
        [city, region, size, kind] => CompanyProfile {
            location: Some(format!("{}, {}", city, region)),
            size: Some(size.clone()),
            kind: Some(kind.clone()),
        },
        _ => CompanyProfile::default(),
    }
}

fn dmy(day: &str, month: &str, year: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Dates out of "Publiée le 21/07/2025 - Mise à jour le 23/07/2025".
///
/// The first date is the publication date, a second one the update date.
pub fn parse_publication_date(raw: &str) -> PublicationDates {
    let text = clean_text(raw);

    let mut dates = DMY_DATE
        .captures_iter(&text)
        .filter_map(|caps| dmy(&caps[1], &caps[2], &caps[3]));
    let published = dates.next();
    if published.is_some() {
        return PublicationDates {
            published,
            updated: dates.next(),
        };
    }

    let mut iso = ISO_DATE.captures_iter(&text).filter_map(|caps| {
        NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
    });
    PublicationDates {
        published: iso.next(),
        updated: iso.next(),
    }
}

pub fn parse_start_date(raw: &str) -> StartDate {
    let lowered = clean_text(raw).to_lowercase();
    if lowered.is_empty() {
        return StartDate::default();
    }

    if ASAP_INDICATORS.iter().any(|i| lowered.contains(i)) {
        return StartDate {
            date: None,
            asap: true,
        };
    }

    let date = DMY_DATE
        .captures(&lowered)
        .and_then(|caps| dmy(&caps[1], &caps[2], &caps[3]));
    StartDate { date, asap: false }
}

/// Mission length converted to days; months count as 30 days, years as 365.
pub fn parse_duration_days(raw: &str) -> Option<f64> {
    let lowered = clean_text(raw).to_lowercase();
    let caps = DURATION.captures(&lowered)?;
    let value: f64 = caps[1].replace(',', ".").parse().ok()?;

    let factor = match &caps[2] {
        "jour" | "jours" | "day" | "days" | "j" => 1.0,
        "semaine" | "semaines" | "week" | "weeks" | "s" => 7.0,
        "mois" | "month" | "months" | "m" => 30.0,
        "an" | "ans" | "année" | "années" | "year" | "years" | "y" => 365.0,
        _ => return None,
    };
    Some(value * factor)
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
