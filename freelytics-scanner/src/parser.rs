use crate::error::{Result, ScanError};
use crate::model::{JobDetail, JobListingStub, PageKind, canonical_url};
use crate::normalize::{clean_text, split_compensation};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

const DEFAULT_ITEMS_PER_PAGE: u32 = 16;

/// Sidebar icons are recognized by the start of their SVG path data.
const SIDEBAR_ICONS: &[(&str, SidebarField)] = &[
    ("M152 24c0-13.3", SidebarField::StartDate),
    ("M464 256A208 208", SidebarField::Duration),
    ("M88 32C39.4 32", SidebarField::Salary),
    ("M176 56V96H336V56", SidebarField::Experience),
    ("M224.8 5.4c8.8-7.2", SidebarField::RemoteWork),
    ("M320.7 249.2c-10.5", SidebarField::Location),
];

const PUBLICATION_PREFIXES: &[&str] = &["Publiée le", "Publié le", "Published on", "Posted on"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SidebarField {
    StartDate,
    Duration,
    Salary,
    Experience,
    RemoteWork,
    Location,
}

/// CSS selectors used to pull job fields out of the site's markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub card: String,
    pub card_link: String,
    pub card_title: String,
    pub card_company: String,
    pub card_location: String,
    pub card_contract: String,
    pub card_posted: String,
    pub pagination: String,
    pub next_link: String,
    pub detail_title: String,
    pub detail_company: String,
    pub detail_contract: String,
    pub detail_description: String,
    pub detail_skills: String,
    pub detail_company_info: String,
    pub sidebar: String,
    pub sidebar_icon: String,
    pub sidebar_value: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            card: "div.mb-4.relative".to_string(),
            card_link: "a[href]".to_string(),
            card_title: "h2, h3".to_string(),
            card_company: ".company, p.font-semibold".to_string(),
            card_location: ".location".to_string(),
            card_contract: "div.tags span.tag div.truncate".to_string(),
            card_posted: "time".to_string(),
            pagination: "div[total-items]".to_string(),
            next_link: "a[rel=\"next\"]".to_string(),
            detail_title: "h1".to_string(),
            detail_company: "p.font-semibold.text-sm".to_string(),
            detail_contract: "div.tags span.tag div.truncate".to_string(),
            detail_description: "div.html-renderer.prose-content".to_string(),
            detail_skills: "a.tag div.truncate".to_string(),
            detail_company_info: "div.flex.items-center.mr-6.mb-4 span".to_string(),
            sidebar: "div.flex.flex-col.gap-2".to_string(),
            sidebar_icon: "svg path".to_string(),
            sidebar_value: "span.w-full.text-sm.line-clamp-2".to_string(),
        }
    }
}

/// Compiled form of [`SelectorConfig`].
#[derive(Debug, Clone)]
pub struct Selectors {
    card: Selector,
    card_link: Selector,
    card_title: Selector,
    card_company: Selector,
    card_location: Selector,
    card_contract: Selector,
    card_posted: Selector,
    pagination: Selector,
    next_link: Selector,
    detail_title: Selector,
    detail_company: Selector,
    detail_contract: Selector,
    detail_description: Selector,
    detail_skills: Selector,
    detail_company_info: Selector,
    sidebar: Selector,
    sidebar_icon: Selector,
    sidebar_value: Selector,
    paragraphs: Selector,
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ScanError::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{:?}", e),
    })
}

impl Selectors {
    pub fn compile(config: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            card: compile(&config.card)?,
            card_link: compile(&config.card_link)?,
            card_title: compile(&config.card_title)?,
            card_company: compile(&config.card_company)?,
            card_location: compile(&config.card_location)?,
            card_contract: compile(&config.card_contract)?,
            card_posted: compile(&config.card_posted)?,
            pagination: compile(&config.pagination)?,
            next_link: compile(&config.next_link)?,
            detail_title: compile(&config.detail_title)?,
            detail_company: compile(&config.detail_company)?,
            detail_contract: compile(&config.detail_contract)?,
            detail_description: compile(&config.detail_description)?,
            detail_skills: compile(&config.detail_skills)?,
            detail_company_info: compile(&config.detail_company_info)?,
            sidebar: compile(&config.sidebar)?,
            sidebar_icon: compile(&config.sidebar_icon)?,
            sidebar_value: compile(&config.sidebar_value)?,
            paragraphs: compile("p, li")?,
        })
    }
}

impl Default for Selectors {
    fn default() -> Self {
        Self::compile(&SelectorConfig::default()).expect("default selectors are valid")
    }
}

/// Everything extracted from one search results page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingPage {
    pub stubs: Vec<JobListingStub>,
    /// Cards that were present but unusable (no link or no title)
    pub skipped: usize,
    pub current_page: u32,
    pub total_pages: Option<u32>,
    pub next_page: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPage {
    Listing(ListingPage),
    Detail(Option<JobDetail>),
}

pub fn parse_page(
    kind: PageKind,
    html: &str,
    page_url: &str,
    selectors: &Selectors,
) -> Result<ParsedPage> {
    match kind {
        PageKind::Listing => parse_listing(html, page_url, selectors).map(ParsedPage::Listing),
        PageKind::Detail => parse_detail(html, page_url, selectors).map(ParsedPage::Detail),
    }
}

fn parse_page_url(page_url: &str) -> Result<Url> {
    Url::parse(page_url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", page_url, e)))
}

/// Extract one stub per job card, plus the link to the following page.
pub fn parse_listing(html: &str, page_url: &str, selectors: &Selectors) -> Result<ListingPage> {
    let base = parse_page_url(page_url)?;
    let document = Html::parse_document(html);

    let mut page = ListingPage {
        current_page: current_page_number(&base),
        ..Default::default()
    };

    for card in document.select(&selectors.card) {
        match parse_card(card, &base, selectors) {
            Some(stub) => page.stubs.push(stub),
            None => {
                debug!("Skipping malformed job card on {}", page_url);
                page.skipped += 1;
            }
        }
    }

    let (next_page, total_pages) = find_next_page(&document, &base, page.current_page, selectors);
    page.next_page = next_page;
    page.total_pages = total_pages;

    debug!(
        "Parsed listing {}: {} stubs, {} skipped, next page: {:?}",
        page_url,
        page.stubs.len(),
        page.skipped,
        page.next_page
    );
    Ok(page)
}

fn parse_card(card: ElementRef, base: &Url, selectors: &Selectors) -> Option<JobListingStub> {
    let link = card
        .select(&selectors.card_link)
        .find(|a| a.value().attr("href").and_then(|h| resolve_url(base, h)).is_some())?;
    let url = link.value().attr("href").and_then(|h| resolve_url(base, h))?;

    let title = first_text(card, &selectors.card_title).or_else(|| element_text(link))?;

    let mut stub = JobListingStub::new(url, title);
    stub.company = first_text(card, &selectors.card_company).unwrap_or_default();
    stub.raw_location = first_text(card, &selectors.card_location);
    stub.raw_contract = joined(all_texts(card, &selectors.card_contract));
    stub.posted_date = card.select(&selectors.card_posted).next().and_then(|el| {
        el.value()
            .attr("datetime")
            .map(clean_text)
            .filter(|s| !s.is_empty())
            .or_else(|| element_text(el))
    });
    Some(stub)
}

fn current_page_number(url: &Url) -> u32 {
    url.query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
        .filter(|page| *page > 0)
        .unwrap_or(1)
}

fn with_page(url: &Url, page: u32) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut next = url.clone();
    next.set_fragment(None);
    next.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("page", &page.to_string());
    next.to_string()
}

fn find_next_page(
    document: &Html,
    base: &Url,
    current_page: u32,
    selectors: &Selectors,
) -> (Option<String>, Option<u32>) {
    if let Some(container) = document.select(&selectors.pagination).next() {
        let attr = |name: &str| {
            container
                .value()
                .attr(name)
                .and_then(|v| v.trim().parse::<u32>().ok())
        };
        let total_items = attr("total-items").unwrap_or(0);
        let per_page = attr("items-per-page")
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_ITEMS_PER_PAGE);

        if total_items > 0 {
            let total_pages = total_items.div_ceil(per_page);
            let next = (current_page < total_pages).then(|| with_page(base, current_page + 1));
            return (next, Some(total_pages));
        }
    }

    let next = document
        .select(&selectors.next_link)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| resolve_url(base, href));
    (next, None)
}

/// Extract the detail fields of one job page.
///
/// Returns `None` when the page has neither a title header nor a description.
pub fn parse_detail(
    html: &str,
    page_url: &str,
    selectors: &Selectors,
) -> Result<Option<JobDetail>> {
    let base = parse_page_url(page_url)?;
    let document = Html::parse_document(html);
    let root = document.root_element();

    let title = first_text(root, &selectors.detail_title);
    let description = document
        .select(&selectors.detail_description)
        .next()
        .map(|block| description_text(block, selectors))
        .unwrap_or_default();

    if title.is_none() && description.is_empty() {
        debug!("No detail header or description on {}", page_url);
        return Ok(None);
    }

    let url = canonical_url(base.as_str())
        .ok_or_else(|| ScanError::InvalidUrl(page_url.to_string()))?;
    let mut detail = JobDetail::new(url);
    detail.title = title;
    detail.company = first_text(root, &selectors.detail_company);
    detail.description = description;
    detail.raw_contract = joined(all_texts(root, &selectors.detail_contract));
    detail.skills = all_texts(root, &selectors.detail_skills);
    detail.raw_company_description = joined(all_texts(root, &selectors.detail_company_info));
    detail.raw_publication = publication_text(&document);

    for container in document.select(&selectors.sidebar) {
        let icons = container
            .select(&selectors.sidebar_icon)
            .filter_map(|path| path.value().attr("d"));
        let values = container
            .select(&selectors.sidebar_value)
            .map(|v| clean_text(&v.text().collect::<String>()));

        for (icon, value) in icons.zip(values) {
            if value.is_empty() {
                continue;
            }
            if let Some(field) = match_icon(icon) {
                apply_sidebar_field(&mut detail, field, value);
            }
        }
    }

    Ok(Some(detail))
}

fn match_icon(path_data: &str) -> Option<SidebarField> {
    let path_data = path_data.trim_start();
    SIDEBAR_ICONS
        .iter()
        .find(|(prefix, _)| path_data.starts_with(prefix))
        .map(|(_, field)| *field)
}

// First value seen for a field wins; nested sidebar containers repeat rows
fn apply_sidebar_field(detail: &mut JobDetail, field: SidebarField, value: String) {
    let slot = match field {
        SidebarField::StartDate => &mut detail.raw_start_date,
        SidebarField::Duration => &mut detail.raw_duration,
        SidebarField::Experience => &mut detail.experience,
        SidebarField::RemoteWork => &mut detail.remote_work,
        SidebarField::Location => &mut detail.raw_location,
        SidebarField::Salary => {
            if detail.raw_salary.is_none() && detail.raw_daily_rate.is_none() {
                let compensation = split_compensation(&value);
                detail.raw_salary = compensation.salary;
                detail.raw_daily_rate = compensation.daily_rate;
            }
            return;
        }
    };
    if slot.is_none() {
        *slot = Some(value);
    }
}

fn description_text(block: ElementRef, selectors: &Selectors) -> String {
    let paragraphs = all_texts(block, &selectors.paragraphs);
    if paragraphs.is_empty() {
        element_text(block).unwrap_or_default()
    } else {
        paragraphs.join("\n")
    }
}

fn publication_text(document: &Html) -> Option<String> {
    document
        .root_element()
        .text()
        .map(clean_text)
        .find(|text| PUBLICATION_PREFIXES.iter().any(|p| text.starts_with(p)))
}

fn element_text(element: ElementRef) -> Option<String> {
    let text = clean_text(&element.text().collect::<Vec<_>>().join(" "));
    if text.is_empty() { None } else { Some(text) }
}

fn first_text(scope: ElementRef, selector: &Selector) -> Option<String> {
    scope.select(selector).find_map(element_text)
}

fn all_texts(scope: ElementRef, selector: &Selector) -> Vec<String> {
    scope.select(selector).filter_map(element_text).collect()
}

fn joined(values: Vec<String>) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

/// Resolve a card link against the page it was found on.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    // Skip empty, javascript:, mailto:, tel:, etc.
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let resolved = base.join(href).ok()?;
    canonical_url(resolved.as_str())
}
