pub mod assembler;
pub mod crawler;
pub mod error;
pub mod model;
pub mod normalize;
pub mod parser;

pub use assembler::{Assembler, AssemblyReport, MemorySink, RecordSink};
pub use crawler::{CrawlStats, ProgressCallback, SearchConfig, Spider};
pub use error::ScanError;
pub use model::{
    ContractType, Fragment, JobDetail, JobListingStub, JobRecord, PageKind, PayPeriod, SalaryRange,
};
pub use normalize::{ContractVocabulary, LocationTable, NormalizeRules};
pub use parser::{ListingPage, ParsedPage, SelectorConfig, Selectors};
