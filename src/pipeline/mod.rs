//! Pipeline entry points for harvester operations.
//!
//! - `run_crawler`: Advance the resumable crawl for a time budget
//! - `run_publisher`: Upload the finished snapshot incrementally

pub mod catalog;
pub mod crawl;
pub mod diff;
pub mod publish;

pub use crawl::{CrawlEngine, CrawlReport, run_crawler};
pub use publish::{PublishEngine, PublishReport, run_publisher};
