// src/pipeline/crawl.rs

//! Resumable crawl of the drawing listing.
//!
//! One crawl cycle walks the listing newest-first, then oldest-first,
//! then promotes the finished snapshot to `last`. The status file is
//! rewritten after every iteration, so a crawl killed at any point picks
//! up at the page it was about to fetch.

use std::time::{Duration, Instant};

use chrono::Local;

use crate::error::{AppError, Result};
use crate::models::{Config, CrawlState, CrawlerConfig, FieldConfig, Phase};
use crate::services::fetcher::{HttpPageFetcher, PageFetcher};
use crate::services::snapshot::{PageStats, SnapshotBuilder};
use crate::storage::LocalStorage;
use crate::utils::resolve;

const SCRAPE_ID_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Outcome of a single crawl iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Previous snapshot promoted, new scrape directory opened
    Restarted { scrape_id: String },
    /// A page was ingested
    Page {
        url: String,
        stats: PageStats,
        addresses: usize,
        /// Set when the page carried no next link
        advanced_to: Option<Phase>,
    },
    /// An empty page ended the current phase
    PhaseAdvanced { from: Phase, to: Phase },
}

/// Counters of one crawl invocation.
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub iterations: usize,
    pub pages: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub restarts: usize,
    pub phase_changes: usize,
    pub state: CrawlState,
}

impl CrawlReport {
    fn record(&mut self, step: &Step) {
        self.iterations += 1;
        match step {
            Step::Restarted { .. } => self.restarts += 1,
            Step::Page {
                stats, advanced_to, ..
            } => {
                self.pages += 1;
                self.accepted += stats.accepted;
                self.duplicates += stats.duplicates;
                self.skipped += stats.skipped;
                if advanced_to.is_some() {
                    self.phase_changes += 1;
                }
            }
            Step::PhaseAdvanced { .. } => self.phase_changes += 1,
        }
    }
}

/// Drives the crawl state machine against a [`PageFetcher`].
pub struct CrawlEngine<F: PageFetcher> {
    config: CrawlerConfig,
    storage: LocalStorage,
    fetcher: F,
    builder: SnapshotBuilder,
    state: CrawlState,
    /// The cursor page may have been stored only in part before the last stop
    replay_cursor: bool,
}

impl<F: PageFetcher> CrawlEngine<F> {
    /// Load the persisted state and rebuild the duplicate filter from disk.
    pub async fn open(
        config: CrawlerConfig,
        fields: FieldConfig,
        storage: LocalStorage,
        fetcher: F,
    ) -> Result<Self> {
        let state = storage.load_state().await?;

        let seen = match (&state.phase, &state.scrape_id) {
            (phase, Some(scrape_id)) if phase.is_fetch() => {
                if state.next_url.is_none() {
                    return Err(AppError::invariant(format!(
                        "status is in phase {phase} without a next url"
                    )));
                }
                let dir = storage.scrape_dir(scrape_id);
                if !tokio::fs::try_exists(&dir).await? {
                    return Err(AppError::invariant(format!(
                        "scrape dir {} of phase {phase} is missing",
                        dir.display()
                    )));
                }
                storage.stored_hrefs(scrape_id).await?
            }
            (phase, None) if phase.is_fetch() => {
                return Err(AppError::invariant(format!(
                    "status is in phase {phase} without a scrape id"
                )));
            }
            _ => Default::default(),
        };

        let builder = SnapshotBuilder::with_seen(fields, seen);
        log::info!(
            "Resuming crawl in phase {} with {} stored drawings",
            state.phase,
            builder.seen_count()
        );

        Ok(Self {
            config,
            storage,
            fetcher,
            builder,
            replay_cursor: state.phase.is_fetch(),
            state,
        })
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    /// Perform one iteration and persist the resulting state.
    ///
    /// A failed iteration leaves the status file untouched.
    pub async fn step(&mut self) -> Result<Step> {
        let step = match self.state.phase {
            Phase::Restart => self.restart().await?,
            Phase::FetchDescending | Phase::FetchAscending => self.fetch_next().await?,
        };
        self.storage.save_state(&self.state).await?;
        Ok(step)
    }

    /// Iterate until `budget` has elapsed; always runs at least once.
    pub async fn run(&mut self, budget: Duration) -> Result<CrawlReport> {
        let started = Instant::now();
        let pause = Duration::from_millis(self.config.sleep_ms);
        let mut report = CrawlReport::default();

        loop {
            let step = self.step().await?;
            log::debug!("Crawl step: {step:?}");
            report.record(&step);

            tokio::time::sleep(pause).await;
            if started.elapsed() >= budget {
                break;
            }
        }

        report.state = self.state.clone();
        Ok(report)
    }

    async fn restart(&mut self) -> Result<Step> {
        if let Some(previous) = self.state.scrape_id.clone() {
            self.storage.promote_to_last(&previous).await?;
            // The old id must not be promoted twice if opening the next scrape fails.
            self.state = CrawlState::default();
            self.storage.save_state(&self.state).await?;
        }

        let scrape_id = Local::now().format(SCRAPE_ID_FORMAT).to_string();
        let dir = self.storage.create_scrape_dir(&scrape_id).await?;
        log::info!("Starting new scrape in {}", dir.display());

        self.builder = SnapshotBuilder::new(self.builder_fields());
        let phase = Phase::Restart.next();
        self.state = CrawlState {
            scrape_id: Some(scrape_id.clone()),
            phase,
            next_url: self.start_url(phase),
        };
        Ok(Step::Restarted { scrape_id })
    }

    async fn fetch_next(&mut self) -> Result<Step> {
        let (Some(scrape_id), Some(url)) =
            (self.state.scrape_id.clone(), self.state.next_url.clone())
        else {
            return Err(AppError::invariant(format!(
                "phase {} needs both a scrape id and a next url",
                self.state.phase
            )));
        };

        log::info!("Fetching {url}");
        let page = self.fetcher.fetch(&url).await?;

        if std::mem::take(&mut self.replay_cursor) {
            let forgotten = self.builder.forget_page(&page.data);
            if forgotten > 0 {
                log::info!("Replaying {forgotten} drawings of {url} stored before the last stop");
            }
        }

        if page.data.is_empty() {
            let from = self.state.phase;
            let to = self.advance_phase();
            log::info!("Empty page at {url}, switching from {from} to {to}");
            return Ok(Step::PhaseAdvanced { from, to });
        }

        let (snapshot, stats) = self.builder.ingest_page(&page.data, &url);
        let addresses = self.storage.append_snapshot(&scrape_id, &snapshot).await?;
        log::info!(
            "Stored {} drawings under {addresses} addresses ({} duplicates, {} skipped)",
            stats.accepted,
            stats.duplicates,
            stats.skipped
        );

        let advanced_to = match page.next_link() {
            Some(next) => {
                self.state.next_url = Some(resolve(&self.config.base_url, next)?);
                None
            }
            None => {
                log::warn!("Page {url} has no next link, ending phase {}", self.state.phase);
                Some(self.advance_phase())
            }
        };

        Ok(Step::Page {
            url,
            stats,
            addresses,
            advanced_to,
        })
    }

    fn advance_phase(&mut self) -> Phase {
        let to = self.state.phase.next();
        self.state.phase = to;
        self.state.next_url = self.start_url(to);
        to
    }

    fn start_url(&self, phase: Phase) -> Option<String> {
        match phase {
            Phase::Restart => None,
            Phase::FetchDescending => Some(self.config.descending_url.clone()),
            Phase::FetchAscending => Some(self.config.ascending_url.clone()),
        }
    }

    fn builder_fields(&self) -> FieldConfig {
        self.builder.fields().clone()
    }
}

/// Run the crawler for `budget` against the configured upstream.
pub async fn run_crawler(config: &Config, budget: Duration) -> Result<CrawlReport> {
    let storage = LocalStorage::new(config.data_dir()).with_status_path(config.status_path());
    let fetcher = HttpPageFetcher::new(&config.crawler)?;
    let mut engine = CrawlEngine::open(
        config.crawler.clone(),
        config.fields.clone(),
        storage,
        fetcher,
    )
    .await?;

    log::info!("Crawling for {}s", budget.as_secs());
    let report = engine.run(budget).await?;
    log::info!(
        "Crawl finished: {} iterations, {} pages, {} drawings accepted, phase {}",
        report.iterations,
        report.pages,
        report.accepted,
        report.state.phase
    );
    Ok(report)
}
