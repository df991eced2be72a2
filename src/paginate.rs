//! Walking multi-page result sets.
//!
//! The current API reports `pagination.current_page` and
//! `pagination.total_pages`; that is the canonical scheme. Legacy envelopes
//! report `lastOffset` instead and are walked by re-requesting with
//! `offset=`. Either way pages are fetched strictly one after another, in
//! order, and their records are concatenated.

use crate::client::Session;
use crate::metadata::RequestMetadata;
use crate::normalize::{flatten_record, Generation, ResourceKind, TabularFrame};
use crate::params::ParameterViolation;
use crate::response::{scalar_u64, ResultEnvelope};
use crate::{Error, Result};
use serde_json::Value;
use std::time::Duration;

/// Hard ceiling on the number of pages one fetch may request.
pub const MAX_PAGES: u32 = 10_000;

/// How many pages a paginated call should fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageLimit {
    /// Every page the server reports.
    #[default]
    All,
    /// At most this many pages, starting from the first.
    Pages(u32),
}

impl PageLimit {
    fn validate(self) -> Result<()> {
        match self {
            PageLimit::Pages(0) => Err(Error::InvalidParameters {
                violations: vec![ParameterViolation::new(
                    "page_limit",
                    "must request at least one page",
                )],
            }),
            _ => Ok(()),
        }
    }

    fn allows(self, pages: u32) -> bool {
        match self {
            PageLimit::All => true,
            PageLimit::Pages(limit) => pages < limit,
        }
    }
}

/// A position in a result set as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCursor {
    /// 1-indexed page number and the server's total page count.
    Page { current: u32, total_pages: u32 },
    /// Legacy offset of the last record returned.
    Offset { last_offset: u64 },
}

impl PageCursor {
    /// Reads the cursor from a payload, if it carries one.
    pub fn from_body(body: &Value) -> Option<Self> {
        if let Some(pagination) = body.get("pagination") {
            let page = |key: &str| {
                pagination
                    .get(key)
                    .and_then(scalar_u64)
                    .and_then(|n| u32::try_from(n).ok())
            };
            return Some(PageCursor::Page {
                current: page("current_page").unwrap_or(1),
                total_pages: page("total_pages").unwrap_or(0),
            });
        }

        body.pointer("/petfinder/lastOffset/$t")
            .and_then(scalar_u64)
            .map(|last_offset| PageCursor::Offset { last_offset })
    }

    /// Returns `true` if there is nothing after this position.
    pub fn is_exhausted(&self) -> bool {
        match *self {
            PageCursor::Page {
                current,
                total_pages,
            } => total_pages == 0 || current >= total_pages,
            PageCursor::Offset { last_offset } => last_offset == 0,
        }
    }
}

/// Why fewer pages were fetched than were asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClampReason {
    /// The server has fewer pages than requested.
    ServerTotal,
    /// The request exceeded [`MAX_PAGES`].
    HardCeiling,
}

/// Records that a requested page count was reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageClamp {
    /// The page count that would have been fetched without clamping.
    pub requested: u32,
    /// The page count actually targeted.
    pub available: u32,
    /// Which bound caused the reduction.
    pub reason: ClampReason,
}

/// The accumulated result of a paginated fetch.
#[derive(Debug)]
pub struct PageSet {
    /// What the records are.
    pub kind: ResourceKind,

    /// The API generation the first page came from.
    pub generation: Generation,

    /// Number of pages fetched.
    pub pages: u32,

    /// Every record in page order, server order within a page.
    pub records: Vec<Value>,

    /// Set when the requested page count was reduced.
    pub clamp: Option<PageClamp>,

    /// The rate-limit error that stopped the fetch early, if any.
    pub interrupted: Option<Error>,
}

impl PageSet {
    fn new(kind: ResourceKind, generation: Generation) -> Self {
        Self {
            kind,
            generation,
            pages: 0,
            records: Vec::new(),
            clamp: None,
            interrupted: None,
        }
    }

    fn absorb(&mut self, envelope: &ResultEnvelope) -> usize {
        let records = envelope.records().into_vec();
        let count = records.len();
        self.records.extend(records);
        self.pages += 1;
        count
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns `true` if a rate limit cut the fetch short.
    pub fn is_partial(&self) -> bool {
        self.interrupted.is_some()
    }

    /// Flattens every record into one frame.
    pub fn to_frame(&self) -> TabularFrame {
        let rows = self
            .records
            .iter()
            .map(|record| flatten_record(self.kind, self.generation, record))
            .collect();
        TabularFrame::from_rows(self.kind, rows)
    }
}

/// Drives page requests for one endpoint and query.
pub(crate) struct Paginator<'a> {
    session: &'a Session,
    kind: ResourceKind,
    request: RequestMetadata,
}

impl<'a> Paginator<'a> {
    pub(crate) fn new(session: &'a Session, kind: ResourceKind, request: RequestMetadata) -> Self {
        Self {
            session,
            kind,
            request,
        }
    }

    /// Fetches pages until the result set or `limit` is exhausted.
    ///
    /// Failures on the first page are returned as errors. A rate limit hit on
    /// a later page stops the walk and returns what was collected, with
    /// [`PageSet::interrupted`] set.
    pub(crate) async fn fetch_all(&self, limit: PageLimit) -> Result<PageSet> {
        limit.validate()?;

        let first = self
            .session
            .fetch(self.kind, self.request.clone().with_query_param("page", "1"))
            .await?;

        let mut set = PageSet::new(self.kind, Generation::of(&first.body));
        if set.absorb(&first) == 0 {
            tracing::info!(path = %self.request.path, "First page is empty");
            return Ok(set);
        }

        match first.cursor() {
            Some(PageCursor::Page { total_pages, .. }) => {
                self.walk_pages(&mut set, limit, total_pages).await?
            }
            Some(PageCursor::Offset { last_offset }) => {
                self.walk_offsets(&mut set, limit, last_offset).await?
            }
            None => {}
        }

        tracing::info!(
            path = %self.request.path,
            pages = set.pages,
            records = set.len(),
            partial = set.is_partial(),
            "Paginated fetch finished"
        );

        Ok(set)
    }

    async fn walk_pages(&self, set: &mut PageSet, limit: PageLimit, total_pages: u32) -> Result<()> {
        let (target, clamp) = target_pages(limit, total_pages);
        if let Some(clamp) = clamp {
            tracing::warn!(
                requested = clamp.requested,
                available = clamp.available,
                reason = ?clamp.reason,
                "Clamping requested page count"
            );
            set.clamp = Some(clamp);
        }

        for page in 2..=target {
            let request = self
                .request
                .clone()
                .with_query_param("page", page.to_string());
            if let Step::Interrupted = self.next_page(set, request).await? {
                break;
            }
        }

        Ok(())
    }

    async fn walk_offsets(&self, set: &mut PageSet, limit: PageLimit, mut offset: u64) -> Result<()> {
        while offset != 0 && limit.allows(set.pages) && set.pages < MAX_PAGES {
            let request = self
                .request
                .clone()
                .with_query_param("offset", offset.to_string());

            match self.next_page(set, request).await? {
                Step::Fetched {
                    records,
                    cursor: Some(PageCursor::Offset { last_offset }),
                } if records > 0 && last_offset > offset => offset = last_offset,
                _ => break,
            }
        }

        Ok(())
    }

    /// Fetches one more page into `set`.
    async fn next_page(&self, set: &mut PageSet, request: RequestMetadata) -> Result<Step> {
        pause(self.session.request_interval).await;

        match self.session.fetch(self.kind, request).await {
            Ok(envelope) => {
                let records = set.absorb(&envelope);
                tracing::info!(
                    page = set.pages,
                    records = records,
                    attempts = envelope.attempts,
                    "Fetched page"
                );
                Ok(Step::Fetched {
                    records,
                    cursor: envelope.cursor(),
                })
            }
            Err(error @ Error::RateLimitExceeded { .. }) => {
                tracing::warn!(
                    pages = set.pages,
                    records = set.len(),
                    "Rate limit reached, returning partial results"
                );
                set.interrupted = Some(error);
                Ok(Step::Interrupted)
            }
            Err(error) => Err(error),
        }
    }
}

enum Step {
    Fetched {
        records: usize,
        cursor: Option<PageCursor>,
    },
    /// A rate limit stopped the walk.
    Interrupted,
}

/// The last page to fetch, and the clamp applied to reach it.
fn target_pages(limit: PageLimit, total_pages: u32) -> (u32, Option<PageClamp>) {
    let total_pages = total_pages.max(1);
    let mut clamp = None;

    let mut target = match limit {
        PageLimit::All => total_pages,
        PageLimit::Pages(requested) if requested > total_pages => {
            clamp = Some(PageClamp {
                requested,
                available: total_pages,
                reason: ClampReason::ServerTotal,
            });
            total_pages
        }
        PageLimit::Pages(requested) => requested,
    };

    if target > MAX_PAGES {
        clamp = Some(PageClamp {
            requested: target,
            available: MAX_PAGES,
            reason: ClampReason::HardCeiling,
        });
        target = MAX_PAGES;
    }

    (target, clamp)
}

pub(crate) async fn pause(interval: Duration) {
    if !interval.is_zero() {
        tokio::time::sleep(interval).await;
    }
}
