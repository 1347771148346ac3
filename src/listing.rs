//! The listing aggregator: the first page of [`ArticleSummary`]s plus the
//! "load more" operation that appends the following pages.
//!
//! [`load_more`] is the bare operation. [`ListingView`] owns a
//! [`PaginationState`] and is the only thing that mutates it; it refuses to
//! load when the listing is exhausted or a load is already in flight, and
//! keeps a failed load as an inline error that the reader can retry.

use crate::article::ArticleSummary;
use crate::client::{self, ContentSource, Cursor, ResultsPage};

/// Fetches the page of summaries `cursor` points to and appends it to
/// `items`, keeping the order of both. Returns the cursor of the page after
/// that, or [`None`] when there are no more pages. On failure `items` is left
/// untouched.
pub async fn load_more<S: ContentSource + ?Sized>(
    source: &S,
    cursor: &Cursor,
    items: &mut Vec<ArticleSummary>,
) -> client::Result<Option<Cursor>> {
    let page = source.next_summaries(cursor).await?;
    tracing::debug!(
        fetched = page.results.len(),
        more = page.next_page.is_some(),
        "loaded more articles"
    );
    items.extend(page.results);
    Ok(page.next_page)
}

/// The articles loaded so far and where to continue from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PaginationState {
    /// Every summary loaded so far, in the order the pages arrived.
    pub items: Vec<ArticleSummary>,

    /// The cursor of the next page. [`None`] once the last page is loaded.
    pub next_cursor: Option<Cursor>,
}

impl From<ResultsPage<ArticleSummary>> for PaginationState {
    fn from(page: ResultsPage<ArticleSummary>) -> PaginationState {
        PaginationState {
            items: page.results,
            next_cursor: page.next_page,
        }
    }
}

/// Where the listing's "load more" action stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,

    /// A continuation request has been issued and not yet finished.
    Loading,

    /// The last continuation request failed with this message. The cursor is
    /// kept, so loading again retries the same page.
    Failed(String),
}

/// The listing page's pagination state and the transitions on it.
#[derive(Clone, Debug)]
pub struct ListingView {
    state: PaginationState,
    status: LoadStatus,
}

impl ListingView {
    /// Creates a view over the first page of results.
    pub fn new(first_page: ResultsPage<ArticleSummary>) -> ListingView {
        ListingView {
            state: PaginationState::from(first_page),
            status: LoadStatus::Idle,
        }
    }

    pub fn items(&self) -> &[ArticleSummary] {
        &self.state.items
    }

    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.state.next_cursor.as_ref()
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    /// Whether the "load more" control should be offered.
    pub fn can_load_more(&self) -> bool {
        self.state.next_cursor.is_some() && self.status != LoadStatus::Loading
    }

    /// Marks a load as in flight and returns the cursor to fetch.
    pub fn begin_load(&mut self) -> Result<Cursor, LoadMoreError> {
        if self.status == LoadStatus::Loading {
            return Err(LoadMoreError::InFlight);
        }
        let cursor = self
            .state
            .next_cursor
            .clone()
            .ok_or(LoadMoreError::Exhausted)?;
        self.status = LoadStatus::Loading;
        Ok(cursor)
    }

    /// Completes a load started with [`ListingView::begin_load`]. On success
    /// the fetched summaries are appended and the cursor advances; the number
    /// of appended summaries is returned. On failure the items and cursor are
    /// unchanged and the error is kept for display.
    pub fn finish_load(
        &mut self,
        result: client::Result<ResultsPage<ArticleSummary>>,
    ) -> Result<usize, LoadMoreError> {
        match result {
            Ok(page) => {
                let fetched = page.results.len();
                self.state.items.extend(page.results);
                self.state.next_cursor = page.next_page;
                self.status = LoadStatus::Idle;
                Ok(fetched)
            }
            Err(err) => {
                tracing::warn!(error = %err, "loading more articles failed");
                self.status = LoadStatus::Failed(err.to_string());
                Err(LoadMoreError::Fetch(err))
            }
        }
    }

    /// Loads the next page from `source`. Errors are also recorded in
    /// [`ListingView::status`].
    pub async fn load_more<S: ContentSource + ?Sized>(
        &mut self,
        source: &S,
    ) -> Result<usize, LoadMoreError> {
        let cursor = self.begin_load()?;
        let mut fetched = Vec::new();
        let result = match load_more(source, &cursor, &mut fetched).await {
            Ok(next_page) => Ok(ResultsPage {
                results: fetched,
                next_page,
            }),
            Err(err) => Err(err),
        };
        self.finish_load(result)
    }
}

/// Represents a "load more" request that could not be completed.
#[derive(Debug, thiserror::Error)]
pub enum LoadMoreError {
    /// Returned when there is no next page. The control should not have been
    /// offered.
    #[error("there are no more articles to load")]
    Exhausted,

    /// Returned when a previous load has not finished yet.
    #[error("already loading more articles")]
    InFlight,

    /// Returned when fetching the next page failed.
    #[error(transparent)]
    Fetch(#[from] client::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::QueryOptions;
    use crate::testing::{summary, MemorySource};

    fn options(page_size: usize) -> QueryOptions {
        QueryOptions {
            fetch_fields: Vec::new(),
            page_size,
        }
    }

    fn uids(items: &[ArticleSummary]) -> Vec<&str> {
        items.iter().map(|s| s.uid.as_str()).collect()
    }

    #[tokio::test]
    async fn test_load_more_appends_in_order() -> client::Result<()> {
        let source = MemorySource::new(
            ["a", "b", "c", "d", "e"].iter().map(|uid| summary(uid)).collect(),
            Vec::new(),
        );
        let first = source.query_summaries(&options(2)).await?;
        let mut items = first.results;
        let cursor = first.next_page.unwrap();

        let cursor = load_more(&source, &cursor, &mut items).await?.unwrap();
        assert_eq!(vec!["a", "b", "c", "d"], uids(&items));

        let cursor = load_more(&source, &cursor, &mut items).await?;
        assert_eq!(vec!["a", "b", "c", "d", "e"], uids(&items));
        assert_eq!(None, cursor);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_more_keeps_duplicates() -> client::Result<()> {
        let source = MemorySource::new(
            ["a", "b", "a", "b"].iter().map(|uid| summary(uid)).collect(),
            Vec::new(),
        );
        let mut view = ListingView::new(source.query_summaries(&options(2)).await?);
        view.load_more(&source).await.unwrap();
        assert_eq!(vec!["a", "b", "a", "b"], uids(view.items()));
        assert!(!view.can_load_more());
        Ok(())
    }

    #[tokio::test]
    async fn test_single_page_never_fetches_again() -> client::Result<()> {
        let source = MemorySource::new(vec![summary("a"), summary("b")], Vec::new());
        let mut view = ListingView::new(source.query_summaries(&options(3)).await?);

        assert_eq!(None, view.next_cursor());
        assert!(!view.can_load_more());
        assert!(matches!(
            view.load_more(&source).await,
            Err(LoadMoreError::Exhausted)
        ));
        assert_eq!(1, source.requests());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_load_is_retryable() -> client::Result<()> {
        let source = MemorySource::new(
            ["a", "b", "c"].iter().map(|uid| summary(uid)).collect(),
            Vec::new(),
        );
        let mut view = ListingView::new(source.query_summaries(&options(2)).await?);
        let cursor = view.next_cursor().cloned();

        source.fail_next_request();
        assert!(matches!(
            view.load_more(&source).await,
            Err(LoadMoreError::Fetch(_))
        ));
        assert!(matches!(view.status(), LoadStatus::Failed(_)));
        assert_eq!(vec!["a", "b"], uids(view.items()));
        assert_eq!(cursor.as_ref(), view.next_cursor());
        assert!(view.can_load_more());

        assert_eq!(1, view.load_more(&source).await.unwrap());
        assert_eq!(LoadStatus::Idle, *view.status());
        assert_eq!(vec!["a", "b", "c"], uids(view.items()));
        Ok(())
    }

    #[tokio::test]
    async fn test_in_flight_guard() -> client::Result<()> {
        let source = MemorySource::new(
            ["a", "b", "c", "d"].iter().map(|uid| summary(uid)).collect(),
            Vec::new(),
        );
        let mut view = ListingView::new(source.query_summaries(&options(1)).await?);

        let cursor = view.begin_load().unwrap();
        assert!(!view.can_load_more());
        assert!(matches!(view.begin_load(), Err(LoadMoreError::InFlight)));

        let page = source.next_summaries(&cursor).await;
        assert_eq!(1, view.finish_load(page).unwrap());
        assert_eq!(vec!["a", "b"], uids(view.items()));
        assert!(view.can_load_more());
        Ok(())
    }
}
