use crate::graph_api::client::GraphClient;
use crate::graph_api::types::{GraphError, Page};
use reqwest::Method;

/// Lazy, bounded listing of a connection
///
/// Each call to [`Paginator::next_page`] performs one request, following the
/// `next` link of the previous page. The sequence ends once `max_pages`
/// pages were produced, the server stops sending a `next` link, or a request
/// fails. A paginator cannot be rewound; ask the client for a new one to
/// start over. Dropping it early has no side effects.
///
/// `Paginator` is not a `Stream`; drive it with `while let` as below.
///
/// # Example
///
/// ```no_run
/// use graph_api_sdk::GraphClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = GraphClient::new("user_access_token");
/// let mut friends = client.connections("me", "friends", Default::default())?;
/// while let Some(page) = friends.next_page().await {
///     println!("{:?}", page?.value);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Paginator {
    client: GraphClient,
    next_url: Option<String>,
    pages_read: usize,
    max_pages: usize,
}

impl Paginator {
    pub(crate) fn new(client: GraphClient, first_url: String, max_pages: usize) -> Self {
        Self {
            client,
            next_url: Some(first_url),
            pages_read: 0,
            max_pages,
        }
    }

    /// Override the page bound taken from the client configuration
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Number of pages produced so far
    pub fn pages_read(&self) -> usize {
        self.pages_read
    }

    /// Whether another call to `next_page` could produce a page
    pub fn is_exhausted(&self) -> bool {
        self.next_url.is_none() || self.pages_read >= self.max_pages
    }

    /// Fetch the next page, or `None` once the sequence is over
    pub async fn next_page(&mut self) -> Option<Result<Page, GraphError>> {
        if self.pages_read >= self.max_pages {
            tracing::debug!("Page limit of {} reached", self.max_pages);
            self.next_url = None;
            return None;
        }
        let url = self.next_url.take()?;
        self.pages_read += 1;

        match self.client.fetch_page(Method::GET, &url, None).await {
            Ok(page) => {
                self.next_url = page.next.clone();
                Some(Ok(page))
            }
            Err(e) => {
                tracing::error!("Failed to fetch page {}: {}", self.pages_read, e);
                Some(Err(e))
            }
        }
    }

    /// Drain the remaining pages, stopping at the first error
    pub async fn collect_pages(mut self) -> Result<Vec<Page>, GraphError> {
        let mut pages = Vec::new();
        while let Some(page) = self.next_page().await {
            pages.push(page?);
        }
        Ok(pages)
    }
}
