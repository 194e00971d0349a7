//! Pagination shared by the list endpoints.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio_stream::Stream;

type Page<T> = (VecDeque<T>, Option<String>);
type OneFuturePage<'a, F, T> =
    Pin<Box<dyn Future<Output = eyre::Result<(F, Page<T>)>> + 'a + Send>>;

/// Yields the items of a list endpoint one by one, fetching the next page
/// (via `nextPageToken`) only once the current one has been drained.
///
/// A failed page fetch is yielded as an error and ends the stream.
pub struct PagedStream<'a, T, F> {
    current_items: VecDeque<T>,
    pending_request: Option<OneFuturePage<'a, F, T>>,
}

impl<'a, T, F> PagedStream<'a, T, F> {
    /// `fetcher` is called with `None` for the first page and with the previous
    /// page's token after that.
    pub fn new<Fut>(fetcher: F) -> Self
    where
        F: Fn(Option<String>) -> Fut,
        F: Send + 'a,
        Fut: Future<Output = eyre::Result<Page<T>>> + Send + 'a,
    {
        let first_page = async move {
            let page = fetcher(None).await?;
            Ok((fetcher, page))
        };
        Self {
            current_items: VecDeque::new(),
            pending_request: Some(Box::pin(first_page)),
        }
    }
}

impl<T: Unpin, F> Unpin for PagedStream<'_, T, F> {}

impl<'a, T: Unpin, F, Fut> Stream for PagedStream<'a, T, F>
where
    F: Fn(Option<String>) -> Fut,
    F: Send + 'a,
    Fut: Future<Output = eyre::Result<Page<T>>> + Send + 'a,
{
    type Item = eyre::Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.current_items.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            let Some(pending) = self.pending_request.as_mut() else {
                return Poll::Ready(None);
            };

            match pending.as_mut().poll(cx) {
                Poll::Ready(Ok((fetcher, (items, next_token)))) => {
                    self.current_items.extend(items);
                    self.pending_request = next_token.map(|token| -> OneFuturePage<'a, F, T> {
                        Box::pin(async move {
                            let page = fetcher(Some(token)).await?;
                            Ok((fetcher, page))
                        })
                    });
                }
                Poll::Ready(Err(e)) => {
                    self.pending_request = None;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Paging details for lists of resources.
///
/// See: <https://developers.google.com/youtube/v3/docs/pageInfo>
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct PageInfo {
    /// The total number of results in the result set.
    #[serde(rename = "totalResults")]
    pub total_results: u32,
    /// The number of results included in the API response.
    #[serde(rename = "resultsPerPage")]
    pub results_per_page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn follows_page_tokens_until_exhausted() {
        let calls = AtomicUsize::new(0);
        let stream = PagedStream::new(|token: Option<String>| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(match token.as_deref() {
                    None => (VecDeque::from([1, 2]), Some("p2".to_string())),
                    Some("p2") => (VecDeque::from([3]), None),
                    Some(other) => eyre::bail!("unexpected page token {other}"),
                })
            }
        });

        let items: Vec<u32> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn page_error_ends_stream() {
        let stream = PagedStream::new(|token: Option<String>| async move {
            match token {
                None => Ok((VecDeque::from(["a"]), Some("next".to_string()))),
                Some(_) => Err(eyre::eyre!("page two failed")),
            }
        });
        let mut stream = std::pin::pin!(stream);

        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
