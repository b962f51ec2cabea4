//! Racing fetcher
//!
//! Issues one request per equivalent mirror at the same time and keeps the
//! first usable answer. Every candidate task shares a single
//! [`CancellationToken`]; once a winner is known the token is cancelled and
//! the remaining tasks abort at their next await point. The aggregate
//! failure is only reported after every task has finished.

use bytes::Bytes;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::KeyTable;
use crate::error::{ResolverError, Result};
use crate::transport::HttpClient;

/// Default per-candidate timeout for the bulk key table
pub const KEY_TABLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default per-candidate timeout for single-resource fetches
pub const RESOURCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Winning candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Won<T> {
    /// Candidate that produced the value
    pub url: String,
    /// Fetched value
    pub value: T,
}

/// How a single candidate task ended
enum Outcome<T> {
    Done(T),
    Failed(ResolverError),
    Cancelled,
}

/// Race `fetch` over every candidate and return the first success
///
/// `fetch` is called once per candidate, in order, to build that candidate's
/// future; futures run concurrently on their own tasks. A candidate that
/// errors or exceeds `per_candidate_timeout` fails only itself.
pub async fn race<T, F, Fut>(
    candidates: &[String],
    per_candidate_timeout: Duration,
    fetch: F,
) -> Result<Won<T>>
where
    T: Send + 'static,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let attempted = candidates.len();
    if attempted == 0 {
        return Err(ResolverError::AllCandidatesFailed { attempted });
    }

    let token = CancellationToken::new();
    let mut tasks = JoinSet::new();

    for url in candidates {
        let token = token.clone();
        let request = fetch(url.clone());
        let url = url.clone();

        tasks.spawn(async move {
            let outcome = tokio::select! {
                biased;
                () = token.cancelled() => Outcome::Cancelled,
                result = tokio::time::timeout(per_candidate_timeout, request) => match result {
                    Ok(Ok(value)) => Outcome::Done(value),
                    Ok(Err(e)) => Outcome::Failed(e),
                    Err(_) => Outcome::Failed(ResolverError::Timeout(per_candidate_timeout)),
                },
            };
            (url, outcome)
        });
    }

    let mut winner = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((url, Outcome::Done(value))) => {
                if winner.is_none() {
                    token.cancel();
                    winner = Some(Won { url, value });
                }
            }
            Ok((url, Outcome::Failed(e))) => {
                if e.is_not_found() {
                    debug!("Candidate {url} has nothing: {e}");
                } else {
                    warn!("Candidate {url} failed: {e}");
                }
            }
            Ok((url, Outcome::Cancelled)) => {
                debug!("Candidate {url} cancelled");
            }
            Err(e) => {
                warn!("Candidate task aborted: {e}");
            }
        }
    }

    match winner {
        Some(won) => {
            info!("Fetched from {} ({} candidates)", won.url, attempted);
            Ok(won)
        }
        None => Err(ResolverError::AllCandidatesFailed { attempted }),
    }
}

/// Race the bulk key table over equivalent mirrors
///
/// A candidate only wins with a 200 response holding a non-empty JSON object
/// of string to string.
pub async fn fetch_key_table(
    client: &HttpClient,
    urls: &[String],
    per_candidate_timeout: Duration,
) -> Result<Won<KeyTable>> {
    race(urls, per_candidate_timeout, |url| {
        let client = client.clone();
        async move {
            let table: KeyTable = client.get_json(&url, per_candidate_timeout).await?;
            if table.is_empty() {
                return Err(ResolverError::EmptyResponse(url));
            }
            Ok(table)
        }
    })
    .await
}

/// Race a binary resource over equivalent mirrors
pub async fn fetch_bytes(
    client: &HttpClient,
    urls: &[String],
    per_candidate_timeout: Duration,
) -> Result<Won<Bytes>> {
    race(urls, per_candidate_timeout, |url| {
        let client = client.clone();
        async move { client.get_bytes(&url, per_candidate_timeout).await }
    })
    .await
}
