//! Work unit contract.
//!
//! A work unit is a zero-argument async callable supplied by a
//! collaborator (an ETL job manager, a maintenance task). It receives a
//! `CancellationToken` as its cooperative deadline: the executor cancels
//! the token when the timeout ceiling elapses or the scheduler shuts down,
//! and a unit that ignores it keeps running in the background. The return
//! value is an opaque serializable payload the scheduler stores verbatim.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Boxed future a work unit resolves to.
pub type WorkFuture =
    Pin<Box<dyn Future<Output = Result<serde_json::Value, anyhow::Error>> + Send>>;

/// The stored form of a work unit.
pub type WorkFn = Arc<dyn Fn(CancellationToken) -> WorkFuture + Send + Sync>;

/// Wrap an async closure into a [`WorkFn`], serializing its return value.
///
/// ```ignore
/// let work = work_fn(|_cancel| async move {
///     let quotes = fetch_quotes().await?;
///     Ok(serde_json::json!({ "count": quotes.len() }))
/// });
/// ```
pub fn work_fn<F, Fut, T>(f: F) -> WorkFn
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, anyhow::Error>> + Send + 'static,
    T: Serialize,
{
    Arc::new(move |cancel| {
        let fut = f(cancel);
        Box::pin(async move {
            let value = fut.await?;
            Ok(serde_json::to_value(value)?)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct CollectionReport {
        source: &'static str,
        count: usize,
    }

    #[tokio::test]
    async fn test_work_fn_serializes_payload() {
        let work = work_fn(|_cancel| async move {
            Ok(CollectionReport {
                source: "JSE",
                count: 42,
            })
        });

        let payload = (work)(CancellationToken::new()).await.unwrap();
        assert_eq!(payload["source"], "JSE");
        assert_eq!(payload["count"], 42);
    }

    #[tokio::test]
    async fn test_work_fn_propagates_errors() {
        let work = work_fn(|_cancel| async move {
            if true {
                anyhow::bail!("upstream unavailable");
            }
            Ok(serde_json::json!({}))
        });

        let err = (work)(CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("upstream unavailable"));
    }

    #[tokio::test]
    async fn test_work_fn_sees_cancellation() {
        let work = work_fn(|cancel: CancellationToken| async move {
            Ok(serde_json::json!({ "cancelled": cancel.is_cancelled() }))
        });

        let token = CancellationToken::new();
        token.cancel();
        let payload = (work)(token).await.unwrap();
        assert_eq!(payload["cancelled"], true);
    }
}
