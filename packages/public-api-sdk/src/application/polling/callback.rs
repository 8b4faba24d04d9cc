//! Subscription callbacks.
//!
//! A callback is either a plain blocking closure, run on the scheduler's
//! blocking worker pool, or an async closure, awaited on the scheduler's own
//! event loop. Errors and panics from either kind are contained and reported
//! as `CallbackError`.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::domain::subscription::change::{OrderUpdate, PriceChange};

/// Blocking callback signature.
pub type BlockingCallbackFn<C> = dyn Fn(C) -> anyhow::Result<()> + Send + Sync;

/// Async callback signature.
pub type AsyncCallbackFn<C> = dyn Fn(C) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// Callback invoked with each detected change.
pub enum Callback<C> {
    /// Runs on a blocking worker thread.
    Blocking(Arc<BlockingCallbackFn<C>>),
    /// Awaited on the scheduler's event loop.
    Async(Arc<AsyncCallbackFn<C>>),
}

/// Callback for quote changes.
pub type PriceChangeCallback = Callback<PriceChange>;

/// Callback for order status changes.
pub type OrderUpdateCallback = Callback<OrderUpdate>;

/// Failure of a single callback invocation.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// The callback returned an error.
    #[error("callback returned an error: {0:#}")]
    Failed(anyhow::Error),

    /// The callback panicked.
    #[error("callback panicked")]
    Panicked,
}

impl<C: Send + 'static> Callback<C> {
    /// Wrap a blocking closure.
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(C) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::Blocking(Arc::new(f))
    }

    /// Wrap an async closure.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::Async(Arc::new(move |change| f(change).boxed()))
    }

    /// Returns true for async callbacks.
    #[must_use]
    pub const fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }

    /// Invoke the callback, containing errors and panics.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) async fn invoke(&self, change: C) -> Result<(), CallbackError> {
        let outcome = match self {
            Self::Blocking(f) => {
                let f = Arc::clone(f);
                match tokio::task::spawn_blocking(move || f(change)).await {
                    Ok(result) => result,
                    Err(_) => return Err(CallbackError::Panicked),
                }
            }
            Self::Async(f) => match AssertUnwindSafe(f(change)).catch_unwind().await {
                Ok(result) => result,
                Err(_) => return Err(CallbackError::Panicked),
            },
        };
        outcome.map_err(CallbackError::Failed)
    }
}

impl<C> Clone for Callback<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Blocking(f) => Self::Blocking(Arc::clone(f)),
            Self::Async(f) => Self::Async(Arc::clone(f)),
        }
    }
}

impl<C> fmt::Debug for Callback<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking(_) => f.write_str("Callback::Blocking"),
            Self::Async(_) => f.write_str("Callback::Async"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn blocking_callback_receives_change() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let callback = Callback::blocking(move |n: usize| {
            counter.fetch_add(n, Ordering::SeqCst);
            Ok(())
        });

        callback.invoke(5).await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert!(!callback.is_async());
    }

    #[tokio::test]
    async fn async_callback_receives_change() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let callback = Callback::from_async(move |n: usize| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(n, Ordering::SeqCst);
                Ok::<(), anyhow::Error>(())
            }
        });

        callback.invoke(3).await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert!(callback.is_async());
    }

    #[tokio::test]
    async fn callback_error_is_reported() {
        let callback = Callback::blocking(|_: u8| anyhow::bail!("boom"));
        let err = callback.invoke(1).await.unwrap_err();
        assert!(matches!(err, CallbackError::Failed(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn blocking_panic_is_contained() {
        let callback = Callback::blocking(|_: u8| -> anyhow::Result<()> { panic!("kaboom") });
        assert!(matches!(
            callback.invoke(1).await,
            Err(CallbackError::Panicked)
        ));
    }

    #[tokio::test]
    async fn async_panic_is_contained() {
        let callback = Callback::from_async(|n: u8| async move {
            assert!(n == 0, "kaboom");
            Ok::<(), anyhow::Error>(())
        });
        assert!(matches!(
            callback.invoke(1).await,
            Err(CallbackError::Panicked)
        ));
    }
}
