use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::backend::BackendError;

/// What callers show in place of a reply whose stream failed.
pub const APOLOGY_MESSAGE: &str = "Sorry, something went wrong. Please try again.";

/// Terminal failure of a reply stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Consuming an in-progress incremental backend result failed.
    Stream(BackendError),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Stream(err) => write!(f, "reply stream failed: {err}"),
        }
    }
}

impl Error for ChatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ChatError::Stream(err) => Some(err),
        }
    }
}

pub type FragmentResult = Result<String, ChatError>;

/// Lazily produced reply fragments.
///
/// Nothing runs until the stream is polled, and each poll advances at most to
/// the next fragment. An `Err` item is terminal. After [`close`](Self::close),
/// cancellation through a [`CancellationToken`] from
/// [`cancel_token`](Self::cancel_token), or the end of the reply, the pending
/// work is dropped and the stream only yields `None`.
pub struct FragmentStream {
    inner: Option<BoxStream<'static, FragmentResult>>,
    cancel: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl FragmentStream {
    pub fn new<S>(fragments: S) -> Self
    where
        S: Stream<Item = FragmentResult> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let cancelled = Box::pin(cancel.clone().cancelled_owned());
        Self {
            inner: Some(fragments.boxed()),
            cancel,
            cancelled,
        }
    }

    /// Stops the reply. Any in-flight request or timer is dropped.
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.inner = None;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Token that closes this stream from elsewhere, e.g. a Ctrl+C handler.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drains the stream into the full reply text.
    pub async fn collect_text(mut self) -> Result<String, ChatError> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for FragmentStream {
    type Item = FragmentResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.inner.is_none() {
            return Poll::Ready(None);
        }
        if this.cancelled.as_mut().poll(cx).is_ready() {
            this.inner = None;
            return Poll::Ready(None);
        }

        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(fragment))) => Poll::Ready(Some(Ok(fragment))),
            Poll::Ready(Some(Err(err))) => {
                this.inner = None;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.inner = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl fmt::Debug for FragmentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentStream")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn ok(text: &str) -> FragmentResult {
        Ok(text.to_string())
    }

    #[tokio::test]
    async fn collect_text_concatenates_in_order() {
        let fragments = FragmentStream::new(stream::iter(vec![ok("a"), ok(""), ok("b c")]));
        assert_eq!(fragments.collect_text().await, Ok("ab c".to_string()));
    }

    #[tokio::test]
    async fn error_is_terminal() {
        let err = ChatError::Stream(BackendError::Stream("boom".to_string()));
        let mut fragments = FragmentStream::new(stream::iter(vec![
            ok("partial"),
            Err(err.clone()),
            ok("never"),
        ]));
        assert_eq!(fragments.next().await, Some(ok("partial")));
        assert_eq!(fragments.next().await, Some(Err(err)));
        assert_eq!(fragments.next().await, None);
        assert!(fragments.is_closed());
    }

    #[tokio::test]
    async fn close_drops_pending_work() {
        struct DropFlag(Arc<AtomicBool>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(Arc::clone(&dropped));
        let pending = stream::once(async move {
            let _flag = flag;
            std::future::pending::<()>().await;
            ok("unreachable")
        });
        let mut fragments = FragmentStream::new(pending);

        let waker = futures_util::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert!(Pin::new(&mut fragments).poll_next(&mut cx).is_pending());

        fragments.close();
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(fragments.next().await, None);
    }

    #[tokio::test]
    async fn cancel_token_wakes_a_waiting_consumer() {
        let mut fragments = FragmentStream::new(stream::pending::<FragmentResult>());
        let token = fragments.cancel_token();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            token.cancel();
        });
        assert_eq!(fragments.next().await, None);
        assert!(fragments.is_closed());
    }

    #[test]
    fn futures_are_not_polled_before_first_pull() {
        let started = Arc::new(AtomicBool::new(false));
        let observed = Arc::clone(&started);
        let lazy = stream::once(async move {
            observed.store(true, Ordering::SeqCst);
            ok("x")
        });
        let fragments = FragmentStream::new(lazy);
        assert!(!started.load(Ordering::SeqCst));
        drop(fragments);
        assert!(!started.load(Ordering::SeqCst));
    }
}
