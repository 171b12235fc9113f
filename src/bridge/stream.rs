//! Stream interop: one-item streams out, drained streams in.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};

use crate::error::Fault;
use crate::signals::Signal;

use super::SignalFuture;

impl Signal {
    /// Adapts this signal into a stream yielding exactly one
    /// `Result<(), Fault>` item, then ending.
    pub fn into_stream(self) -> SignalStream {
        SignalStream {
            future: self.into_future(),
            done: false,
        }
    }

    /// Drains a fallible stream into a terminal: item values are discarded,
    /// the first `Err` short-circuits as the failure, end of stream
    /// completes.
    ///
    /// ## Example
    /// ```
    /// use futures::stream;
    /// use onesig::{Fault, Signal};
    ///
    /// let items: Vec<Result<u32, Fault>> = vec![Ok(1), Ok(2), Ok(3)];
    /// assert!(Signal::from_stream(stream::iter(items)).wait().is_ok());
    /// ```
    pub fn from_stream<S, T>(stream: S) -> Signal
    where
        S: Stream<Item = Result<T, Fault>> + Send + 'static,
        T: Send + 'static,
    {
        Signal::from_future(async move {
            let mut stream = Box::pin(stream);
            while let Some(item) = stream.next().await {
                item?;
            }
            Ok(())
        })
    }
}

/// Stream side of [`Signal::into_stream`]: the terminal as a single item.
pub struct SignalStream {
    future: SignalFuture,
    done: bool,
}

impl Stream for SignalStream {
    type Item = Result<(), Fault>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.future).poll(cx) {
            Poll::Ready(result) => {
                this.done = true;
                Poll::Ready(Some(result))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn yields_one_item_then_ends() {
        let mut s = Signal::empty().into_stream();
        block_on(async {
            assert!(matches!(s.next().await, Some(Ok(()))), "one terminal item");
            assert!(s.next().await.is_none(), "then the stream ends");
        });
    }

    #[test]
    fn failure_is_the_single_item() {
        let mut s = Signal::fail(Fault::msg("down")).into_stream();
        block_on(async {
            match s.next().await {
                Some(Err(fault)) => assert_eq!(fault.to_string(), "down"),
                other => panic!("expected one failure item, got {other:?}"),
            }
            assert!(s.next().await.is_none());
        });
    }

    #[test]
    fn from_stream_drains_to_completion() {
        let items: Vec<Result<u32, Fault>> = vec![Ok(1), Ok(2), Ok(3)];
        assert!(Signal::from_stream(stream::iter(items)).wait().is_ok());
    }

    #[test]
    fn from_stream_short_circuits_on_the_first_error() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let p = pulled.clone();

        let items: Vec<Result<u32, Fault>> =
            vec![Ok(1), Err(Fault::msg("midway")), Ok(3)];
        let counted = stream::iter(items).inspect(move |_| {
            p.fetch_add(1, Ordering::SeqCst);
        });

        let fault = Signal::from_stream(counted).wait().unwrap_err();
        assert_eq!(fault.to_string(), "midway");
        assert_eq!(pulled.load(Ordering::SeqCst), 2, "nothing pulled past the error");
    }

    #[test]
    fn empty_stream_completes() {
        let empty = stream::iter(Vec::<Result<u32, Fault>>::new());
        assert!(Signal::from_stream(empty).wait().is_ok());
    }
}
