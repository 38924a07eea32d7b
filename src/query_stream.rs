use futures::stream::{BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::{Session, SessionResult};

/// Lazily produced query results bound to the session that produces them.
///
/// The session stays open for as long as the stream does. [`close`](Self::close)
/// releases it; a stream dropped without being closed hands the session to
/// the current tokio runtime to be closed in the background.
#[must_use = "the underlying session stays open until the stream is closed"]
pub struct SessionStream<S: Session, T> {
    rows: Option<BoxStream<'static, SessionResult<T>>>,
    session: Option<S>,
}

impl<S: Session, T> SessionStream<S, T> {
    pub(crate) fn new(session: S, rows: BoxStream<'static, SessionResult<T>>) -> Self {
        Self {
            rows: Some(rows),
            session: Some(session),
        }
    }

    /// Stops producing rows and closes the underlying session.
    pub async fn close(mut self) -> SessionResult<()> {
        self.rows.take();
        match self.session.take() {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }
}

// The session is never pinned; only the boxed row stream is polled.
impl<S: Session, T> Unpin for SessionStream<S, T> {}

impl<S: Session, T> Stream for SessionStream<S, T> {
    type Item = SessionResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut().rows.as_mut() {
            Some(rows) => rows.poll_next_unpin(cx),
            None => Poll::Ready(None),
        }
    }
}

impl<S: Session, T> Drop for SessionStream<S, T> {
    fn drop(&mut self) {
        self.rows.take();
        let Some(session) = self.session.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(error) = session.close().await {
                        tracing::warn!(%error, "failed to close session of a dropped stream");
                    }
                });
            }
            Err(_) => {
                tracing::warn!("stream dropped outside a runtime; session released without closing");
            }
        }
    }
}
