// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The future returned by every request-issuing call.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::backend::{BackendEvent, RequestId};
use crate::error::{BackendError, DispatchError, UaResult};

type MapFn<T> = Box<dyn FnOnce(RequestId, Vec<BackendEvent>) -> UaResult<T> + Send>;

/// Resolves when the backend's completion for a dispatched request arrives.
///
/// Getting a `Completion` means the request was accepted for dispatch.
/// Dropping it abandons interest; the request is not cancelled. There is
/// no built-in deadline, wrap it in `tokio::time::timeout` if needed.
///
/// Resolves to `Err(DispatchError::Abandoned)` if the issuing node was
/// dropped or the connection closed first.
#[must_use = "a completion does nothing unless awaited"]
pub struct Completion<T> {
    inner: Inner<T>,
}

enum Inner<T> {
    Pending {
        request_id: RequestId,
        rx: oneshot::Receiver<Vec<BackendEvent>>,
        map: Option<MapFn<T>>,
    },
    Deferred(Pin<Box<dyn Future<Output = UaResult<T>> + Send>>),
    Ready(Option<UaResult<T>>),
}

impl<T> Completion<T> {
    pub(crate) fn pending<F>(request_id: RequestId, rx: oneshot::Receiver<Vec<BackendEvent>>, map: F) -> Self
    where
        F: FnOnce(RequestId, Vec<BackendEvent>) -> UaResult<T> + Send + 'static,
    {
        Self {
            inner: Inner::Pending {
                request_id,
                rx,
                map: Some(Box::new(map)),
            },
        }
    }

    pub(crate) fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = UaResult<T>> + Send + 'static,
    {
        Self {
            inner: Inner::Deferred(Box::pin(future)),
        }
    }

    /// Drives `future` on the current runtime so it makes progress whether
    /// or not the completion is awaited. Without a runtime it stays lazy.
    pub(crate) fn spawned<F>(future: F) -> Self
    where
        F: Future<Output = UaResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let task = runtime.spawn(future);
                Self::deferred(async move {
                    match task.await {
                        Ok(result) => result,
                        Err(error) => Err(BackendError::internal(format!("request task failed: {error}")).into()),
                    }
                })
            }
            Err(_) => Self::deferred(future),
        }
    }

    /// A completion that is already resolved.
    pub fn ready(result: UaResult<T>) -> Self {
        Self {
            inner: Inner::Ready(Some(result)),
        }
    }

    /// Returns the request id, if the completion waits on a single request.
    pub fn request_id(&self) -> Option<RequestId> {
        match &self.inner {
            Inner::Pending { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }

    /// Returns `true` if the result is available without waiting.
    pub fn is_ready(&self) -> bool {
        matches!(self.inner, Inner::Ready(Some(_)))
    }
}

impl<T: Send + 'static> Completion<T> {
    /// Transforms the result once it arrives.
    pub fn map<U, F>(self, f: F) -> Completion<U>
    where
        F: FnOnce(T) -> U + Send + 'static,
        U: Send + 'static,
    {
        let mut this = self;
        if let Inner::Ready(slot) = &mut this.inner {
            if let Some(result) = slot.take() {
                return Completion::ready(result.map(f));
            }
        }
        Completion::deferred(async move { this.await.map(f) })
    }
}

// Nothing is ever pinned in place inside a Completion.
impl<T> Unpin for Completion<T> {}

impl<T> Future for Completion<T> {
    type Output = UaResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.inner {
            Inner::Pending { request_id, rx, map } => match Pin::new(rx).poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(Ok(events)) => match map.take() {
                    Some(map) => Poll::Ready(map(*request_id, events)),
                    None => Poll::Ready(Err(abandoned(*request_id))),
                },
                Poll::Ready(Err(_)) => Poll::Ready(Err(abandoned(*request_id))),
            },
            Inner::Deferred(future) => future.as_mut().poll(cx),
            Inner::Ready(result) => Poll::Ready(result.take().unwrap_or_else(|| Err(abandoned(0)))),
        }
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.inner {
            Inner::Pending { .. } => "pending",
            Inner::Deferred(_) => "deferred",
            Inner::Ready(_) => "ready",
        };
        f.debug_struct("Completion")
            .field("request_id", &self.request_id())
            .field("state", &state)
            .finish()
    }
}

fn abandoned(request_id: RequestId) -> crate::error::UaError {
    DispatchError::Abandoned { request_id }.into()
}

/// Takes the single event of a completion and extracts a value from it.
///
/// `extract` hands the event back when it is of the wrong kind.
pub(crate) fn expect_single<T>(
    request_id: RequestId,
    events: Vec<BackendEvent>,
    extract: impl FnOnce(BackendEvent) -> Result<T, BackendEvent>,
) -> UaResult<T> {
    let Some(event) = events.into_iter().next() else {
        return Err(abandoned(request_id));
    };
    extract(event).map_err(|event| unexpected(request_id, &event))
}

/// Builds the error for a completion of the wrong kind.
pub(crate) fn unexpected(request_id: RequestId, event: &BackendEvent) -> crate::error::UaError {
    DispatchError::UnexpectedCompletion {
        request_id,
        event: event.name(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UaError;
    use crate::status::StatusCode;

    fn browse_event() -> BackendEvent {
        BackendEvent::BrowseFinished {
            references: Vec::new(),
            status: StatusCode::GOOD,
        }
    }

    #[tokio::test]
    async fn test_pending_resolves() {
        let (tx, rx) = oneshot::channel();
        let completion = Completion::pending(5, rx, |id, events| {
            expect_single(id, events, |event| match event {
                BackendEvent::BrowseFinished { status, .. } => Ok(status),
                other => Err(other),
            })
        });
        assert_eq!(completion.request_id(), Some(5));
        tx.send(vec![browse_event()]).unwrap();
        assert_eq!(completion.await.unwrap(), StatusCode::GOOD);
    }

    #[tokio::test]
    async fn test_dropped_sender_abandons() {
        let (tx, rx) = oneshot::channel::<Vec<BackendEvent>>();
        let completion = Completion::pending(9, rx, |_, _| Ok(()));
        drop(tx);
        let err = completion.await.unwrap_err();
        assert!(matches!(err, UaError::Dispatch(DispatchError::Abandoned { request_id: 9 })));
    }

    #[tokio::test]
    async fn test_unexpected_event() {
        let (tx, rx) = oneshot::channel();
        let completion = Completion::pending(3, rx, |id, events| {
            expect_single(id, events, |event| match event {
                BackendEvent::NodeAdded { node_id, .. } => Ok(node_id),
                other => Err(other),
            })
        });
        tx.send(vec![browse_event()]).unwrap();
        let err = completion.await.unwrap_err();
        assert!(matches!(
            err,
            UaError::Dispatch(DispatchError::UnexpectedCompletion { event: "BrowseFinished", .. })
        ));
    }

    #[tokio::test]
    async fn test_ready_and_map() {
        let completion = Completion::ready(Ok(2u32));
        assert!(completion.is_ready());
        assert_eq!(completion.map(|v| v * 10).await.unwrap(), 20);

        let deferred = Completion::deferred(async { Ok::<_, UaError>("late") }).map(str::len);
        assert_eq!(deferred.await.unwrap(), 4);
    }
}
