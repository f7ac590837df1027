//! Background loading for views.
//!
//! A `Fetch<T>` owns a loader closure, runs it on the tokio runtime and
//! exposes the outcome as a `FetchState` the render code can match on. Views
//! call `poll()` from their tick handler; nothing here blocks the UI loop.
//!
//! ```ignore
//! let store = store.clone();
//! let mut entries = Fetch::new(move || {
//!     let store = store.clone();
//!     let user = user_id.clone();
//!     async move { store.journal_entries(&user).await }
//! });
//! entries.fetch();
//! ```

use color_eyre::{eyre::eyre, Result};
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub enum FetchState<T> {
  Idle,
  Loading,
  Ready(T),
  /// Failure rendered for display
  Failed(String),
}

impl<T> FetchState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, FetchState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      FetchState::Ready(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      FetchState::Failed(e) => Some(e),
      _ => None,
    }
  }
}

type Loader<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

pub struct Fetch<T> {
  state: FetchState<T>,
  loader: Loader<T>,
  receiver: Option<oneshot::Receiver<Result<T>>>,
}

impl<T: Send + 'static> Fetch<T> {
  pub fn new<F, Fut>(loader: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    Self {
      state: FetchState::Idle,
      loader: Box::new(move || loader().boxed()),
      receiver: None,
    }
  }

  pub fn state(&self) -> &FetchState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  /// Local edits made while the view is open.
  pub fn data_mut(&mut self) -> Option<&mut T> {
    match &mut self.state {
      FetchState::Ready(data) => Some(data),
      _ => None,
    }
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Start loading unless a load is already running.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start();
  }

  /// Start over; the result of a load already running is discarded.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.start();
  }

  /// Pick up a finished load. Returns true when the state changed.
  pub fn poll(&mut self) -> bool {
    let Some(receiver) = &mut self.receiver else {
      return false;
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = FetchState::Ready(data);
        self.receiver = None;
        true
      }
      Ok(Err(e)) => {
        self.state = FetchState::Failed(e.to_string());
        self.receiver = None;
        true
      }
      Err(oneshot::error::TryRecvError::Empty) => false,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.state = FetchState::Failed("Load was cancelled".to_string());
        self.receiver = None;
        true
      }
    }
  }

  fn start(&mut self) {
    let (tx, rx) = oneshot::channel();
    self.receiver = Some(rx);
    self.state = FetchState::Loading;

    let future = (self.loader)();
    tokio::spawn(async move {
      // The view may be gone by now
      let _ = tx.send(future.await);
    });
  }
}

/// One write started from a key press. Unlike `Fetch` it runs exactly once;
/// the owning view polls it from `tick` and reports the outcome.
pub struct Task<T> {
  receiver: oneshot::Receiver<Result<T>>,
}

impl<T: Send + 'static> Task<T> {
  pub fn spawn<Fut>(future: Fut) -> Self
  where
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(future.await);
    });
    Self { receiver: rx }
  }

  /// The result once the write is done, `None` while it is still running.
  pub fn poll(&mut self) -> Option<Result<T>> {
    match self.receiver.try_recv() {
      Ok(result) => Some(result),
      Err(oneshot::error::TryRecvError::Empty) => None,
      Err(oneshot::error::TryRecvError::Closed) => Some(Err(eyre!("Task was cancelled"))),
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Fetch<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Fetch")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}
