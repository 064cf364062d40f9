use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

use crate::{core::model::Candidate, infrastructure::BookCatalog};

#[derive(Clone, Debug, Default, PartialEq)]
pub enum SearchState {
    #[default]
    Idle,
    Searching(String),
    Results(Vec<Candidate>),
    Failed(String),
}

/// Waits for the input to go quiet before asking the catalog. Each new
/// input cancels the pending lookup, so at most one request is in flight.
///
/// Must be used from inside a tokio runtime.
pub struct DebouncedSearch<C> {
    catalog: Arc<C>,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
    state: Arc<watch::Sender<SearchState>>,
}

impl<C> DebouncedSearch<C>
where
    C: BookCatalog + Send + Sync + 'static,
{
    pub fn new(catalog: Arc<C>, delay: Duration) -> Self {
        let (state, _rx) = watch::channel(SearchState::Idle);
        Self {
            catalog,
            delay,
            pending: None,
            state: Arc::new(state),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    pub fn input(&mut self, text: &str) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }

        let text = text.trim();
        if text.is_empty() {
            self.state.send_replace(SearchState::Idle);
            return;
        }

        let text = text.to_owned();
        let catalog = Arc::clone(&self.catalog);
        let state = Arc::clone(&self.state);
        let delay = self.delay;

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.send_replace(SearchState::Searching(text.clone()));
            debug!(query = %text, "searching catalog");

            let next = match catalog.search(&text).await {
                Ok(candidates) => SearchState::Results(candidates),
                Err(error) => {
                    warn!(%error, query = %text, "catalog search failed");
                    SearchState::Failed(error.to_string())
                }
            };
            state.send_replace(next);
        }));
    }
}

impl<C> Drop for DebouncedSearch<C> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}
