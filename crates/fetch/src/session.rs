//! Pipeline selection with stale-response discarding.
//!
//! Every `select` is tagged with the next request id. A finished fetch is
//! published only while its id is still the newest issued, so a slow answer
//! for an earlier selection can never replace the view of a later one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use stepline_core::aggregate;
use stepline_core::model::build::PipelineInfo;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::traces::{TraceSource, log_skipped};

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub request_id: u64,
    pub pipeline: String,
    pub info: PipelineInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Published,
    Stale,
}

pub struct Selection {
    pub request_id: u64,
    pub task: JoinHandle<Delivery>,
}

type View = Option<Arc<Snapshot>>;

pub struct Dashboard<S> {
    source: Arc<S>,
    latest: Arc<AtomicU64>,
    view: watch::Sender<View>,
}

impl<S: TraceSource> Dashboard<S> {
    pub fn new(source: S) -> Self {
        let (view, _) = watch::channel(None);
        Self {
            source: Arc::new(source),
            latest: Arc::new(AtomicU64::new(0)),
            view,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<View> {
        self.view.subscribe()
    }

    pub fn current(&self) -> View {
        self.view.borrow().clone()
    }

    /// Id of the most recent selection, 0 before the first.
    pub fn latest_request(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Starts a fetch for `pipeline`; must be called inside a tokio runtime.
    pub fn select(&self, pipeline: &str) -> Selection {
        let request_id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let source = Arc::clone(&self.source);
        let latest = Arc::clone(&self.latest);
        let view = self.view.clone();
        let pipeline = pipeline.to_string();
        tracing::debug!(request_id, pipeline = %pipeline, "pipeline selected");

        let task = tokio::spawn(async move {
            let traces = source.fetch_traces(&pipeline).await;
            let agg = aggregate(&pipeline, &traces);
            log_skipped(&pipeline, &agg.skipped);
            publish(
                &view,
                &latest,
                Snapshot {
                    request_id,
                    pipeline,
                    info: agg.info,
                },
            )
        });

        Selection { request_id, task }
    }
}

fn publish(view: &watch::Sender<View>, latest: &AtomicU64, snapshot: Snapshot) -> Delivery {
    let request_id = snapshot.request_id;
    let published = view.send_if_modified(|current| {
        if latest.load(Ordering::SeqCst) != request_id {
            return false;
        }
        if current.as_ref().is_some_and(|c| c.request_id >= request_id) {
            return false;
        }
        *current = Some(Arc::new(snapshot));
        true
    });

    if published {
        Delivery::Published
    } else {
        tracing::debug!(request_id, "discarded stale pipeline result");
        Delivery::Stale
    }
}
