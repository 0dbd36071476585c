pub mod debounce;

pub use debounce::{DebounceTimer, DEFAULT_DEBOUNCE_WINDOW};

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::classifier::PageClassifier;
use crate::models::{TabEvent, TabId, TabLoadStatus};
use crate::tracking::TrackingController;
use crate::utils::logging::TRACKING;

const ENABLE_LOGS: bool = true;

use crate::log_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingRequest {
    Start(TabId),
    Stop,
}

/// Turns tab lifecycle events into debounced start and stop requests.
///
/// Requests that have fired run one at a time, in the order they fired.
#[derive(Clone)]
pub struct EventDispatcher {
    tracking: TrackingController,
    classifier: PageClassifier,
    debounce: DebounceTimer,
    in_flight: Arc<Mutex<()>>,
}

impl EventDispatcher {
    pub fn new(
        tracking: TrackingController,
        classifier: PageClassifier,
        debounce: DebounceTimer,
    ) -> Self {
        Self {
            tracking,
            classifier,
            debounce,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// What `event` asks of tracking, given the tab currently tracked.
    pub fn route(&self, event: &TabEvent, tracked: Option<TabId>) -> Option<TrackingRequest> {
        match event {
            TabEvent::TabUpdated {
                tab_id,
                url,
                status: Some(TabLoadStatus::Complete),
            } => {
                if self.classifier.is_target_page(url.as_deref()) {
                    Some(TrackingRequest::Start(*tab_id))
                } else if tracked == Some(*tab_id) {
                    Some(TrackingRequest::Stop)
                } else {
                    None
                }
            }
            TabEvent::TabUpdated { .. } => None,
            TabEvent::TabActivated { tab_id, url } => {
                if self.classifier.is_target_page(url.as_deref()) {
                    Some(TrackingRequest::Start(*tab_id))
                } else {
                    Some(TrackingRequest::Stop)
                }
            }
            TabEvent::TabRemoved { tab_id } => {
                (tracked == Some(*tab_id)).then_some(TrackingRequest::Stop)
            }
        }
    }

    pub async fn handle(&self, event: &TabEvent) {
        let tracked = self.tracking.current_tab().await;
        if let Some(request) = self.route(event, tracked) {
            self.request(request);
        }
    }

    /// Drop a start or stop that has not fired yet.
    pub fn cancel_pending(&self) {
        self.debounce.cancel();
    }

    fn request(&self, request: TrackingRequest) {
        let tracking = self.tracking.clone();
        let in_flight = self.in_flight.clone();
        self.debounce.arm(move || async move {
            let _serial = in_flight.lock().await;
            let result = match request {
                TrackingRequest::Start(tab_id) => tracking.start(tab_id).await,
                TrackingRequest::Stop => tracking.stop().await,
            };
            if let Err(err) = result {
                log_error!(target: TRACKING, "{:?} failed: {err:#}", request);
            }
        });
    }
}
