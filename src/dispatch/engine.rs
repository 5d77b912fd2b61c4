//! Broadcast run lifecycle.
//!
//! One engine instance lives for the whole process. A run starts with a
//! snapshot of everything sendable expanded against the recipient list,
//! then a ticker task delivers exactly one queued item per interval until
//! the queue drains or someone calls `stop`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::campaigns::model::Card;
use crate::dispatch::composer;
use crate::error::{ClientError, DispatchError};
use crate::store::CampaignStore;
use crate::wa::Messenger;

/// Pace between deliveries when the caller does not pick one.
pub const DEFAULT_SEND_INTERVAL_SECS: u64 = 5;

/// Sent in place of a caption when a card yields no text at all.
const EMPTY_CAPTION_FALLBACK: &str = "(no content)";

/// One scheduled delivery. Card data is a value snapshot taken at start
/// time, so edits made mid-run never reach an active queue.
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// Chat ID the item will be delivered to.
    pub recipient: String,
    pub card: Card,
    /// Title of the campaign the card came from, for logs.
    pub campaign_title: String,
}

/// Snapshot returned by [`DispatchEngine::status`].
#[derive(Debug, Clone, Serialize)]
pub struct DispatchStatus {
    pub running: bool,
    /// Items still waiting for delivery.
    pub queued: usize,
    /// When the ticker last fired, across runs.
    pub last_tick_at: Option<DateTime<Utc>>,
    /// Deliveries confirmed by the gateway during the current or most
    /// recent run.
    pub sent: u64,
    /// Deliveries the gateway rejected; failed items are dropped, not
    /// retried.
    pub failed: u64,
}

/// Mutable run state, guarded by one mutex.
struct EngineState {
    running: bool,
    queue: VecDeque<QueueItem>,
    last_tick_at: Option<DateTime<Utc>>,
    /// Bumped on every start and stop. A tick holding a stale generation
    /// must not touch anything.
    generation: u64,
    sent: u64,
    failed: u64,
    ticker: Option<JoinHandle<()>>,
}

/// Owns the broadcast lifecycle: idle until `start`, running until the
/// queue drains or `stop` is called. At most one run is active at a time.
pub struct DispatchEngine {
    store: Arc<dyn CampaignStore>,
    messenger: Arc<dyn Messenger>,
    state: Arc<Mutex<EngineState>>,
}

impl DispatchEngine {
    pub fn new(store: Arc<dyn CampaignStore>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            store,
            messenger,
            state: Arc::new(Mutex::new(EngineState {
                running: false,
                queue: VecDeque::new(),
                last_tick_at: None,
                generation: 0,
                sent: 0,
                failed: 0,
                ticker: None,
            })),
        }
    }

    /// Start a run over the given recipient groups.
    ///
    /// Validation happens before any state changes: a failed start leaves
    /// the engine exactly as it was, with no partial queue and no ticker.
    pub async fn start(
        &self,
        groups: Vec<String>,
        interval_secs: Option<u64>,
    ) -> Result<(), DispatchError> {
        {
            let state = self.state.lock().await;
            if state.running {
                return Err(DispatchError::AlreadyRunning);
            }
        }

        if groups.is_empty() {
            return Err(DispatchError::InvalidInput(
                "at least one recipient group is required".into(),
            ));
        }

        let interval_secs = interval_secs.unwrap_or(DEFAULT_SEND_INTERVAL_SECS).max(1);

        self.messenger
            .ensure_ready()
            .await
            .map_err(DispatchError::ClientInit)?;

        let queue = self.build_queue(&groups).await?;
        if queue.is_empty() {
            return Err(DispatchError::EmptyQueue);
        }

        let mut state = self.state.lock().await;
        if state.running {
            // Another start won the race while we were building the queue.
            return Err(DispatchError::AlreadyRunning);
        }
        let queued = queue.len();
        state.running = true;
        state.queue = queue;
        state.sent = 0;
        state.failed = 0;
        state.generation += 1;
        state.ticker = Some(spawn_ticker(
            Arc::clone(&self.state),
            Arc::clone(&self.messenger),
            interval_secs,
            state.generation,
        ));

        info!(queued, interval_secs, groups = groups.len(), "Broadcast started");
        Ok(())
    }

    /// Stop the current run and discard whatever is still queued.
    /// Idempotent: calling this while idle does nothing visible.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let was_running = state.running;
        state.running = false;
        state.queue.clear();
        state.generation += 1;
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        if was_running {
            info!(sent = state.sent, failed = state.failed, "Broadcast stopped");
        }
    }

    /// Report the current run state. Never fails, callable in any phase.
    pub async fn status(&self) -> DispatchStatus {
        let state = self.state.lock().await;
        DispatchStatus {
            running: state.running,
            queued: state.queue.len(),
            last_tick_at: state.last_tick_at,
            sent: state.sent,
            failed: state.failed,
        }
    }

    /// Expand everything sendable against the recipient list.
    ///
    /// Order is deterministic: campaigns oldest first, each campaign's
    /// sendable cards oldest first, and for each card the recipients in
    /// the order the caller gave them.
    async fn build_queue(&self, groups: &[String]) -> Result<VecDeque<QueueItem>, DispatchError> {
        let snapshot = self.store.snapshot_sendable().await?;

        let mut items = VecDeque::new();
        for campaign in snapshot {
            for card in campaign.cards.into_iter().filter(|c| c.send) {
                for recipient in groups {
                    items.push_back(QueueItem {
                        recipient: recipient.clone(),
                        card: card.clone(),
                        campaign_title: campaign.title.clone(),
                    });
                }
            }
        }
        Ok(items)
    }
}

/// Spawn the pacing loop for one run.
///
/// The first interval elapses before the first delivery; a tick that
/// observes a stale generation exits without touching state.
fn spawn_ticker(
    state: Arc<Mutex<EngineState>>,
    messenger: Arc<dyn Messenger>,
    interval_secs: u64,
    generation: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Swallow the immediate first tick so the run paces from the start.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !tick(&state, messenger.as_ref(), generation).await {
                break;
            }
        }
    })
}

/// One pacing tick: pop the next item and deliver it.
///
/// Returns false when the run is over and the loop should exit. The item
/// leaves the queue before delivery is attempted, so a failed delivery is
/// counted and dropped rather than retried.
async fn tick(state: &Mutex<EngineState>, messenger: &dyn Messenger, generation: u64) -> bool {
    // Pop under the lock, deliver outside it, so status and stop calls
    // are never blocked on the gateway.
    let item = {
        let mut state = state.lock().await;
        if state.generation != generation || !state.running {
            return false;
        }
        state.last_tick_at = Some(Utc::now());

        match state.queue.pop_front() {
            Some(item) => item,
            None => {
                state.running = false;
                state.generation += 1;
                state.ticker = None;
                info!(sent = state.sent, failed = state.failed, "Broadcast queue drained");
                return false;
            }
        }
    };

    let outcome = deliver(messenger, &item).await;

    let mut state = state.lock().await;
    if state.generation != generation {
        // Stopped while the delivery was in flight.
        return false;
    }
    match outcome {
        Ok(()) => {
            state.sent += 1;
            info!(
                recipient = %item.recipient,
                card = card_label(&item.card),
                campaign = %item.campaign_title,
                remaining = state.queue.len(),
                "Delivered"
            );
        }
        Err(e) => {
            state.failed += 1;
            warn!(
                recipient = %item.recipient,
                card = card_label(&item.card),
                error = %e,
                "Delivery failed, continuing with the rest of the queue"
            );
        }
    }
    true
}

/// Compose and hand one item to the messaging client.
async fn deliver(messenger: &dyn Messenger, item: &QueueItem) -> Result<(), ClientError> {
    let caption = composer::compose_caption(&item.card);

    match composer::normalize_image(&item.card) {
        Some(image) => {
            let caption = if caption.is_empty() {
                None
            } else {
                Some(caption.as_str())
            };
            messenger
                .send_image(&item.recipient, &image.payload, &image.filename, caption)
                .await
        }
        None => {
            let text = if caption.is_empty() {
                EMPTY_CAPTION_FALLBACK
            } else {
                caption.as_str()
            };
            messenger.send_text(&item.recipient, text).await
        }
    }
}

fn card_label(card: &Card) -> &str {
    if card.name.is_empty() {
        "(unnamed)"
    } else {
        &card.name
    }
}
