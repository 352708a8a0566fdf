//! The dispatcher: a single task that owns the listener registry and the
//! inventory cache, and serializes every mutation of either.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tradebot_common::{Player, Request};

use crate::inventory::{Inventory, Stock};

use super::events::{Message, TradeEvent};
use super::fanout::deliver;
use super::registry::{Listener, ListenerId, ListenerRegistry};
use super::signal::Quit;
use super::transport::RequestSender;

/// Capacity of the control channel into the dispatcher.
pub const CONTROL_CAPACITY: usize = 16;

/// Requests serviced by the dispatcher loop, in arrival order.
#[derive(Debug)]
pub(crate) enum Control {
    Add(oneshot::Sender<Listener>),
    Remove(ListenerId),
    Deliver(Message),
    StoreStock { player: Player, stock: Stock },
}

pub(crate) struct Dispatcher {
    pub(crate) registry: ListenerRegistry,
    pub(crate) inventory: Arc<Inventory>,
    snapshots: watch::Sender<Arc<Inventory>>,
    pub(crate) requests: RequestSender,
    trade_events: mpsc::Sender<TradeEvent>,
}

impl Dispatcher {
    pub(crate) fn new(
        requests: RequestSender,
        trade_events: mpsc::Sender<TradeEvent>,
    ) -> (Self, watch::Receiver<Arc<Inventory>>) {
        let inventory = Arc::new(Inventory::new());
        let (snapshots, snapshot_rx) = watch::channel(Arc::clone(&inventory));
        let dispatcher = Self {
            registry: ListenerRegistry::new(),
            inventory,
            snapshots,
            requests,
            trade_events,
        };
        (dispatcher, snapshot_rx)
    }

    /// Main loop. Exits on quit, when the frame source ends, or when a frame
    /// reports a fatal failure; the last two also trigger quit for everyone
    /// else. Messages not yet delivered at that point are lost.
    pub(crate) async fn run(
        mut self,
        mut control: mpsc::Receiver<Control>,
        mut frames: mpsc::Receiver<String>,
        quit: Quit,
    ) {
        tracing::debug!("dispatcher started");

        loop {
            tokio::select! {
                biased;

                _ = quit.wait() => break,

                Some(ctl) = control.recv() => self.handle_control(ctl).await,

                frame = frames.recv() => {
                    let Some(frame) = frame else {
                        tracing::info!("frame source closed, stopping session");
                        quit.trigger();
                        break;
                    };
                    if let Err(e) = self.apply_reply(&frame).await {
                        tracing::error!(%e, "stopping session");
                        quit.trigger();
                        break;
                    }
                }
            }
        }

        tracing::debug!(listeners = self.registry.len(), "dispatcher exited");
    }

    async fn handle_control(&mut self, ctl: Control) {
        match ctl {
            Control::Add(reply) => {
                let listener = self.registry.add();
                let id = listener.id();
                if reply.send(listener).is_err() {
                    // Caller went away before we answered.
                    self.registry.remove(id);
                }
            }
            Control::Remove(id) => {
                self.registry.remove(id);
            }
            Control::Deliver(message) => {
                self.deliver(message).await;
            }
            Control::StoreStock { player, stock } => {
                self.update_inventory(|inventory| {
                    inventory.stocks.insert(player, stock);
                });
            }
        }
    }

    pub(crate) async fn deliver(&mut self, message: Message) {
        deliver(&mut self.registry, &message).await;
    }

    /// Mutate the cache and publish the new snapshot. Readers holding the
    /// previous snapshot keep it untouched.
    pub(crate) fn update_inventory(&mut self, f: impl FnOnce(&mut Inventory)) {
        f(Arc::make_mut(&mut self.inventory));
        self.snapshots.send_replace(Arc::clone(&self.inventory));
    }

    pub(crate) async fn send_request(&self, request: Request) {
        if let Err(e) = self.requests.send(request).await {
            tracing::warn!(%e, "dropping request, writer is gone");
        }
    }

    pub(crate) async fn emit_trade_event(&self, event: TradeEvent) {
        if self.trade_events.send(event).await.is_err() {
            tracing::debug!("no trade task is listening");
        }
    }
}
