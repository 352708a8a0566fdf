//! The trade task: owns the queue and drives one negotiation at a time.
//!
//! Idle until the readiness signal fires, then invites the head of the queue
//! and follows trade events until the trade completes, is cancelled, is
//! rejected, or runs out of time. The head is then removed and the next
//! player, if any, is invited straight away.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tradebot_common::{Channel, Player, Request};

use crate::error::{BotError, Result};
use crate::gateway::events::RequestKind;
use crate::gateway::{Session, Signal, TradeEvent, TradeStatus};
use crate::inventory::Inventory;

use super::queue::{Enqueued, TradeQueue};
use super::reconcile::reconcile;

/// Capacity of the command channel into the trade task.
const COMMAND_CAPACITY: usize = 16;

/// Decides whether the bot should accept the offer on the table.
pub trait Negotiator: Send + Sync {
    fn should_accept(&self, status: &TradeStatus, inventory: &Inventory) -> bool;
}

/// Accepts only trades where the bot gives nothing away.
#[derive(Debug, Default)]
pub struct GiftsOnly;

impl Negotiator for GiftsOnly {
    fn should_accept(&self, status: &TradeStatus, _inventory: &Inventory) -> bool {
        status.my.is_empty() && !status.their.is_empty()
    }
}

#[derive(Debug)]
enum TradeCommand {
    Enqueue {
        player: Player,
        reply: oneshot::Sender<Enqueued>,
    },
}

/// Handle used by the command layer to queue players.
#[derive(Debug, Clone)]
pub struct TradeHandle {
    tx: mpsc::Sender<TradeCommand>,
}

impl TradeHandle {
    /// Queue a player, returning their position (or their existing one).
    pub async fn enqueue(&self, player: Player) -> Result<Enqueued> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TradeCommand::Enqueue { player, reply })
            .await
            .map_err(|_| BotError::SessionClosed)?;
        rx.await.map_err(|_| BotError::SessionClosed)
    }
}

/// The negotiation currently in progress.
#[derive(Debug)]
struct Negotiation {
    partner: Player,
    /// Set once the partner accepts the invite.
    started: bool,
    status: Option<TradeStatus>,
    deadline: Instant,
}

pub struct Trader {
    session: Session,
    queue: TradeQueue,
    ready: Arc<Signal>,
    commands: mpsc::Receiver<TradeCommand>,
    events: mpsc::Receiver<TradeEvent>,
    room: Channel,
    timeout: Duration,
    negotiator: Box<dyn Negotiator>,
    active: Option<Negotiation>,
}

impl Trader {
    /// Spawn the trade task and return the handle for queueing players.
    pub fn spawn(
        session: Session,
        events: mpsc::Receiver<TradeEvent>,
        room: Channel,
        timeout: Duration,
        negotiator: Box<dyn Negotiator>,
    ) -> TradeHandle {
        let (tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let ready = Arc::new(Signal::new());
        let trader = Self {
            session,
            queue: TradeQueue::new(Arc::clone(&ready)),
            ready,
            commands,
            events,
            room,
            timeout,
            negotiator,
            active: None,
        };
        tokio::spawn(trader.run());
        TradeHandle { tx }
    }

    async fn run(mut self) {
        let quit = self.session.quit_signal();

        loop {
            let deadline = self.active.as_ref().map(|n| n.deadline);
            let timer = sleep_until(deadline.unwrap_or_else(|| Instant::now() + self.timeout));

            tokio::select! {
                _ = quit.wait() => break,

                cmd = self.commands.recv() => match cmd {
                    Some(TradeCommand::Enqueue { player, reply }) => {
                        let enqueued = self.queue.enqueue(player.clone());
                        tracing::info!(%player, position = enqueued.position, "trade queue request");
                        let _ = reply.send(enqueued);
                    }
                    None => break,
                },

                _ = self.ready.wait(), if self.active.is_none() => self.advance().await,

                event = self.events.recv() => match event {
                    Some(event) => self.on_event(event).await,
                    None => break,
                },

                _ = timer, if deadline.is_some() => {
                    if let Some(n) = &self.active {
                        tracing::warn!(partner = %n.partner, "trade timed out");
                    }
                    self.send(Request::new(RequestKind::TRADE_CANCEL)).await;
                    self.finish().await;
                }
            }
        }

        tracing::debug!(waiting = self.queue.len(), "trade task exited");
    }

    /// Start negotiating with the head of the queue, skipping players we
    /// cannot invite.
    async fn advance(&mut self) {
        while self.active.is_none() {
            let Some(partner) = self.queue.head().cloned() else {
                return;
            };

            if let Some(line) = self.queue.announcement() {
                self.say(&line).await;
            }

            let inventory = self.session.inventory();
            match inventory.player_ids.get(&partner) {
                Some(profile_id) => {
                    tracing::info!(%partner, "inviting to trade");
                    self.send(Request::new(RequestKind::TRADE_INVITE).with("profile", profile_id.as_str()))
                        .await;
                    self.active = Some(Negotiation {
                        partner,
                        started: false,
                        status: None,
                        deadline: Instant::now() + self.timeout,
                    });
                }
                None => {
                    tracing::warn!(%partner, "no profile id for player, skipping");
                    self.queue.finish_head();
                }
            }
        }
    }

    async fn on_event(&mut self, event: TradeEvent) {
        let Some(negotiation) = self.active.as_mut() else {
            tracing::debug!(?event, "trade event with no active negotiation");
            return;
        };

        // Late events from an earlier negotiation must not end this one.
        match event.partner() {
            Some(partner) if partner != &negotiation.partner => {
                tracing::debug!(?event, current = %negotiation.partner, "ignoring trade event for another partner");
                return;
            }
            None if negotiation.started => {
                tracing::debug!(?event, "ignoring invite failure for an open trade");
                return;
            }
            _ => {}
        }

        match event {
            TradeEvent::Started { partner } => {
                tracing::info!(%partner, "trade session opened");
                negotiation.started = true;
            }
            TradeEvent::Updated { status, .. } => {
                let inventory = self.session.inventory();
                let accept = !status.my.accepted && self.negotiator.should_accept(&status, &inventory);
                negotiation.status = Some(status);
                if accept {
                    self.send(Request::new(RequestKind::TRADE_ACCEPT_BARGAIN)).await;
                }
            }
            TradeEvent::Completed { partner } => {
                let status = negotiation.status.take().unwrap_or_default();
                tracing::info!(%partner, "trade completed");
                self.settle(&status).await;
                self.finish().await;
            }
            TradeEvent::Cancelled { partner } => {
                tracing::info!(%partner, "trade cancelled");
                self.finish().await;
            }
            TradeEvent::Rejected { partner } => {
                tracing::info!(%partner, "trade invite rejected");
                self.finish().await;
            }
            TradeEvent::InviteFailed => {
                tracing::info!(partner = %negotiation.partner, "trade invite failed");
                self.finish().await;
            }
        }
    }

    /// Announce and persist what the finished trade changed in our stock.
    async fn settle(&self, status: &TradeStatus) {
        let inventory = self.session.inventory();
        let bot = inventory.bot.clone();
        let mut stock = inventory.stock_of(&bot);

        let result = reconcile(&mut stock, status);
        for line in result.announcements() {
            self.say(&line).await;
        }

        if let Err(e) = self.session.store_stock(bot, stock).await {
            tracing::warn!(%e, "could not store post-trade stock");
        }
        self.send(Request::new(RequestKind::LIBRARY_VIEW)).await;
    }

    /// Drop the current partner and move on to the next one.
    async fn finish(&mut self) {
        self.active = None;
        self.queue.finish_head();
        self.advance().await;
    }

    async fn say(&self, text: &str) {
        if let Err(e) = self.session.say(&self.room, text).await {
            tracing::warn!(%e, "could not send chat line");
        }
    }

    async fn send(&self, request: Request) {
        if let Err(e) = self.session.send_request(request).await {
            tracing::warn!(%e, "could not send trade request");
        }
    }
}
