//! The connection session handle: the only entry point other components use
//! to talk to the server.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tradebot_common::{Channel, Player, Request};

use crate::error::{BotError, Result};
use crate::inventory::{Inventory, Stock};

use super::actor::{Control, Dispatcher, CONTROL_CAPACITY};
use super::events::{Message, RequestKind, TradeEvent};
use super::registry::Listener;
use super::signal::Quit;
use super::transport::{request_channel, run_reader, run_writer, RequestSender, FRAME_CAPACITY};

/// Upper bound on waiting for a room join to be confirmed.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the trade event channel handed to the trade task.
const TRADE_EVENT_CAPACITY: usize = 16;

/// Cheap, cloneable handle to the single connection session.
#[derive(Clone)]
pub struct Session {
    requests: RequestSender,
    control: mpsc::Sender<Control>,
    inventory: watch::Receiver<Arc<Inventory>>,
    quit: Quit,
}

impl Session {
    /// Spawn the dispatcher, reader, and writer tasks over a connection and
    /// return the handle plus the stream of trade events.
    ///
    /// `JoinLobby` is queued before anything else.
    pub fn start<R, W>(reader: R, writer: W) -> (Self, mpsc::Receiver<TradeEvent>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let quit = Quit::new();
        let (requests, request_rx) = request_channel();
        let (control, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CAPACITY);
        let (trade_tx, trade_rx) = mpsc::channel(TRADE_EVENT_CAPACITY);

        // The queue was just created, so this always has room.
        let _ = requests.try_send(Request::new(RequestKind::JOIN_LOBBY));

        let (dispatcher, inventory) = Dispatcher::new(requests.clone(), trade_tx);
        tokio::spawn(dispatcher.run(control_rx, frame_rx, quit.clone()));

        let reader_quit = quit.clone();
        tokio::spawn(async move {
            if let Err(e) = run_reader(reader, frame_tx, reader_quit).await {
                tracing::warn!(%e, "reader stopped");
            }
        });

        let writer_quit = quit.clone();
        tokio::spawn(async move {
            if let Err(e) = run_writer(writer, request_rx, writer_quit).await {
                tracing::warn!(%e, "writer stopped");
            }
        });

        let session = Self {
            requests,
            control,
            inventory,
            quit,
        };
        (session, trade_rx)
    }

    /// Queue a request for the connection. Waits while the outbound queue is
    /// full.
    pub async fn send_request(&self, request: Request) -> Result<()> {
        self.requests.send(request).await
    }

    /// Register a new listener that receives every subsequent chat and
    /// whisper message.
    pub async fn listen(&self) -> Result<Listener> {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control::Add(tx))
            .await
            .map_err(|_| BotError::SessionClosed)?;
        rx.await.map_err(|_| BotError::SessionClosed)
    }

    /// Deregister a listener. Safe to call more than once, or after the
    /// session has stopped.
    pub async fn shut(&self, listener: &Listener) {
        let _ = self.control.send(Control::Remove(listener.id())).await;
    }

    /// Inject a message into the fanout as if it had arrived from the server.
    pub async fn deliver(&self, message: Message) -> Result<()> {
        self.control
            .send(Control::Deliver(message))
            .await
            .map_err(|_| BotError::SessionClosed)
    }

    /// Wait for the first message matching `predicate`, giving up after
    /// `timeout`. Only messages arriving after the call are considered.
    pub async fn wait_for<F>(&self, timeout: Duration, predicate: F) -> Result<Option<Message>>
    where
        F: FnMut(&Message) -> bool,
    {
        let mut listener = self.listen().await?;
        let found = wait_on(&mut listener, timeout, predicate).await;
        self.shut(&listener).await;
        Ok(found)
    }

    /// Enter a room and wait until the server shows activity in it, or
    /// [`JOIN_TIMEOUT`] passes. Either way the caller carries on.
    pub async fn join_room(&self, room: &Channel) -> Result<()> {
        // Listen before asking, so an immediate echo is not missed.
        let mut listener = self.listen().await?;
        let sent = self
            .send_request(Request::new(RequestKind::ROOM_ENTER).with("roomName", room.as_str()))
            .await;
        if sent.is_ok() {
            let confirmed = wait_on(&mut listener, JOIN_TIMEOUT, |m| &m.channel == room)
                .await
                .is_some();
            tracing::debug!(%room, confirmed, "room join finished");
        }
        self.shut(&listener).await;
        sent
    }

    /// Leave a room without waiting for confirmation.
    pub async fn leave_room(&self, room: &Channel) -> Result<()> {
        self.send_request(Request::new(RequestKind::ROOM_EXIT).with("roomName", room.as_str()))
            .await
    }

    pub async fn say(&self, room: &Channel, text: &str) -> Result<()> {
        self.send_request(
            Request::new(RequestKind::ROOM_CHAT_MESSAGE)
                .with("text", text)
                .with("roomName", room.as_str()),
        )
        .await
    }

    pub async fn whisper(&self, player: &Player, text: &str) -> Result<()> {
        self.send_request(
            Request::new(RequestKind::WHISPER)
                .with("text", text)
                .with("toProfileName", player.as_str()),
        )
        .await
    }

    /// The latest inventory snapshot. It never changes after it is returned.
    pub fn inventory(&self) -> Arc<Inventory> {
        self.inventory.borrow().clone()
    }

    /// Replace a player's stock in the cache, e.g. after a trade settles.
    pub async fn store_stock(&self, player: Player, stock: Stock) -> Result<()> {
        self.control
            .send(Control::StoreStock { player, stock })
            .await
            .map_err(|_| BotError::SessionClosed)
    }

    /// Ping the server every `every` until the session stops.
    pub fn keepalive(&self, every: Duration) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.tick().await; // First tick fires immediately; skip it.
            loop {
                tokio::select! {
                    _ = session.quit.wait() => break,
                    _ = ticker.tick() => {
                        if session.send_request(Request::new(RequestKind::PING)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }

    pub fn quit_signal(&self) -> Quit {
        self.quit.clone()
    }

    /// Ask every session task to stop.
    pub fn quit(&self) {
        self.quit.trigger();
    }

    pub fn is_closed(&self) -> bool {
        self.quit.is_triggered()
    }

    /// Resolves once the session has been told to stop, for any reason.
    pub async fn closed(&self) {
        self.quit.wait().await;
    }
}

/// Read `listener` until a message matches or `timeout` passes.
async fn wait_on<F>(listener: &mut Listener, timeout: Duration, mut predicate: F) -> Option<Message>
where
    F: FnMut(&Message) -> bool,
{
    let search = async {
        while let Some(message) = listener.recv().await {
            if predicate(&message) {
                return Some(message);
            }
        }
        None
    };
    time::timeout(timeout, search).await.ok().flatten()
}
