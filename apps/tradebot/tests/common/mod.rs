#![allow(dead_code)]

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::time;

use tradebot::gateway::{Session, TradeEvent};

/// Other end of the connection handed to a [`Session`]: reads the bot's
/// requests and writes server frames.
pub struct FakeServer {
    requests: Lines<BufReader<ReadHalf<DuplexStream>>>,
    frames: WriteHalf<DuplexStream>,
}

/// Helper: start a session over an in-memory pipe.
/// Returns (session, trade events, server end).
pub fn connect() -> (Session, mpsc::Receiver<TradeEvent>, FakeServer) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client);
    let (server_read, server_write) = tokio::io::split(server);

    let (session, trade_events) = Session::start(client_read, client_write);
    let server = FakeServer {
        requests: BufReader::new(server_read).lines(),
        frames: server_write,
    };
    (session, trade_events, server)
}

/// Helper: like [`connect`], with the initial `JoinLobby` already consumed.
pub async fn connect_in_lobby() -> (Session, mpsc::Receiver<TradeEvent>, FakeServer) {
    let (session, events, mut server) = connect();
    server.expect("JoinLobby").await;
    (session, events, server)
}

/// Helper: wait until every control message sent so far has been handled.
pub async fn settle(session: &Session) {
    let listener = session.listen().await.expect("session is running");
    session.shut(&listener).await;
}

impl FakeServer {
    /// Next request within `within`, as JSON.
    pub async fn next_request_within(&mut self, within: Duration) -> Value {
        let line = time::timeout(within, self.requests.next_line())
            .await
            .expect("timed out waiting for a request")
            .expect("read request")
            .expect("connection closed");
        serde_json::from_str(&line).expect("request is json")
    }

    pub async fn next_request(&mut self) -> Value {
        self.next_request_within(Duration::from_secs(1)).await
    }

    /// Read the next request and check its `msg` tag.
    pub async fn expect(&mut self, op: &str) -> Value {
        let request = self.next_request().await;
        assert_eq!(request["msg"], op, "unexpected request {request}");
        request
    }

    /// True if no request arrives within `within`.
    pub async fn is_quiet_for(&mut self, within: Duration) -> bool {
        time::timeout(within, self.requests.next_line()).await.is_err()
    }

    pub async fn send(&mut self, frame: Value) {
        self.send_raw(&frame.to_string()).await;
    }

    pub async fn send_raw(&mut self, line: &str) {
        self.send_bytes(line.as_bytes()).await;
    }

    /// Helper: write one newline-terminated frame of arbitrary bytes.
    pub async fn send_bytes(&mut self, line: &[u8]) {
        self.frames.write_all(line).await.expect("write frame");
        self.frames.write_all(b"\n").await.expect("write newline");
        self.frames.flush().await.expect("flush");
    }

    /// Sign the bot in as `name` and wait for the library request that
    /// follows, so the profile is known once this returns.
    pub async fn sign_in(&mut self, name: &str, id: &str) {
        self.send(serde_json::json!({
            "msg": "ProfileInfo",
            "profile": { "id": id, "name": name },
        }))
        .await;
        self.expect("LibraryView").await;
    }
}

/// Helper: a signed-in bot called `Bot` that knows cards A, B, and C, owns
/// one tradable A, and has `alice` and `bob` as friends.
pub async fn prepare_bot(session: &Session, server: &mut FakeServer) {
    server
        .send(serde_json::json!({
            "msg": "CardTypes",
            "cardTypes": [
                { "id": 1, "name": "A", "rarity": 0 },
                { "id": 2, "name": "B", "rarity": 1 },
                { "id": 3, "name": "C", "rarity": 2 },
            ],
        }))
        .await;
    server.sign_in("Bot", "bot-1").await;
    server
        .send(serde_json::json!({
            "msg": "LibraryView",
            "profileId": "bot-1",
            "cards": [{ "id": 10, "typeId": 1, "tradable": true }],
        }))
        .await;
    server
        .send(serde_json::json!({
            "msg": "GetFriends",
            "friends": [
                { "profile": { "id": "a-1", "name": "alice" } },
                { "profile": { "id": "b-1", "name": "bob" } },
            ],
        }))
        .await;

    // Frames are applied in order; seeing this whisper means all of the
    // above has landed in the inventory.
    let mut listener = session.listen().await.expect("session is running");
    server
        .send(serde_json::json!({ "msg": "Whisper", "from": "sync", "text": "sync" }))
        .await;
    while listener.recv().await.expect("session is running").from.as_str() != "sync" {}
    session.shut(&listener).await;
}
