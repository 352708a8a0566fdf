use std::path::Path;

use tokio::net::TcpStream;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradebot::commands::CommandRouter;
use tradebot::config::Config;
use tradebot::error::Result;
use tradebot::gateway::events::RequestKind;
use tradebot::gateway::Session;
use tradebot::trade::{GiftsOnly, Trader};
use tradebot_common::Request;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (silently skip if missing; env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let stream = TcpStream::connect(&config.server_addr).await?;
    let (reader, writer) = stream.into_split();
    tracing::info!(addr = %config.server_addr, "connected");

    let (session, trade_events) = Session::start(reader, writer);

    session
        .send_request(
            Request::new(RequestKind::SIGN_IN)
                .with("email", config.email.as_str())
                .with("password", config.password.as_str()),
        )
        .await?;
    session.send_request(Request::new(RequestKind::CARD_TYPES)).await?;
    session.send_request(Request::new(RequestKind::GET_FRIENDS)).await?;

    let keepalive = session.keepalive(config.keepalive);
    let trades = Trader::spawn(
        session.clone(),
        trade_events,
        config.room.clone(),
        config.trade_timeout,
        Box::new(GiftsOnly),
    );
    let router = CommandRouter::new(session.clone(), trades, config.clone())
        .spawn()
        .await?;

    session.join_room(&config.room).await?;
    session.join_room(&config.trade_room).await?;
    tracing::info!(room = %config.room, owner = %config.owner, "bot ready");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, shutting down"),
        _ = session.closed() => tracing::warn!("connection closed"),
    }

    session.quit();
    let _ = keepalive.await;
    let _ = router.await;
    Ok(())
}
