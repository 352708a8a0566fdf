use std::time::Duration;

use tradebot_common::{Channel, Player};

/// Bot configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Game server address (`host:port`).
    pub server_addr: String,
    /// Account credentials sent with `SignIn`.
    pub email: String,
    pub password: String,
    /// Player allowed to use the owner-only relay commands.
    pub owner: Player,
    /// Public room the bot lives in and announces trades to.
    pub room: Channel,
    /// Room where trade sessions happen; chat there is never treated as commands.
    pub trade_room: Channel,
    /// Interval between keepalive pings.
    pub keepalive: Duration,
    /// How long a single negotiation may run before it is abandoned.
    pub trade_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            server_addr: required_var("SERVER_ADDR"),
            email: required_var("BOT_EMAIL"),
            password: required_var("BOT_PASSWORD"),
            owner: Player(required_var("BOT_OWNER")),
            room: Channel::room(optional_var("BOT_ROOM").unwrap_or_else(|| "clockwork".to_string())),
            trade_room: Channel::room(
                optional_var("TRADE_ROOM").unwrap_or_else(|| "trading-1".to_string()),
            ),
            keepalive: Duration::from_secs(secs_var("KEEPALIVE_SECS", 30)),
            trade_timeout: Duration::from_secs(secs_var("TRADE_TIMEOUT_SECS", 120)),
        }
    }

    /// A configuration with defaults for everything but identity. Handy for tests.
    pub fn for_owner(owner: &str) -> Self {
        Self {
            server_addr: "127.0.0.1:8081".to_string(),
            email: String::new(),
            password: String::new(),
            owner: Player::from(owner),
            room: Channel::room("clockwork"),
            trade_room: Channel::room("trading-1"),
            keepalive: Duration::from_secs(30),
            trade_timeout: Duration::from_secs(120),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn secs_var(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
