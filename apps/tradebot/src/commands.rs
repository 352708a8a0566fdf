//! Chat command handling: turns chat and whisper lines into queue requests
//! and replies.

use tokio::task::JoinHandle;
use tradebot_common::Channel;

use crate::config::Config;
use crate::error::Result;
use crate::gateway::{Listener, Message, Session};
use crate::text::andify;
use crate::trade::TradeHandle;

pub const HELP: &str = "You can queue up for a trade with '!trade', check what I'm '!missing' \
    and see my '!stock'. \
    Every command works in whisper too, even without the ! in front.";

/// Split a chat line into a lowercased `(command, args)` pair.
///
/// Whispers are always addressed to the bot, so a missing `!` is added
/// there; room chat only counts as a command when it starts with one.
pub fn parse_command(text: &str, whisper: bool) -> (String, String) {
    let text = text.trim().to_lowercase();
    let (command, args) = match text.split_once(' ') {
        Some((command, args)) => (command.trim(), args.trim()),
        None => (text.as_str(), ""),
    };

    let command = if whisper && !command.starts_with('!') {
        format!("!{command}")
    } else {
        command.to_string()
    };
    (command, args.to_string())
}

/// Reads every chat line and answers the ones that are commands.
pub struct CommandRouter {
    session: Session,
    trades: TradeHandle,
    config: Config,
}

impl CommandRouter {
    pub fn new(session: Session, trades: TradeHandle, config: Config) -> Self {
        Self {
            session,
            trades,
            config,
        }
    }

    /// Register a listener and handle messages on a background task until
    /// the session stops.
    pub async fn spawn(self) -> Result<JoinHandle<()>> {
        let listener = self.session.listen().await?;
        Ok(tokio::spawn(self.run(listener)))
    }

    async fn run(self, mut listener: Listener) {
        let quit = self.session.quit_signal();
        loop {
            tokio::select! {
                _ = quit.wait() => break,
                message = listener.recv() => match message {
                    Some(message) => {
                        if let Err(e) = self.handle(&message).await {
                            tracing::warn!(%e, from = %message.from, "command failed");
                        }
                    }
                    None => break,
                },
            }
        }
        self.session.shut(&listener).await;
    }

    fn is_trade_room(&self, channel: &Channel) -> bool {
        match channel {
            Channel::Room(name) => name.starts_with("trading-") || channel == &self.config.trade_room,
            Channel::Whisper => false,
        }
    }

    /// Act on one message. Lines that are not commands are ignored.
    pub async fn handle(&self, message: &Message) -> Result<()> {
        if self.is_trade_room(&message.channel) {
            return Ok(());
        }
        if message.from == self.session.inventory().bot {
            return Ok(());
        }

        let (command, args) = parse_command(&message.text, message.channel.is_whisper());
        let from_owner = message.from == self.config.owner;

        let reply = match command.as_str() {
            "!help" => Some(HELP.to_string()),
            "!missing" => Some(self.missing()),
            "!stock" => Some(self.stock()),
            "!trade" | "!queue" => self.queue(message).await?,
            "!say" if from_owner && !args.is_empty() => {
                self.session.say(&self.config.room, &args).await?;
                None
            }
            "!saytrading" if from_owner && !args.is_empty() => {
                self.session.say(&self.config.trade_room, &args).await?;
                None
            }
            _ => None,
        };

        match reply {
            Some(reply) => self.reply(message, &reply).await,
            None => Ok(()),
        }
    }

    fn missing(&self) -> String {
        let inventory = self.session.inventory();
        let missing = inventory.missing_cards(&inventory.bot);
        if missing.is_empty() {
            "I have at least one copy of every card right now.".to_string()
        } else {
            format!(
                "I currently don't have {}. I'm paying extra for that!",
                andify(&missing)
            )
        }
    }

    fn stock(&self) -> String {
        let inventory = self.session.inventory();
        let holdings = inventory.holdings(&inventory.bot);
        format!(
            "I have {} commons, {} uncommons and {} rares. That's {}% of all card types, as well as {} gold.",
            holdings.commons,
            holdings.uncommons,
            holdings.rares,
            holdings.catalog_percent(),
            inventory.gold,
        )
    }

    async fn queue(&self, message: &Message) -> Result<Option<String>> {
        let enqueued = self.trades.enqueue(message.from.clone()).await?;
        let position = enqueued.position;

        if enqueued.already_queued {
            return Ok(Some(format!(
                "You are already queued for trading. Your position in the queue is {position}."
            )));
        }
        // Position 0 starts trading right away; the announcement covers it.
        if position == 0 {
            return Ok(None);
        }

        let prefix = if message.channel.is_whisper() {
            String::new()
        } else {
            format!("{}: ", message.from)
        };
        Ok(Some(format!(
            "{prefix}You are now queued for trading. Your position in the queue is {position}."
        )))
    }

    async fn reply(&self, message: &Message, text: &str) -> Result<()> {
        match &message.channel {
            Channel::Whisper => self.session.whisper(&message.from, text).await,
            room => self.session.say(room, text).await,
        }
    }
}
