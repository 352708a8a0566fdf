//! FIFO of players waiting to trade. The head is the current partner.

use std::collections::VecDeque;
use std::sync::Arc;

use tradebot_common::Player;

use crate::gateway::Signal;

/// Outcome of a queue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    /// 0-based place in the queue; 0 is the player being traded with.
    pub position: usize,
    /// The player was already waiting and nothing changed.
    pub already_queued: bool,
}

/// Ordered, duplicate-free waiting list.
///
/// Raises the readiness signal exactly when the queue goes from empty to one
/// entry; the trade task waits on that signal while idle.
#[derive(Debug)]
pub struct TradeQueue {
    players: VecDeque<Player>,
    ready: Arc<Signal>,
}

impl TradeQueue {
    pub fn new(ready: Arc<Signal>) -> Self {
        Self {
            players: VecDeque::new(),
            ready,
        }
    }

    pub fn enqueue(&mut self, player: Player) -> Enqueued {
        if let Some(position) = self.position(&player) {
            return Enqueued {
                position,
                already_queued: true,
            };
        }

        self.players.push_back(player);
        if self.players.len() == 1 {
            self.ready.raise();
        }
        Enqueued {
            position: self.players.len() - 1,
            already_queued: false,
        }
    }

    pub fn position(&self, player: &Player) -> Option<usize> {
        self.players.iter().position(|p| p == player)
    }

    pub fn head(&self) -> Option<&Player> {
        self.players.front()
    }

    /// Drop the current partner; the next player (if any) becomes head.
    pub fn finish_head(&mut self) -> Option<Player> {
        self.players.pop_front()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    /// The "now trading" line: `Now trading with [A].` or
    /// `Now trading with [A] < B < C` where `<` reads "waiting behind".
    pub fn announcement(&self) -> Option<String> {
        let (head, waiting) = (self.players.front()?, self.players.range(1..));
        let waiting: Vec<&str> = waiting.map(Player::as_str).collect();
        if waiting.is_empty() {
            Some(format!("Now trading with [{head}]."))
        } else {
            Some(format!("Now trading with [{head}] < {}", waiting.join(" < ")))
        }
    }
}
