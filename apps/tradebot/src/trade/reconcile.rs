//! Post-trade bookkeeping: what did we gain for the first time, and what did
//! we just run out of.

use tradebot_common::Card;

use crate::gateway::TradeStatus;
use crate::inventory::Stock;
use crate::text::andify;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Cards we held none of before the trade and received in it.
    pub acquired: Vec<Card>,
    /// Cards the trade took our last copy of.
    pub lost: Vec<Card>,
}

impl Reconciliation {
    /// At most two chat lines describing the changes.
    pub fn announcements(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.acquired.is_empty() {
            lines.push(format!("I've just acquired {}.", andify(&self.acquired)));
        }
        if !self.lost.is_empty() {
            lines.push(format!("I've just sold my last {}.", andify(&self.lost)));
        }
        lines
    }
}

/// Apply a finished trade to the stock snapshot taken just before it closed.
///
/// Counts in `stock` are updated in place; persisting them is up to the
/// caller.
pub fn reconcile(stock: &mut Stock, status: &TradeStatus) -> Reconciliation {
    let mut result = Reconciliation::default();

    for (card, &received) in &status.their.cards {
        if received == 0 {
            continue;
        }
        let count = stock.entry(card.clone()).or_insert(0);
        if *count == 0 {
            result.acquired.push(card.clone());
        }
        *count += received;
    }

    for (card, &given) in &status.my.cards {
        if given == 0 {
            continue;
        }
        let count = stock.entry(card.clone()).or_insert(0);
        if *count <= given {
            result.lost.push(card.clone());
        }
        *count = count.saturating_sub(given);
    }

    result
}
