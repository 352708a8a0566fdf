//! Trade negotiation: the waiting queue, post-trade bookkeeping, and the
//! task that drives negotiations one partner at a time.

pub mod queue;
pub mod reconcile;
pub mod trader;

pub use queue::{Enqueued, TradeQueue};
pub use reconcile::{reconcile, Reconciliation};
pub use trader::{GiftsOnly, Negotiator, TradeHandle, Trader};
