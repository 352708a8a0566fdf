//! Connection to the game server: one duplex stream turned into request
//! dispatch, chat fanout, and trade event routing.

mod actor;
pub mod events;
pub mod fanout;
mod handler;
pub mod registry;
pub mod session;
pub mod signal;
pub mod transport;

pub use events::{Message, TradeEvent, TradeOffer, TradeStatus};
pub use registry::Listener;
pub use session::Session;
pub use signal::{Quit, Signal};
