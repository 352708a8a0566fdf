pub mod id;
pub mod request;

pub use id::{Card, CardId, Channel, Player};
pub use request::Request;
