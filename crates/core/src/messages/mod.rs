mod message;
mod reply;

pub use message::*;
pub use reply::*;
