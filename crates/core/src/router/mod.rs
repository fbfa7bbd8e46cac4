//! Cross-context delivery: typed events and request/response between the
//! Background, Content and Panel contexts.

pub mod bus;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod retry;
pub mod topology;

pub use bus::*;
pub use endpoint::*;
pub use envelope::*;
pub use error::*;
pub use retry::*;
pub use topology::*;
