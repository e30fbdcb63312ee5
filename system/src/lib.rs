pub extern crate serde;
pub extern crate serde_json;

mod error;
mod handoff;
mod message;
mod replica;
mod store;
mod types;

pub use error::*;
pub use handoff::*;
pub use message::*;
pub use replica::*;
pub use store::*;
pub use types::*;
