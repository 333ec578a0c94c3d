//! Control-plane protocol: wire codec and command dispatch.

pub mod dispatcher;
pub mod message;

pub use dispatcher::{parse_listing, CommandDispatcher};
pub use message::{
    decode, encode, Command, MessageMethod, MessageStatus, MessageType, Response, WireMessage,
};
