//! Input side: transport, venue codecs and book reconstruction

pub mod book;
pub mod components;
pub mod connection;
pub mod source;
pub mod venues;

pub use book::{BookState, LevelUpdate, UpdateGroup, WorkingBook};
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, DisconnectReason};
pub use source::{FrameSource, WebSocketSource};
pub use venues::{codec, DecodedFrame, VenueCodec};
