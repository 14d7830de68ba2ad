pub mod error;
pub mod manager;
pub mod transport;
pub mod ws;

pub use error::NetError;
pub use manager::{
    spawn_connection, ConnectionCommand, ConnectionEvent, ConnectionHandle,
};
pub use transport::{ChannelConnection, ChannelTransport, TokenBroker};
pub use ws::WsTransport;
