pub mod connection;
pub mod data_channel;
pub mod fake;
pub mod ice;
pub mod state;
pub mod transport;
pub mod types;

pub use connection::RtcPeer;
pub use fake::FakePeer;
pub use state::PeerSlots;
pub use transport::TransportPeer;
pub use types::{
    LinkChange, MessageHandler, SdpKind, SessionDescriptor, StateHandler, TransportState,
};
