//! Services shared by handlers

pub mod peer;

pub use peer::PeerClient;
