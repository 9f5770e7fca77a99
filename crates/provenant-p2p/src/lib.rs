pub mod client;
pub mod discovery;
pub mod registry;

pub use client::PeerClient;
pub use discovery::discover;
pub use registry::{normalize_url, PeerInfo, PeerRegistry};
