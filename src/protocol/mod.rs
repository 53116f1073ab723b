pub mod checksum;
pub mod packets;

pub use checksum::Framer;
pub use packets::PacketBuilder;
