pub mod packet_generators;
pub mod peer_host;
