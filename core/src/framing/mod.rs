pub mod packet;
pub mod reassembler;

pub use packet::{decode_packet, encode_packet, Frame, FRAME_HEADER, METADATA_LEN, PACKET_LEN};
pub use reassembler::{Reassembler, ReassemblerStats};
