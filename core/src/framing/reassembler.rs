use crate::framing::packet::{decode_packet, Frame, FRAME_HEADER, PACKET_LEN};
use crate::telemetry::WarnLimiter;
use log::debug;
use std::time::Duration;

const CHECKSUM_WARN_WINDOW: Duration = Duration::from_secs(10);

/// Lifetime counters, exposed for logging and supervision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblerStats {
    pub frames: u64,
    pub checksum_failures: u64,
    pub bytes_discarded: u64,
}

/// Recovers validated frames from an unsynchronized serial byte stream.
///
/// The reassembler is the sole owner of its byte buffer; callers hand over
/// chunks and never retain a reference. Exclusive access (`&mut self`)
/// serializes concurrent readers by construction.
pub struct Reassembler {
    buffer: Vec<u8>,
    next_seq: u64,
    stats: ReassemblerStats,
    checksum_warner: WarnLimiter,
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(PACKET_LEN * 2),
            next_seq: 0,
            stats: ReassemblerStats::default(),
            checksum_warner: WarnLimiter::new(CHECKSUM_WARN_WINDOW),
        }
    }

    pub fn stats(&self) -> ReassemblerStats {
        self.stats
    }

    /// Appends a chunk and drains every frame that can be validated.
    ///
    /// Malformed input never blocks progress: an invalid checksum discards
    /// exactly the header byte and the hunt resumes, so a real frame
    /// starting inside a corrupted window is still recovered.
    pub fn extend(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            // Hunt for the next header, discarding any prefix.
            match self.buffer.iter().position(|&b| b == FRAME_HEADER) {
                None => {
                    self.stats.bytes_discarded += self.buffer.len() as u64;
                    self.buffer.clear();
                    break;
                }
                Some(0) => {}
                Some(offset) => {
                    self.stats.bytes_discarded += offset as u64;
                    self.buffer.drain(..offset);
                }
            }

            if self.buffer.len() < PACKET_LEN {
                break;
            }

            match decode_packet(&self.buffer[..PACKET_LEN], self.next_seq) {
                Ok(frame) => {
                    self.buffer.drain(..PACKET_LEN);
                    self.next_seq += 1;
                    self.stats.frames += 1;
                    debug!("frame {} reassembled", frame.seq);
                    frames.push(frame);
                }
                Err(err) => {
                    self.stats.checksum_failures += 1;
                    self.stats.bytes_discarded += 1;
                    self.checksum_warner
                        .warn(&format!("dropping sonar packet: {}", err));
                    self.buffer.drain(..1);
                }
            }
        }

        frames
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}
