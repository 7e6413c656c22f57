use crate::acoustics::FRAME_SAMPLES;
use crate::prelude::{PipelineError, PipelineResult};
use chrono::{DateTime, Utc};

/// First byte of every packet on the wire.
pub const FRAME_HEADER: u8 = 0xAA;

/// Opaque metadata bytes following the header, forwarded unchanged.
pub const METADATA_LEN: usize = 6;

/// Header + metadata + 1800 big-endian u16 samples + XOR checksum.
pub const PACKET_LEN: usize = 1 + METADATA_LEN + FRAME_SAMPLES * 2 + 1;

/// One validated ping.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic sequence number assigned on reassembly.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub metadata: [u8; METADATA_LEN],
    /// Echo envelope, always exactly [`FRAME_SAMPLES`] values.
    pub samples: Vec<u16>,
}

/// XOR over the packet payload (metadata + sample bytes).
pub fn xor_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc ^ b)
}

fn decode_samples(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// Validates and decodes one whole packet into a frame.
pub fn decode_packet(packet: &[u8], seq: u64) -> PipelineResult<Frame> {
    if packet.len() != PACKET_LEN {
        return Err(PipelineError::InvalidInput(format!(
            "expected a {}-byte packet, got {}",
            PACKET_LEN,
            packet.len()
        )));
    }
    if packet[0] != FRAME_HEADER {
        return Err(PipelineError::InvalidInput(format!(
            "packet does not start with {:#04x}",
            FRAME_HEADER
        )));
    }

    let found = packet[PACKET_LEN - 1];
    let computed = xor_checksum(&packet[1..PACKET_LEN - 1]);
    if computed != found {
        return Err(PipelineError::ChecksumMismatch { computed, found });
    }

    let mut metadata = [0u8; METADATA_LEN];
    metadata.copy_from_slice(&packet[1..1 + METADATA_LEN]);
    Ok(Frame {
        seq,
        timestamp: Utc::now(),
        metadata,
        samples: decode_samples(&packet[1 + METADATA_LEN..PACKET_LEN - 1]),
    })
}

/// Serializes a frame payload into its on-the-wire packet form.
///
/// Used by tests and synthetic envelope generators; the live path only
/// ever decodes.
pub fn encode_packet(metadata: &[u8; METADATA_LEN], samples: &[u16]) -> PipelineResult<Vec<u8>> {
    if samples.len() != FRAME_SAMPLES {
        return Err(PipelineError::InvalidInput(format!(
            "expected {} samples, got {}",
            FRAME_SAMPLES,
            samples.len()
        )));
    }
    let mut packet = Vec::with_capacity(PACKET_LEN);
    packet.push(FRAME_HEADER);
    packet.extend_from_slice(metadata);
    for &sample in samples {
        packet.extend_from_slice(&sample.to_be_bytes());
    }
    let checksum = xor_checksum(&packet[1..]);
    packet.push(checksum);
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_length_matches_wire_contract() {
        assert_eq!(PACKET_LEN, 3608);
    }

    #[test]
    fn encode_rejects_short_envelopes() {
        let err = encode_packet(&[0; METADATA_LEN], &[0u16; 10]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn checksum_over_zero_samples_is_metadata_xor() {
        // 1^2^3^4^5^6 = 7
        let packet = encode_packet(&[1, 2, 3, 4, 5, 6], &[0u16; FRAME_SAMPLES]).unwrap();
        assert_eq!(packet.len(), PACKET_LEN);
        assert_eq!(packet[0], FRAME_HEADER);
        assert_eq!(packet[PACKET_LEN - 1], 7);
    }

    #[test]
    fn packets_round_trip_through_decode() {
        let mut samples = vec![0u16; FRAME_SAMPLES];
        samples[0] = 0x0102;
        samples[1799] = 0xBEEF;
        let packet = encode_packet(&[3, 1, 4, 1, 5, 9], &samples).unwrap();
        let frame = decode_packet(&packet, 7).unwrap();
        assert_eq!(frame.seq, 7);
        assert_eq!(frame.metadata, [3, 1, 4, 1, 5, 9]);
        assert_eq!(frame.samples, samples);
    }

    #[test]
    fn decode_rejects_a_flipped_checksum() {
        let mut packet = encode_packet(&[0; METADATA_LEN], &[0u16; FRAME_SAMPLES]).unwrap();
        packet[PACKET_LEN - 1] ^= 0x01;
        let err = decode_packet(&packet, 0).unwrap_err();
        assert!(matches!(err, PipelineError::ChecksumMismatch { .. }));
    }

    #[test]
    fn decode_rejects_short_packets() {
        let err = decode_packet(&[FRAME_HEADER, 0, 0], 0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }
}
