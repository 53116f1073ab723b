use crc::{Crc, CRC_8_AUTOSAR};

static AUTOSAR: Crc<u8> = Crc::<u8>::new(&CRC_8_AUTOSAR);

/// Splices a CRC-8 checksum into byte payloads
#[derive(Clone, Copy)]
pub struct Framer {
    crc: &'static Crc<u8>,
}

impl Framer {
    /// Framer using CRC-8/AUTOSAR (poly 0x2F, init 0xFF, xorout 0xFF)
    pub fn autosar() -> Self {
        Framer { crc: &AUTOSAR }
    }

    pub fn checksum(&self, bytes: &[u8]) -> u8 {
        self.crc.checksum(bytes)
    }

    /// Insert the checksum of `payload` at `index`.
    ///
    /// The checksum covers the whole original payload, not the spliced
    /// result. An index past the end appends.
    pub fn frame(&self, payload: &[u8], index: usize) -> Vec<u8> {
        let index = index.min(payload.len());
        let mut packet = Vec::with_capacity(payload.len() + 1);

        packet.extend_from_slice(&payload[..index]);
        packet.push(self.checksum(payload));
        packet.extend_from_slice(&payload[index..]);

        packet
    }

    /// Check that the byte at `index` is the checksum of everything else
    pub fn verify(&self, packet: &[u8], index: usize) -> bool {
        self.unframe(packet, index).is_some()
    }

    /// Remove the checksum byte at `index`, returning the payload if it matches
    pub fn unframe(&self, packet: &[u8], index: usize) -> Option<Vec<u8>> {
        if index >= packet.len() {
            return None;
        }

        let mut payload = packet.to_vec();
        let crc = payload.remove(index);

        if self.checksum(&payload) == crc {
            Some(payload)
        } else {
            None
        }
    }
}
