use rand::RngCore;

/// Supplies the variable payload bytes of generated packets
pub trait ByteSource {
    fn fill(&mut self, buf: &mut [u8]);

    fn take(&mut self, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        self.fill(&mut buf);
        buf
    }
}

/// Uniformly random bytes from the thread-local RNG
pub struct RandomBytes;

impl ByteSource for RandomBytes {
    fn fill(&mut self, buf: &mut [u8]) {
        rand::thread_rng().fill_bytes(buf);
    }
}

/// Cycles through a fixed byte sequence
#[cfg(test)]
pub struct SequenceBytes {
    bytes: Vec<u8>,
    position: usize,
}

#[cfg(test)]
impl SequenceBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        SequenceBytes { bytes, position: 0 }
    }

    /// 0x01, 0x02, ... wrapping after 0xff
    pub fn counting() -> Self {
        Self::new((1..=255).collect())
    }
}

#[cfg(test)]
impl ByteSource for SequenceBytes {
    fn fill(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b = self.bytes[self.position % self.bytes.len()];
            self.position += 1;
        }
    }
}
