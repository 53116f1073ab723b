use crate::byte_source::ByteSource;
use crate::protocol::checksum::Framer;

/// Position of the checksum byte in every command packet (right after the opcode)
pub const CRC_INDEX: usize = 1;

/// Leading bytes of the init frame, ignored by the firmware parser
pub const SENTINEL: [u8; 2] = [0xee, 0x00];

/// Status payload: mode Idle (0xf0), no error
const STATUS_PAYLOAD: [u8; 2] = [0xf0, 0x00];

/// Fixed third byte of the randomized PID payload
const PID_MARKER: u8 = 0xde;

/// Brightness used by the init frame
const INIT_BRIGHTNESS: u8 = 0x0f;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    Brightness,
    Monitor,
    Pid,
}

impl Command {
    /// Order in which commands are bundled into one write
    pub const ALL: [Command; 4] = [
        Command::Status,
        Command::Brightness,
        Command::Monitor,
        Command::Pid,
    ];

    pub fn opcode(self) -> u8 {
        match self {
            Command::Status => 0x1f,
            Command::Brightness => 0xaa,
            Command::Monitor => 0xab,
            Command::Pid => 0xac,
        }
    }

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.opcode() == opcode)
    }

    pub fn payload_len(self) -> usize {
        match self {
            Command::Status => STATUS_PAYLOAD.len(),
            Command::Brightness => 1,
            Command::Monitor => 3,
            Command::Pid => 5,
        }
    }

    /// Opcode + checksum + payload
    pub fn packet_len(self) -> usize {
        self.payload_len() + 2
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Status => "status",
            Command::Brightness => "brightness",
            Command::Monitor => "monitor",
            Command::Pid => "pid",
        }
    }
}

/// Builds checksummed command packets
pub struct PacketBuilder {
    framer: Framer,
}

impl PacketBuilder {
    pub fn new(framer: Framer) -> Self {
        PacketBuilder { framer }
    }

    /// Frame `payload` behind `command`'s opcode
    pub fn packet(&self, command: Command, payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::with_capacity(payload.len() + 1);
        body.push(command.opcode());
        body.extend_from_slice(payload);
        self.framer.frame(&body, CRC_INDEX)
    }

    /// One packet with fresh variable bytes
    pub fn random_packet(&self, command: Command, source: &mut dyn ByteSource) -> Vec<u8> {
        let payload = match command {
            Command::Status => STATUS_PAYLOAD.to_vec(),
            Command::Brightness => source.take(1),
            Command::Monitor => source.take(3),
            Command::Pid => {
                let mut payload = source.take(2);
                payload.push(PID_MARKER);
                payload.extend(source.take(2));
                payload
            }
        };
        self.packet(command, &payload)
    }

    /// Fixed, non-random packet used for the init frame
    pub fn init_packet(&self, command: Command) -> Vec<u8> {
        match command {
            Command::Status => self.packet(command, &STATUS_PAYLOAD),
            Command::Brightness => self.packet(command, &[INIT_BRIGHTNESS]),
            _ => self.packet(command, &vec![0u8; command.payload_len()]),
        }
    }

    /// All four commands with fresh variable bytes, in bundle order
    pub fn random_packets(&self, source: &mut dyn ByteSource) -> Vec<Vec<u8>> {
        Command::ALL
            .iter()
            .map(|&c| self.random_packet(c, source))
            .collect()
    }

    /// Sentinel followed by the fixed packets, each as its own chunk
    pub fn init_chunks(&self) -> Vec<Vec<u8>> {
        let mut chunks = vec![SENTINEL.to_vec()];
        chunks.extend(Command::ALL.iter().map(|&c| self.init_packet(c)));
        chunks
    }

    /// One bundled write of fresh packets
    pub fn build_bulk_frame(&self, source: &mut dyn ByteSource) -> Vec<u8> {
        self.random_packets(source).concat()
    }

    /// The one-shot init write
    pub fn build_init_frame(&self) -> Vec<u8> {
        self.init_chunks().concat()
    }

    /// Split a frame buffer back into packets by opcode.
    ///
    /// Bytes that do not start a known command are skipped. A packet whose
    /// checksum does not verify is returned with `false`.
    pub fn split(&self, frame: &[u8]) -> Vec<(Command, Vec<u8>, bool)> {
        let mut packets = Vec::new();
        let mut pos = 0;

        while pos < frame.len() {
            let Some(command) = Command::from_opcode(frame[pos]) else {
                pos += 1;
                continue;
            };

            let end = pos + command.packet_len();
            if end > frame.len() {
                break;
            }

            let packet = frame[pos..end].to_vec();
            let valid = self.framer.verify(&packet, CRC_INDEX);
            packets.push((command, packet, valid));
            pos = end;
        }

        packets
    }
}
