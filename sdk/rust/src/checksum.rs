use arq_lab_abstract::Packet;

/// Integrity value over a packet: `seqnum + acknum + Σ payload bytes`.
/// The stored checksum field itself is not covered.
pub fn compute(packet: &Packet) -> i32 {
    packet
        .payload
        .iter()
        .fold(packet.seqnum.wrapping_add(packet.acknum), |sum, &byte| {
            sum.wrapping_add(i32::from(byte))
        })
}

pub fn is_corrupted(packet: &Packet) -> bool {
    packet.checksum != compute(packet)
}

/// Stamp a packet with its checksum so it can be handed to the channel.
pub fn seal(packet: Packet) -> Packet {
    let checksum = compute(&packet);
    packet.with_checksum(checksum)
}
