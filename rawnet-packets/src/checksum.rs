/// Computes the Internet checksum (RFC 1071): the ones' complement of the ones' complement sum
/// of the data taken as big-endian 16 bit words. A trailing odd byte is the high byte of a final
/// word whose low byte is zero.
///
/// Running this over a buffer whose checksum field already holds the result of a previous run
/// yields 0, which is how received headers are validated.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum = data.chunks(2).fold(0u32, |acc, word| {
        let low = word.get(1).copied().unwrap_or(0);
        acc + u32::from(u16::from_be_bytes([word[0], low]))
    });
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}
