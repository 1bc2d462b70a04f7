//! Dallas/Maxim checksums.

const ODD_PARITY: [u8; 16] = [0, 1, 1, 0, 1, 0, 0, 1, 1, 0, 0, 1, 0, 1, 1, 0];

/// Dallas/Maxim CRC-8 (reflected polynomial 0x8C), as carried in byte 7 of
/// every ROM code.
pub fn maxim_crc8(data: &[u8], init: u8) -> u8 {
    data.iter().fold(init, |mut crc, &byte| {
        let mut byte = byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
        crc
    })
}

/// Feed a single byte into a running CRC-16.
#[inline]
pub fn crc16_update(crc: u16, byte: u8) -> u16 {
    let mut cdata = (byte as u16 ^ crc) & 0x00FF;
    let mut crc = crc >> 8;
    if ODD_PARITY[(cdata & 0x0F) as usize] ^ ODD_PARITY[(cdata >> 4) as usize]
        != 0
    {
        crc ^= 0xC001;
    }
    cdata <<= 6;
    crc ^= cdata;
    cdata <<= 1;
    crc ^ cdata
}

/// Dallas/Maxim CRC-16 (reflected 0xA001).
pub fn maxim_crc16(data: &[u8], init: u16) -> u16 {
    data.iter().fold(init, |crc, &byte| crc16_update(crc, byte))
}
