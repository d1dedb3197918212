//! Traditional PKWARE ("ZipCrypto") stream cipher.
//!
//! Entries with general-purpose flag bit 0 set are prefixed by a 12-byte
//! encryption header. After decrypting the header, its last byte must match
//! the high byte of the entry CRC (or of the modification time when a data
//! descriptor follows the entry). A mismatch means the password is wrong, but
//! the reader reports it as a plain extraction failure.

/// Size of the encryption header preceding encrypted entry data
pub const ENCRYPTION_HEADER_SIZE: usize = 12;

const CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                0xEDB8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

#[inline]
fn crc32_update(crc: u32, byte: u8) -> u32 {
    (crc >> 8) ^ CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize]
}

/// Cipher state for one entry.
#[derive(Debug, Clone)]
pub struct ZipCrypto {
    keys: [u32; 3],
}

impl ZipCrypto {
    /// Initialize the key schedule from a password.
    pub fn new(password: &[u8]) -> Self {
        let mut cipher = ZipCrypto {
            keys: [0x1234_5678, 0x2345_6789, 0x3456_7890],
        };
        for &b in password {
            cipher.update_keys(b);
        }
        cipher
    }

    fn update_keys(&mut self, byte: u8) {
        self.keys[0] = crc32_update(self.keys[0], byte);
        self.keys[1] = self.keys[1]
            .wrapping_add(self.keys[0] & 0xFF)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        self.keys[2] = crc32_update(self.keys[2], (self.keys[1] >> 24) as u8);
    }

    fn stream_byte(&self) -> u8 {
        let temp = (self.keys[2] | 2) as u16;
        (temp.wrapping_mul(temp ^ 1) >> 8) as u8
    }

    /// Decrypt `buf` in place.
    pub fn decrypt(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            let plain = *b ^ self.stream_byte();
            self.update_keys(plain);
            *b = plain;
        }
    }

    /// Encrypt `buf` in place.
    pub fn encrypt(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            let key = self.stream_byte();
            self.update_keys(*b);
            *b ^= key;
        }
    }
}
