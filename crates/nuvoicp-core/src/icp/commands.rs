//! ICP command codes and fixed bit sequences
//!
//! Commands are sent as a 24-bit word, MSB first, with the command code in
//! the low 6 bits and an 18-bit argument (usually an address) above it.

/// Read unique ID byte (argument: index, +0x20 for UCID)
pub const CMD_READ_UID: u8 = 0x04;
/// Read company ID
pub const CMD_READ_CID: u8 = 0x0B;
/// Read device ID
pub const CMD_READ_DEVICE_ID: u8 = 0x0C;
/// Read flash (argument: start address)
pub const CMD_READ_FLASH: u8 = 0x00;
/// Write flash (argument: start address)
pub const CMD_WRITE_FLASH: u8 = 0x21;
/// Mass erase (argument: [`MASS_ERASE_KEY`])
pub const CMD_MASS_ERASE: u8 = 0x26;

/// Argument that must accompany the mass erase command
pub const MASS_ERASE_KEY: u32 = 0x3A5A5;
/// Offset added to the UID index to address the UCID bytes
pub const UCID_OFFSET: u32 = 0x20;

/// ICP entry sequence
pub const ENTRY_BITS: u32 = 0x5AA503;
/// ICP exit sequence
pub const EXIT_BITS: u32 = 0xF78F0;
/// Reset line pattern played before entry
pub const RESET_SEQ: u32 = 0x9E1CB6;
/// Width of commands and entry/exit/reset sequences in bits
pub const SEQ_BITS: u32 = 24;

/// Build the 24-bit command word
pub const fn command_word(cmd: u8, arg: u32) -> u32 {
    ((arg << 6) | cmd as u32) & 0x00FF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_word() {
        assert_eq!(command_word(CMD_READ_CID, 0), 0x00000B);
        assert_eq!(command_word(CMD_WRITE_FLASH, 0x100), 0x004021);
        assert_eq!(command_word(CMD_MASS_ERASE, MASS_ERASE_KEY), 0xE96966);
        assert_eq!(command_word(CMD_READ_FLASH, 0x30000), 0xC00000);
    }
}
