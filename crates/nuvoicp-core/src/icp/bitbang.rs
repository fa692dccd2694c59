//! Bitbang ICP implementation
//!
//! The N76E003 ICP interface is a three-wire synchronous protocol: DAT is
//! bidirectional, CLK is driven by the programmer and RST doubles as the mode
//! select line. Everything is clocked MSB first with DAT sampled on the
//! rising edge of CLK.
//!
//! Any set of GPIO lines implementing [`PgmPins`] can be turned into an
//! [`IcpTransport`] by wrapping it in [`IcpBitbang`].

use super::commands::*;
use super::{IcpTransport, ReentryTiming};
use crate::device::{UCID_LEN, UID_LEN};
use crate::error::{Error, Result};

/// Default DAT/CLK half-period in microseconds
pub const DEFAULT_BIT_DELAY_US: u32 = 2;
/// Half-period used while clocking the entry and exit sequences
pub const ENTRY_BIT_DELAY_US: u32 = 60;
/// Time CLK is held high for each programmed byte
pub const PROGRAM_TIME_US: u32 = 20;
/// Time CLK is held high after the mass erase command
pub const MASS_ERASE_TIME_US: u32 = 50000;
/// Duration of each step of the reset pattern
const RESET_SEQ_STEP_US: u32 = 10000;

/// Low-level pin operations for the ICP programmer
///
/// Line setters and the DAT sampler do not return errors: implementations
/// log pin faults and carry on, the way a stuck line would behave anyway.
/// The workflow detects a broken link through identity and verify checks.
pub trait PgmPins {
    /// Claim the lines and drive them to their idle state
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release the lines, optionally leaving the target held in reset
    fn deinit(&mut self, _leave_reset_high: bool) {}

    /// Drive DAT
    fn set_dat(&mut self, high: bool);

    /// Sample DAT
    fn get_dat(&mut self) -> bool;

    /// Drive RST
    fn set_rst(&mut self, high: bool);

    /// Drive CLK
    fn set_clk(&mut self, high: bool);

    /// Switch DAT between output (`true`) and input (`false`)
    fn set_dat_dir(&mut self, output: bool);

    /// Busy-wait or sleep for `us` microseconds
    fn delay_us(&mut self, us: u32);
}

impl<P: PgmPins + ?Sized> PgmPins for &mut P {
    fn init(&mut self) -> Result<()> {
        (**self).init()
    }

    fn deinit(&mut self, leave_reset_high: bool) {
        (**self).deinit(leave_reset_high)
    }

    fn set_dat(&mut self, high: bool) {
        (**self).set_dat(high)
    }

    fn get_dat(&mut self) -> bool {
        (**self).get_dat()
    }

    fn set_rst(&mut self, high: bool) {
        (**self).set_rst(high)
    }

    fn set_clk(&mut self, high: bool) {
        (**self).set_clk(high)
    }

    fn set_dat_dir(&mut self, output: bool) {
        (**self).set_dat_dir(output)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// ICP protocol engine over a set of programmer pins
pub struct IcpBitbang<P: PgmPins> {
    pins: P,
    bit_delay_us: u32,
    active: bool,
}

impl<P: PgmPins> IcpBitbang<P> {
    /// Wrap `pins` with the default bit delay
    pub fn new(pins: P) -> Self {
        Self::with_bit_delay(pins, DEFAULT_BIT_DELAY_US)
    }

    /// Wrap `pins` with a custom DAT/CLK half-period
    pub fn with_bit_delay(pins: P, bit_delay_us: u32) -> Self {
        Self {
            pins,
            bit_delay_us,
            active: false,
        }
    }

    /// Access the underlying pins
    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Consume the engine and return the pins
    pub fn into_pins(self) -> P {
        self.pins
    }

    fn usleep(&mut self, us: u32) {
        if us > 0 {
            self.pins.delay_us(us);
        }
    }

    fn bitsend(&mut self, data: u32, len: u32, delay_us: u32) {
        self.pins.set_dat_dir(true);
        for i in (0..len).rev() {
            self.pins.set_dat((data >> i) & 1 != 0);
            self.usleep(delay_us);
            self.pins.set_clk(true);
            self.usleep(delay_us);
            self.pins.set_clk(false);
        }
    }

    fn send_command(&mut self, cmd: u8, arg: u32) {
        let delay = self.bit_delay_us;
        self.bitsend(command_word(cmd, arg), SEQ_BITS, delay);
    }

    /// Play the reset pattern on RST, one bit per step, MSB first
    fn send_reset_seq(&mut self) {
        for i in 0..=SEQ_BITS {
            self.pins.set_rst((RESET_SEQ >> (SEQ_BITS - i)) & 1 != 0);
            self.usleep(RESET_SEQ_STEP_US);
        }
    }

    fn entry(&mut self) {
        self.send_reset_seq();
        self.usleep(100);
        self.bitsend(ENTRY_BITS, SEQ_BITS, ENTRY_BIT_DELAY_US);
        self.usleep(10);
    }

    fn exit(&mut self) {
        self.pins.set_rst(true);
        self.usleep(5000);
        self.pins.set_rst(false);
        self.usleep(10000);
        self.bitsend(EXIT_BITS, SEQ_BITS, ENTRY_BIT_DELAY_US);
        self.usleep(500);
        self.pins.set_rst(true);
    }

    fn reentry_once(&mut self, hold_us: u32, release_us: u32) {
        self.usleep(10);
        if hold_us > 0 {
            self.pins.set_rst(true);
            self.usleep(hold_us);
        }
        self.pins.set_rst(false);
        self.usleep(release_us);
        self.bitsend(ENTRY_BITS, SEQ_BITS, ENTRY_BIT_DELAY_US);
        self.usleep(10);
    }

    /// Clock in one byte, then clock out the `end` flag
    fn read_byte(&mut self, end: bool) -> u8 {
        let delay = self.bit_delay_us;
        let mut data = 0u8;

        self.pins.set_dat_dir(false);
        self.usleep(delay);
        for i in (0..8).rev() {
            self.usleep(delay);
            let bit = self.pins.get_dat();
            self.pins.set_clk(true);
            self.usleep(delay);
            self.pins.set_clk(false);
            data |= (bit as u8) << i;
        }

        self.pins.set_dat_dir(true);
        self.usleep(delay);
        self.pins.set_dat(end);
        self.usleep(delay);
        self.pins.set_clk(true);
        self.usleep(delay);
        self.pins.set_clk(false);
        self.usleep(delay);
        self.pins.set_dat(false);

        data
    }

    /// Clock out one byte followed by the `end` flag, holding CLK high for
    /// `high_us` so the device can program it
    fn write_byte(&mut self, data: u8, end: bool, high_us: u32, low_us: u32) {
        let delay = self.bit_delay_us;
        self.bitsend(data as u32, 8, delay);
        self.pins.set_dat(end);
        self.usleep(high_us);
        self.pins.set_clk(true);
        self.usleep(low_us);
        self.pins.set_dat(false);
        self.pins.set_clk(false);
    }

    fn ensure_active(&self) -> Result<()> {
        if self.active {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }
}

impl<P: PgmPins> IcpTransport for IcpBitbang<P> {
    fn init(&mut self) -> Result<()> {
        self.pins.init()?;
        log::debug!("Entering ICP mode");
        self.entry();
        self.active = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        if self.active {
            log::debug!("Leaving ICP mode");
            self.exit();
            self.active = false;
        }
        self.pins.deinit(false);
    }

    fn reentry(&mut self, timing: &ReentryTiming) -> Result<()> {
        self.ensure_active()?;
        for attempt in 1..=timing.max_attempts {
            self.reentry_once(timing.hold_us, timing.release_us);
            let devid = self.read_device_id();
            if devid != 0 {
                log::debug!("Re-entry attempt {} got device ID 0x{:04x}", attempt, devid);
                return Ok(());
            }
            log::debug!("Re-entry attempt {} got no response", attempt);
        }
        Err(Error::ReentryFailed {
            attempts: timing.max_attempts,
        })
    }

    fn read_device_id(&mut self) -> u16 {
        self.send_command(CMD_READ_DEVICE_ID, 0);
        let lo = self.read_byte(false);
        let hi = self.read_byte(true);
        u16::from_le_bytes([lo, hi])
    }

    fn read_cid(&mut self) -> u8 {
        self.send_command(CMD_READ_CID, 0);
        self.read_byte(true)
    }

    fn read_uid(&mut self) -> [u8; UID_LEN] {
        let mut uid = [0u8; UID_LEN];
        for (i, b) in uid.iter_mut().enumerate() {
            self.send_command(CMD_READ_UID, i as u32);
            *b = self.read_byte(true);
        }
        uid
    }

    fn read_ucid(&mut self) -> [u8; UCID_LEN] {
        let mut ucid = [0u8; UCID_LEN];
        for (i, b) in ucid.iter_mut().enumerate() {
            self.send_command(CMD_READ_UID, i as u32 + UCID_OFFSET);
            *b = self.read_byte(true);
        }
        ucid
    }

    fn read_flash(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.ensure_active()?;
        if buf.is_empty() {
            return Ok(());
        }
        self.send_command(CMD_READ_FLASH, addr);
        let last = buf.len() - 1;
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.read_byte(i == last);
        }
        Ok(())
    }

    fn write_flash(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.ensure_active()?;
        if data.is_empty() {
            return Ok(());
        }
        self.send_command(CMD_WRITE_FLASH, addr);
        let last = data.len() - 1;
        for (i, &b) in data.iter().enumerate() {
            self.write_byte(b, i == last, PROGRAM_TIME_US, 5);
        }
        Ok(())
    }

    fn mass_erase(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.send_command(CMD_MASS_ERASE, MASS_ERASE_KEY);
        self.write_byte(0xFF, true, MASS_ERASE_TIME_US, 500);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::VecDeque;
    use alloc::vec::Vec;

    /// Records the DAT level at every rising CLK edge while DAT is an output
    /// and answers reads from a queue of bytes
    #[derive(Default)]
    struct MockPins {
        dat: bool,
        clk: bool,
        output: bool,
        sent: Vec<bool>,
        reply: VecDeque<bool>,
        rst: Vec<bool>,
        inits: usize,
        deinits: usize,
    }

    impl MockPins {
        fn reply_bytes(&mut self, bytes: &[u8]) {
            for &b in bytes {
                for i in (0..8).rev() {
                    self.reply.push_back((b >> i) & 1 != 0);
                }
            }
        }

        fn take_sent(&mut self) -> Vec<bool> {
            core::mem::take(&mut self.sent)
        }
    }

    impl PgmPins for MockPins {
        fn init(&mut self) -> Result<()> {
            self.inits += 1;
            Ok(())
        }

        fn deinit(&mut self, _leave_reset_high: bool) {
            self.deinits += 1;
        }

        fn set_dat(&mut self, high: bool) {
            self.dat = high;
        }

        fn get_dat(&mut self) -> bool {
            self.reply.pop_front().unwrap_or(false)
        }

        fn set_rst(&mut self, high: bool) {
            self.rst.push(high);
        }

        fn set_clk(&mut self, high: bool) {
            if high && !self.clk && self.output {
                self.sent.push(self.dat);
            }
            self.clk = high;
        }

        fn set_dat_dir(&mut self, output: bool) {
            self.output = output;
        }

        fn delay_us(&mut self, _us: u32) {}
    }

    fn bits(value: u32, len: u32) -> Vec<bool> {
        (0..len).rev().map(|i| (value >> i) & 1 != 0).collect()
    }

    fn active(pins: &mut MockPins) -> IcpBitbang<&mut MockPins> {
        let mut icp = IcpBitbang::new(pins);
        icp.init().unwrap();
        icp.pins.take_sent();
        icp
    }

    #[test]
    fn test_entry_sequence() {
        let mut pins = MockPins::default();
        let mut icp = IcpBitbang::new(&mut pins);
        icp.init().unwrap();
        drop(icp);

        assert_eq!(pins.inits, 1);
        assert_eq!(pins.sent, bits(ENTRY_BITS, 24));
        assert_eq!(pins.rst.len(), 25);
        assert_eq!(pins.rst[1..], bits(RESET_SEQ, 24)[..]);
    }

    #[test]
    fn test_read_cid_framing() {
        let mut pins = MockPins::default();
        let mut icp = active(&mut pins);
        icp.pins.reply_bytes(&[0xDA]);

        assert_eq!(icp.read_cid(), 0xDA);

        let sent = icp.pins.take_sent();
        assert_eq!(sent.len(), 25);
        assert_eq!(sent[..24], bits(0x00000B, 24)[..]);
        // End flag after the only byte
        assert!(sent[24]);
    }

    #[test]
    fn test_read_device_id_little_endian() {
        let mut pins = MockPins::default();
        let mut icp = active(&mut pins);
        icp.pins.reply_bytes(&[0x50, 0x36]);

        assert_eq!(icp.read_device_id(), 0x3650);

        let sent = icp.pins.take_sent();
        assert_eq!(sent[..24], bits(0x00000C, 24)[..]);
        assert!(!sent[24]);
        assert!(sent[25]);
    }

    #[test]
    fn test_write_flash_framing() {
        let mut pins = MockPins::default();
        let mut icp = active(&mut pins);

        icp.write_flash(0x100, &[0xA5, 0x3C]).unwrap();

        let sent = icp.pins.take_sent();
        let mut expected = bits(command_word(CMD_WRITE_FLASH, 0x100), 24);
        expected.extend(bits(0xA5, 8));
        expected.push(false);
        expected.extend(bits(0x3C, 8));
        expected.push(true);
        assert_eq!(sent, expected);
    }

    #[test]
    fn test_read_flash_end_flags() {
        let mut pins = MockPins::default();
        let mut icp = active(&mut pins);
        icp.pins.reply_bytes(&[1, 2, 3]);

        let mut buf = [0u8; 3];
        icp.read_flash(0x30000, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);

        let sent = icp.pins.take_sent();
        assert_eq!(sent[..24], bits(0xC00000, 24)[..]);
        assert_eq!(sent[24..], [false, false, true]);
    }

    #[test]
    fn test_ucid_offset() {
        let mut pins = MockPins::default();
        let mut icp = active(&mut pins);

        icp.read_ucid();

        let sent = icp.pins.take_sent();
        // 16 commands, each followed by one end flag
        assert_eq!(sent.len(), 16 * 25);
        assert_eq!(sent[..24], bits(command_word(CMD_READ_UID, 0x20), 24)[..]);
        assert_eq!(sent[25..49], bits(command_word(CMD_READ_UID, 0x21), 24)[..]);
    }

    #[test]
    fn test_requires_init() {
        let mut pins = MockPins::default();
        let mut icp = IcpBitbang::new(&mut pins);
        let mut buf = [0u8; 1];
        assert_eq!(icp.read_flash(0, &mut buf), Err(Error::NotInitialized));
        assert_eq!(icp.mass_erase(), Err(Error::NotInitialized));
    }

    #[test]
    fn test_reentry_gives_up() {
        let mut pins = MockPins::default();
        let mut icp = active(&mut pins);
        let timing = ReentryTiming {
            max_attempts: 3,
            ..Default::default()
        };
        // No reply bits queued, so every device ID read returns 0
        assert_eq!(
            icp.reentry(&timing),
            Err(Error::ReentryFailed { attempts: 3 })
        );
    }

    #[test]
    fn test_reentry_succeeds_on_response() {
        let mut pins = MockPins::default();
        let mut icp = active(&mut pins);
        icp.pins.reply_bytes(&[0x50, 0x36]);
        assert_eq!(icp.reentry(&ReentryTiming::default()), Ok(()));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut pins = MockPins::default();
        let mut icp = active(&mut pins);
        icp.shutdown();
        let exit = icp.pins.take_sent();
        assert_eq!(exit, bits(EXIT_BITS, 24));
        icp.shutdown();
        assert!(icp.pins.take_sent().is_empty());
        drop(icp);
        assert_eq!(pins.deinits, 2);
    }
}
