use std::collections::BTreeMap;

use ad9959_core::{
    bus::{Bus, BusError, IoLine, IoLines, Level},
    channel::ChannelMask,
    registers::Register,
};

/// One observed transport interaction, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Write { address: u8, data: Vec<u8> },
    Read { address: u8 },
    Line { line: IoLine, level: Level },
}

/// A register-level chip emulator that records every transaction.
///
/// Models the double-buffered register file: writes land in a staging map
/// and only move to the active map on an update-pulse rising edge. Reads
/// return staged content when present, the active content otherwise, just
/// as the chip reads back its I/O buffer. Profile-pin edges complete the
/// committed sweep instantly, so end-to-end ramp behavior is observable
/// through [`Ad9959::read_state`](crate::Ad9959::read_state).
#[derive(Default)]
pub struct Audit {
    staged: BTreeMap<u8, Vec<u8>>,
    active: BTreeMap<u8, Vec<u8>>,
    log: Vec<Transaction>,
    update_level: Level,
    profile_levels: [Level; 4],
    ramp_origin: Option<(u8, Vec<u8>)>,
    broken: bool,
}

impl Audit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent transaction fail until [`repair`](Self::repair).
    pub fn break_down(&mut self) {
        self.broken = true;
    }

    pub fn repair(&mut self) {
        self.broken = false;
    }

    /// Every transaction observed so far, oldest first.
    #[must_use]
    pub fn log(&self) -> &[Transaction] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// The applied (post-update-pulse) content of a register.
    #[must_use]
    pub fn active(&self, reg: Register) -> Vec<u8> {
        self.active
            .get(&reg.address())
            .cloned()
            .unwrap_or_else(|| vec![0; reg.len()])
    }

    /// The staged, not-yet-applied content of a register, if any.
    #[must_use]
    pub fn staged(&self, reg: Register) -> Option<&[u8]> {
        self.staged.get(&reg.address()).map(Vec::as_slice)
    }

    /// How many update pulses (rising edges) have been observed.
    #[must_use]
    pub fn commits(&self) -> usize {
        self.log
            .iter()
            .filter(|t| {
                matches!(
                    t,
                    Transaction::Line {
                        line: IoLine::Update,
                        level: Level::High
                    }
                )
            })
            .count()
    }

    fn check(&self) -> Result<(), BusError> {
        if self.broken {
            return Err(BusError::new("transport is broken"));
        }
        Ok(())
    }

    fn selected(&self, index: usize) -> bool {
        let csr = self.active(Register::CSR)[0];
        index < 4 && ChannelMask::from_csr(csr).bits() & (1 << index) != 0
    }

    /// Runs the committed sweep for one channel to its end (rising edge) or
    /// back to its origin (falling edge), instantly.
    fn run_ramp(&mut self, index: usize, rising: bool) {
        if !self.selected(index) {
            return;
        }
        let cfr = self.active(Register::CFR);
        // Linear-sweep enable.
        if cfr[1] & 0x40 == 0 {
            return;
        }
        // With no-dwell the output snaps back to the start on arrival, and
        // the start registers already hold that value.
        if cfr[1] & 0x80 != 0 {
            return;
        }

        if !rising {
            if let Some((address, origin)) = self.ramp_origin.take() {
                self.active.insert(address, origin);
            }
            return;
        }

        let end = self.active(Register::CW1);
        match cfr[0] & 0xC0 {
            // Frequency profile: CW1 replaces the tuning word wholesale.
            0x80 => {
                let address = Register::CFTW0.address();
                self.ramp_origin = Some((address, self.active(Register::CFTW0)));
                self.active.insert(address, end);
            }
            // Amplitude profile: the MSB-justified destination lands in the
            // low-justified ACR word bits.
            0x40 => {
                let word = u16::from(end[0]) << 2 | u16::from(end[1] >> 6);
                let address = Register::ACR.address();
                let mut acr = self.active(Register::ACR);
                self.ramp_origin = Some((address, acr.clone()));
                acr[1] = acr[1] & 0xFC | (word >> 8) as u8 & 0x03;
                acr[2] = word as u8;
                self.active.insert(address, acr);
            }
            _ => {}
        }
    }
}

impl Bus for Audit {
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), BusError> {
        self.check()?;
        self.log.push(Transaction::Write {
            address,
            data: data.to_vec(),
        });
        let reg =
            Register::from_address(address).map_err(|e| BusError::new(e.to_string()))?;
        if data.len() != reg.len() {
            return Err(BusError::new(format!(
                "Write of {} bytes to {reg:?} (width {})",
                data.len(),
                reg.len()
            )));
        }
        self.staged.insert(address, data.to_vec());
        Ok(())
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.check()?;
        self.log.push(Transaction::Read { address });
        let reg =
            Register::from_address(address).map_err(|e| BusError::new(e.to_string()))?;
        let data = self
            .staged
            .get(&address)
            .cloned()
            .unwrap_or_else(|| self.active(reg));
        buf.copy_from_slice(&data);
        Ok(())
    }
}

impl IoLines for Audit {
    fn set(&mut self, line: IoLine, level: Level) -> Result<(), BusError> {
        self.check()?;
        self.log.push(Transaction::Line { line, level });
        match line {
            IoLine::Reset => {
                if level == Level::High {
                    self.staged.clear();
                    self.active.clear();
                    self.ramp_origin = None;
                }
            }
            IoLine::Update => {
                let rising = self.update_level == Level::Low && level == Level::High;
                self.update_level = level;
                if rising {
                    let staged = std::mem::take(&mut self.staged);
                    self.active.extend(staged);
                }
            }
            IoLine::Profile(ch) => {
                let edge = self.profile_levels[ch.index()] != level;
                self.profile_levels[ch.index()] = level;
                if edge {
                    self.run_ramp(ch.index(), level == Level::High);
                }
            }
        }
        Ok(())
    }
}
