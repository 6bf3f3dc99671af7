//! Simulated I2C bus.
//!
//! Devices are represented only by the addresses that acknowledge. Every
//! successful write is logged so callers can inspect exactly what reached
//! the bus, and writes to an address can be made to fail after a given
//! number of successes.

use std::collections::{BTreeSet, HashMap};

use super::{I2c, I2cError, Result};

#[derive(Debug, Default)]
pub struct SimI2c {
    present: BTreeSet<u8>,
    log: Vec<(u8, Vec<u8>)>,
    // addr -> writes still allowed before failing
    budgets: HashMap<u8, usize>,
}

impl SimI2c {
    /// Create a bus on which the given addresses acknowledge.
    pub fn new(present: &[u8]) -> Self {
        Self {
            present: present.iter().copied().collect(),
            ..Default::default()
        }
    }

    /// Let `ok_writes` more writes to `addr` succeed, then fail the rest.
    pub fn fail_after(&mut self, addr: u8, ok_writes: usize) {
        self.budgets.insert(addr, ok_writes);
    }

    pub fn clear_failures(&mut self) {
        self.budgets.clear();
    }

    /// Attach or detach a device at runtime.
    pub fn set_present(&mut self, addr: u8, present: bool) {
        if present {
            self.present.insert(addr);
        } else {
            self.present.remove(&addr);
        }
    }

    /// All successful writes, in order.
    pub fn writes(&self) -> &[(u8, Vec<u8>)] {
        &self.log
    }

    /// Successful two-byte writes to `addr` as (command, value) pairs.
    pub fn pairs_to(&self, addr: u8) -> Vec<(u8, u8)> {
        self.log
            .iter()
            .filter(|(a, data)| *a == addr && data.len() == 2)
            .map(|(_, data)| (data[0], data[1]))
            .collect()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }
}

impl I2c for SimI2c {
    fn write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        if !self.present.contains(&addr) {
            return Err(I2cError::NoAck(addr).into());
        }
        if let Some(budget) = self.budgets.get_mut(&addr) {
            if *budget == 0 {
                return Err(I2cError::BusError.into());
            }
            *budget -= 1;
        }
        self.log.push((addr, data.to_vec()));
        Ok(())
    }

    fn probe(&mut self, addr: u8) -> Result<bool> {
        Ok(self.present.contains(&addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_after() {
        let mut bus = SimI2c::new(&[0x62]);
        bus.fail_after(0x62, 2);
        assert!(bus.write(0x62, &[0x00, 0x00]).is_ok());
        assert!(bus.write(0x62, &[0x01, 0x00]).is_ok());
        assert!(bus.write(0x62, &[0x08, 0xaa]).is_err());
        assert!(bus.write(0x62, &[0x08, 0xaa]).is_err());
        assert_eq!(bus.pairs_to(0x62), vec![(0x00, 0x00), (0x01, 0x00)]);

        bus.clear_failures();
        assert!(bus.write(0x62, &[0x08, 0xaa]).is_ok());
    }

    #[test]
    fn test_presence() {
        let mut bus = SimI2c::new(&[0x62]);
        assert!(bus.probe(0x62).unwrap());
        assert!(!bus.probe(0x3e).unwrap());
        bus.set_present(0x3e, true);
        assert!(bus.probe(0x3e).unwrap());
        assert!(bus.write(0x3e, &[0x80, 0x01]).is_ok());
        assert_eq!(bus.writes().len(), 1);
    }
}
