// src/hw_i2c.rs
//
// Linux adapter for the raw bus primitive: addressed writes over the
// /dev/i2c-* character device via linux-embedded-hal.
use datalogger_lib::bus::{BusError, I2cBus};
use embedded_hal::i2c::I2c;
use linux_embedded_hal::I2cdev;

pub struct LinuxI2cBus {
    dev: I2cdev,
    path: String,
}

impl LinuxI2cBus {
    pub fn open(path: &str) -> Result<Self, BusError> {
        let dev = I2cdev::new(path).map_err(|e| BusError::Unavailable(e.to_string()))?;
        Ok(Self {
            dev,
            path: path.to_string(),
        })
    }
}

impl I2cBus for LinuxI2cBus {
    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), BusError> {
        self.dev
            .write(addr, bytes)
            .map_err(|e| BusError::Transaction(format!("{e:?}")))
    }

    fn restart(&mut self, clock_hz: u32) -> Result<(), BusError> {
        // The kernel i2c-dev interface fixes SCL at the rate configured in
        // the device-tree overlay; reopening the device gives the
        // teardown/bring-up sequencing, and the requested rate is reported
        // for diagnostics.
        self.dev = I2cdev::new(&self.path).map_err(|e| BusError::Unavailable(e.to_string()))?;
        eprintln!(
            "bus restarted, requested clock {clock_hz} Hz on {}",
            self.path
        );
        Ok(())
    }
}
