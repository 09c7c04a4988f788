//! # Shared I2C Bus Primitive and Channel Multiplexer
//!
//! The datalogger's sensors all hang off one physical I2C bus, routed through
//! an 8-channel multiplexer (TCA9548-style). This module defines the raw bus
//! surface the measurement cycle consumes and the multiplexer that owns the
//! routing state.
//!
//! The bus trait is deliberately narrow. The cycle itself only ever performs
//! addressed write transactions (channel selection, presence probes) and full
//! bus teardown/restart when a sensor needs a non-default clock rate.
//! Register-level sensor traffic lives inside the vendor driver objects and
//! never crosses this seam.

use thiserror::Error;

/// Errors from the underlying I2C transport.
///
/// The channel selector ignores these (see [`Multiplexer::select`]); hardware
/// adapters and the scan path surface them.
#[derive(Error, Debug)]
pub enum BusError {
    /// An addressed transaction was not acknowledged or failed mid-transfer
    #[error("i2c transaction failed: {0}")]
    Transaction(String),

    /// The bus device could not be opened or reopened
    #[error("i2c bus unavailable: {0}")]
    Unavailable(String),
}

/// Raw I2C bus surface consumed by the measurement cycle.
///
/// Implementations: [`crate::sim::SimBus`] for tests and simulation mode, and
/// the Linux `/dev/i2c-*` adapter in the binary when the `hardware` feature
/// is enabled.
pub trait I2cBus {
    /// Perform one addressed write transaction (START, address, bytes, STOP).
    ///
    /// An empty `bytes` slice is a valid transaction and is used as a
    /// presence probe during channel scans.
    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), BusError>;

    /// Tear the bus down and bring it back up at the given clock rate.
    ///
    /// Sensors on long cables need a slower clock than the rest of the bus
    /// tolerates at default. The cycle guarantees this is never called while
    /// another sensor's communication is in flight, and that the default
    /// rate is restored before the next sensor's channel is selected.
    fn restart(&mut self, clock_hz: u32) -> Result<(), BusError>;
}

/// Number of downstream channels on the multiplexer.
pub const CHANNEL_COUNT: u8 = 8;

/// Inert parking channel selected after noise-sensitive sensors finish,
/// so later bus traffic does not couple into their cabling.
pub const PARK_CHANNEL: u8 = 0;

/// The bus multiplexer: routes the shared upstream bus to one of eight
/// downstream channels.
///
/// Selection is a single addressed write of the one-hot channel bitmask.
/// The selected channel persists until the next select, so the multiplexer
/// is routing state shared by every subsequent bus operation — which is why
/// the measurement cycle is its only caller.
#[derive(Clone, Copy, Debug)]
pub struct Multiplexer {
    address: u8,
}

impl Multiplexer {
    /// Create a multiplexer at its fixed bus address (set in PCB hardware).
    pub fn new(address: u8) -> Self {
        Self { address }
    }

    /// The multiplexer's bus address.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Route the bus to `channel`.
    ///
    /// A channel outside `0..=7` is silently ignored: no bus traffic, no
    /// error, previous routing left untouched. Transaction failures are
    /// likewise ignored — selection is best-effort, and a failed select
    /// shows up downstream as a sensor that does not answer.
    pub fn select(&self, bus: &mut dyn I2cBus, channel: u8) {
        if channel >= CHANNEL_COUNT {
            return;
        }
        let _ = bus.write(self.address, &[1 << channel]);
    }

    /// Route the bus to the inert parking channel.
    pub fn park(&self, bus: &mut dyn I2cBus) {
        self.select(bus, PARK_CHANNEL);
    }
}
