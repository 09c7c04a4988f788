//! # Simulated Bus, Clock, and Sensor Drivers
//!
//! Test doubles that also back the binary's `--simulate` mode, so a full
//! measurement cycle can run on a development host with no hardware
//! attached. [`SimBus`] records every transaction for verification, which is
//! how the bus-discipline properties (one-hot channel writes, clock
//! restore ordering) are tested.

use std::cell::RefCell;
use std::rc::Rc;

use crate::bus::{BusError, I2cBus};
use crate::clock::Clock;
use crate::sensor::SensorDriver;

/// One recorded bus operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    /// Addressed write transaction
    Write { addr: u8, bytes: Vec<u8> },
    /// Bus teardown and bring-up at a clock rate
    Restart { clock_hz: u32 },
}

/// Simulated I2C bus.
///
/// Records all transactions in order and tracks the active clock rate.
/// Every operation succeeds; fault injection lives in [`SimSensor`], since
/// the cycle treats bus writes as best-effort anyway.
pub struct SimBus {
    transactions: Vec<Transaction>,
    clock_hz: u32,
}

impl SimBus {
    /// Create a bus running at the given initial clock rate.
    pub fn new(clock_hz: u32) -> Self {
        Self {
            transactions: Vec::new(),
            clock_hz,
        }
    }

    /// All recorded transactions in issue order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Only the write transactions, in issue order.
    pub fn writes(&self) -> Vec<Transaction> {
        self.transactions
            .iter()
            .filter(|t| matches!(t, Transaction::Write { .. }))
            .cloned()
            .collect()
    }

    /// The clock rate currently active on the bus.
    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }
}

impl I2cBus for SimBus {
    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), BusError> {
        self.transactions.push(Transaction::Write {
            addr,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    fn restart(&mut self, clock_hz: u32) -> Result<(), BusError> {
        self.clock_hz = clock_hz;
        self.transactions.push(Transaction::Restart { clock_hz });
        Ok(())
    }
}

/// Virtual-time clock: `delay_ms` advances `micros` instantly.
///
/// Lets the retry-deadline tests (and simulation mode) run a cycle that
/// would otherwise sleep for seconds.
pub struct SimClock {
    now_us: u64,
}

impl SimClock {
    pub fn new() -> Self {
        Self { now_us: 0 }
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimClock {
    fn micros(&mut self) -> u64 {
        self.now_us
    }

    fn delay_ms(&mut self, ms: u64) {
        self.now_us += ms * 1_000;
    }
}

#[derive(Default)]
struct SimSensorState {
    values: Vec<f32>,
    begin_failures_left: u32,
    begin_calls: u32,
    read_calls: u32,
}

/// Scriptable sensor driver.
///
/// Returns fixed values and can be told to fail its first N `begin()` calls
/// to exercise the retry path. State sits behind `Rc<RefCell>` so tests keep
/// a handle to the call counters after the driver is boxed into a roster
/// (the whole system is single-threaded, see the crate docs).
#[derive(Clone)]
pub struct SimSensor {
    state: Rc<RefCell<SimSensorState>>,
}

impl SimSensor {
    /// A sensor that reports the given output values, in output order.
    pub fn new(values: &[f32]) -> Self {
        Self {
            state: Rc::new(RefCell::new(SimSensorState {
                values: values.to_vec(),
                ..Default::default()
            })),
        }
    }

    /// Fail the first `n` `begin()` calls before succeeding.
    pub fn failing_begins(self, n: u32) -> Self {
        self.state.borrow_mut().begin_failures_left = n;
        self
    }

    /// Replace the reported values (e.g. to script an implausible reading).
    pub fn set_values(&self, values: &[f32]) {
        self.state.borrow_mut().values = values.to_vec();
    }

    /// How many times `begin()` was called.
    pub fn begin_calls(&self) -> u32 {
        self.state.borrow().begin_calls
    }

    /// How many times `read()` was called.
    pub fn read_calls(&self) -> u32 {
        self.state.borrow().read_calls
    }
}

impl SensorDriver for SimSensor {
    fn begin(&mut self) -> bool {
        let mut s = self.state.borrow_mut();
        s.begin_calls += 1;
        if s.begin_failures_left > 0 {
            s.begin_failures_left -= 1;
            false
        } else {
            true
        }
    }

    fn read(&mut self) -> bool {
        self.state.borrow_mut().read_calls += 1;
        true
    }

    fn value(&self, output: usize) -> f32 {
        let s = self.state.borrow();
        s.values.get(output).copied().unwrap_or(0.0)
    }
}
