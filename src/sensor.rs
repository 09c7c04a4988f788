//! # Sensor Driver Seam and Per-Sensor Wiring
//!
//! Vendor sensor drivers are external collaborators: this crate never encodes
//! register traffic or calibration math. What the measurement cycle needs
//! from a sensor is the small capability set in [`SensorDriver`], plus the
//! wiring facts that live on the PCB rather than in the vendor library —
//! which multiplexer channel the sensor sits on, how long it needs to settle,
//! whether it requires a slow bus clock, and which named reading slots its
//! values land in. Those facts are data, collected in [`SensorSpec`].
//!
//! The bounded init retry used by long-cable sensors is a reusable
//! combinator here ([`retry_with_timeout`]) rather than a loop hand-written
//! per sensor.

use crate::clock::Clock;

/// Capability set every sensor driver exposes to the measurement cycle.
///
/// Implementations wrap one vendor driver object (or a simulated stand-in,
/// see [`crate::sim::SimSensor`]) and are driven polymorphically by
/// [`crate::cycle::SensorArray`]. The cycle selects the sensor's multiplexer
/// channel and applies its settle delays *around* these calls; drivers only
/// talk to their own device.
///
/// # Example Implementation
///
/// ```ignore
/// struct Sht3xAdapter {
///     inner: sht31::SHT31<SingleShot, I2cdev, Delay>,
///     last: sht31::Reading,
/// }
///
/// impl SensorDriver for Sht3xAdapter {
///     fn begin(&mut self) -> bool { self.inner.measure().is_ok() }
///     fn read(&mut self) -> bool {
///         match self.inner.read() {
///             Ok(r) => { self.last = r; true }
///             Err(_) => false,
///         }
///     }
///     fn value(&self, output: usize) -> f32 {
///         match output {
///             0 => self.last.temperature,
///             _ => self.last.humidity,
///         }
///     }
/// }
/// ```
pub trait SensorDriver {
    /// Bring the sensor out of reset / start a conversion.
    ///
    /// Returns false when the sensor does not answer. Most sensors on short
    /// traces never fail this; the cycle ignores the result unless the spec
    /// carries a retry policy.
    fn begin(&mut self) -> bool;

    /// Trigger one measurement and latch its results.
    ///
    /// Always attempted once per cycle, even after a failed init — a
    /// degraded value in the record beats a missing cycle.
    fn read(&mut self) -> bool;

    /// Extract the latched value for one declared output, in the order the
    /// outputs appear in the sensor's [`SensorSpec`].
    fn value(&self, output: usize) -> f32;
}

/// Physically plausible bounds for one output.
///
/// A raw value outside the range is replaced with the zero sentinel before
/// anything downstream (including derived computations) sees it, and the
/// slot is tagged [`crate::Validity::Clamped`].
#[derive(Clone, Copy, Debug)]
pub struct PlausibleRange {
    pub min: f32,
    pub max: f32,
}

impl PlausibleRange {
    /// Bound from above only (e.g. a pressure ceiling).
    pub const fn at_most(max: f32) -> Self {
        Self {
            min: f32::NEG_INFINITY,
            max,
        }
    }

    /// Bound from below only (e.g. a temperature floor).
    pub const fn at_least(min: f32) -> Self {
        Self {
            min,
            max: f32::INFINITY,
        }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// One named output of a sensor, bound to a reading slot at roster build
/// time.
#[derive(Clone, Copy, Debug)]
pub struct OutputSpec {
    pub name: &'static str,
    /// Plausibility clamp applied to the raw value, if any
    pub plausible: Option<PlausibleRange>,
}

impl OutputSpec {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            plausible: None,
        }
    }

    pub const fn clamped(name: &'static str, plausible: PlausibleRange) -> Self {
        Self {
            name,
            plausible: Some(plausible),
        }
    }
}

/// Bounded retry parameters for sensors whose init fails transiently.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Sleep between attempts
    pub backoff_ms: u64,
    /// Give up once this much monotonic time has elapsed since the
    /// first attempt
    pub timeout_us: u64,
}

/// Retry `attempt` until it succeeds or `policy.timeout_us` of monotonic
/// time has elapsed.
///
/// Returns whether the operation eventually succeeded. The elapsed window
/// includes the backoff sleeps, so the loop terminates within roughly
/// `timeout_us + backoff` regardless of how many attempts fail. The
/// combinator itself stays silent; callers decide what to report.
pub fn retry_with_timeout(
    clock: &mut dyn Clock,
    policy: RetryPolicy,
    mut attempt: impl FnMut() -> bool,
) -> bool {
    let start = clock.micros();
    while !attempt() {
        clock.delay_ms(policy.backoff_ms);
        if clock.micros().wrapping_sub(start) > policy.timeout_us {
            return false;
        }
    }
    true
}

/// One sensor's wiring: the opaque driver plus the deployment facts the
/// cycle sequences around it.
pub struct SensorSpec {
    /// Short name used in debug-channel reporting
    pub label: &'static str,
    /// Multiplexer channel the sensor lives on; `None` for sensors that do
    /// not sit behind the mux (e.g. the battery gauge)
    pub channel: Option<u8>,
    /// Settle delay after selecting the channel, milliseconds
    pub settle_ms: u64,
    /// Delay between init and read, milliseconds
    pub post_init_ms: u64,
    /// Non-default bus clock this sensor requires, if any. The cycle
    /// restarts the bus at this rate before the sensor's channel is
    /// selected and restores the default rate afterwards.
    pub bus_clock_hz: Option<u32>,
    /// Bounded retry applied to `begin()`; `None` means init is fire-and-
    /// forget like the original PCB sensors
    pub init_retry: Option<RetryPolicy>,
    /// Named outputs in extractor order
    pub outputs: Vec<OutputSpec>,
    /// The opaque vendor driver (or simulated stand-in)
    pub driver: Box<dyn SensorDriver>,
}

impl SensorSpec {
    /// A sensor with no channel, no delays, and no retry — wiring details
    /// are added with the `with_*` methods.
    pub fn new(label: &'static str, driver: Box<dyn SensorDriver>) -> Self {
        Self {
            label,
            channel: None,
            settle_ms: 0,
            post_init_ms: 0,
            bus_clock_hz: None,
            init_retry: None,
            outputs: Vec::new(),
            driver,
        }
    }

    pub fn with_channel(mut self, channel: u8, settle_ms: u64) -> Self {
        self.channel = Some(channel);
        self.settle_ms = settle_ms;
        self
    }

    pub fn with_post_init_delay(mut self, ms: u64) -> Self {
        self.post_init_ms = ms;
        self
    }

    pub fn with_bus_clock(mut self, clock_hz: u32) -> Self {
        self.bus_clock_hz = Some(clock_hz);
        self
    }

    pub fn with_init_retry(mut self, policy: RetryPolicy) -> Self {
        self.init_retry = Some(policy);
        self
    }

    pub fn with_output(mut self, output: OutputSpec) -> Self {
        self.outputs.push(output);
        self
    }
}

/// A reading computed from other readings in the same cycle.
///
/// Inputs are resolved to slot indices when the roster is built; the compute
/// function is pure and runs after every raw slot is populated.
pub struct DerivedSpec {
    pub name: &'static str,
    /// Names of the readings this value is computed from, in the order the
    /// compute function expects them
    pub inputs: &'static [&'static str],
    pub compute: fn(&[f32]) -> f32,
}
