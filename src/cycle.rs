//! # Measurement Orchestrator
//!
//! [`SensorArray`] owns the sensor roster, the multiplexer, and the reading
//! buffer, and runs the one-pass measurement cycle: for each sensor in
//! declaration order — bus clock (if non-default), channel select, settle,
//! init, post-init delay, read, extract-and-store — then the derived
//! computations once every raw slot is populated.
//!
//! The whole pass is synchronous and strictly sequential. The bus is a
//! single shared resource and this type is its sole owner, so sensor k+1
//! cannot start until sensor k's communication, including its clock-restore
//! step, has completed.

use thiserror::Error;

use crate::bus::{I2cBus, Multiplexer};
use crate::clock::Clock;
use crate::readings::ReadingSet;
use crate::sensor::{retry_with_timeout, DerivedSpec, SensorSpec};
use crate::Validity;

/// Delay at the start of a cycle so freshly powered sensors are stable.
const POWER_SETTLE_MS: u64 = 50;

/// Settle after parking the multiplexer behind a slow-clock sensor.
const PARK_SETTLE_MS: u64 = 5;

/// Settle after restoring the default bus clock.
const CLOCK_RESTORE_MS: u64 = 50;

/// Errors detected when the roster is assembled, before any cycle runs.
///
/// Every declared output must map to exactly one writer; catching layout
/// mistakes at construction keeps the per-cycle path free of bookkeeping.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Two writers declared the same output name
    #[error("duplicate output name `{0}`")]
    DuplicateOutput(String),

    /// A derived reading references an output that no sensor (or earlier
    /// derived reading) declares
    #[error("derived reading `{name}` depends on unknown output `{input}`")]
    UnknownInput { name: String, input: String },

    /// A sensor was wired up with no outputs at all
    #[error("sensor `{0}` declares no outputs")]
    NoOutputs(String),
}

struct ResolvedDerived {
    slot: usize,
    input_slots: Vec<usize>,
    compute: fn(&[f32]) -> f32,
}

/// The measurement orchestrator: sensor roster, multiplexer, and reading
/// buffer under one owner.
pub struct SensorArray {
    sensors: Vec<SensorSpec>,
    /// Reading-slot indices per sensor, one per output, in output order
    slots: Vec<Vec<usize>>,
    derived: Vec<ResolvedDerived>,
    readings: ReadingSet,
    mux: Multiplexer,
    default_clock_hz: u32,
}

impl SensorArray {
    /// Assemble the roster and validate the reading layout.
    ///
    /// Slot order is sensors' outputs in declaration order, then derived
    /// readings in declaration order — the layout every exporter and
    /// collaborator addresses by index from then on. A derived reading may
    /// reference any raw output or any derived reading declared before it.
    pub fn new(
        mux: Multiplexer,
        default_clock_hz: u32,
        sensors: Vec<SensorSpec>,
        derived: Vec<DerivedSpec>,
    ) -> Result<Self, BuildError> {
        let mut names: Vec<&'static str> = Vec::new();
        let mut slots = Vec::with_capacity(sensors.len());

        for spec in &sensors {
            if spec.outputs.is_empty() {
                return Err(BuildError::NoOutputs(spec.label.to_string()));
            }
            let mut sensor_slots = Vec::with_capacity(spec.outputs.len());
            for output in &spec.outputs {
                if names.contains(&output.name) {
                    return Err(BuildError::DuplicateOutput(output.name.to_string()));
                }
                sensor_slots.push(names.len());
                names.push(output.name);
            }
            slots.push(sensor_slots);
        }

        let mut resolved = Vec::with_capacity(derived.len());
        for d in &derived {
            if names.contains(&d.name) {
                return Err(BuildError::DuplicateOutput(d.name.to_string()));
            }
            let mut input_slots = Vec::with_capacity(d.inputs.len());
            for input in d.inputs {
                match names.iter().position(|n| n == input) {
                    Some(slot) => input_slots.push(slot),
                    None => {
                        return Err(BuildError::UnknownInput {
                            name: d.name.to_string(),
                            input: (*input).to_string(),
                        })
                    }
                }
            }
            resolved.push(ResolvedDerived {
                slot: names.len(),
                input_slots,
                compute: d.compute,
            });
            names.push(d.name);
        }

        Ok(Self {
            sensors,
            slots,
            derived: resolved,
            readings: ReadingSet::new(names),
            mux,
            default_clock_hz,
        })
    }

    /// The reading buffer as filled by the most recent cycle.
    pub fn readings(&self) -> &ReadingSet {
        &self.readings
    }

    /// Run one measurement cycle and return the filled reading buffer.
    ///
    /// Every slot is written exactly once before this returns; exporters
    /// must only run on the returned buffer, never mid-cycle.
    pub fn run_cycle(&mut self, bus: &mut dyn I2cBus, clock: &mut dyn Clock) -> &ReadingSet {
        let mux = self.mux;

        clock.delay_ms(POWER_SETTLE_MS);
        self.readings.reset();

        for (spec, slots) in self.sensors.iter_mut().zip(&self.slots) {
            if let Some(hz) = spec.bus_clock_hz {
                let _ = bus.restart(hz);
            }

            if let Some(channel) = spec.channel {
                mux.select(bus, channel);
                clock.delay_ms(spec.settle_ms);
            }

            let init_ok = match spec.init_retry {
                Some(policy) => {
                    let driver = &mut spec.driver;
                    let ok = retry_with_timeout(clock, policy, || driver.begin());
                    if ok {
                        eprintln!("{}: init ok", spec.label);
                    } else {
                        eprintln!("{}: init timed out", spec.label);
                    }
                    ok
                }
                // Short-trace sensors: fire and forget, like always
                None => {
                    let _ = spec.driver.begin();
                    true
                }
            };

            if spec.post_init_ms > 0 {
                clock.delay_ms(spec.post_init_ms);
            }

            // One read per cycle, even after a failed init
            let _ = spec.driver.read();

            for (output_index, output) in spec.outputs.iter().enumerate() {
                let raw = spec.driver.value(output_index);
                let (value, validity) = match output.plausible {
                    Some(range) if !range.contains(raw) => (0.0, Validity::Clamped),
                    _ if !init_ok => (raw, Validity::InitTimeout),
                    _ => (raw, Validity::Ok),
                };
                self.readings.store(slots[output_index], value, validity);
            }

            if spec.bus_clock_hz.is_some() {
                mux.park(bus);
                clock.delay_ms(PARK_SETTLE_MS);
                let _ = bus.restart(self.default_clock_hz);
                clock.delay_ms(CLOCK_RESTORE_MS);
            }
        }

        for d in &self.derived {
            let inputs: Vec<f32> = d
                .input_slots
                .iter()
                .map(|&slot| self.readings.value_at(slot))
                .collect();
            self.readings.store(d.slot, (d.compute)(&inputs), Validity::Ok);
        }

        &self.readings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Multiplexer;
    use crate::sensor::{OutputSpec, PlausibleRange, RetryPolicy, SensorSpec};
    use crate::sim::{SimBus, SimClock, SimSensor, Transaction};

    const MUX_ADDR: u8 = 0x73;
    const DEFAULT_HZ: u32 = 50_000;

    fn mux() -> Multiplexer {
        Multiplexer::new(MUX_ADDR)
    }

    fn simple_sensor(label: &'static str, channel: u8, name: &'static str, value: f32) -> SensorSpec {
        SensorSpec::new(label, Box::new(SimSensor::new(&[value])))
            .with_channel(channel, 3)
            .with_output(OutputSpec::new(name))
    }

    #[test]
    fn duplicate_output_names_are_rejected_at_build() {
        let sensors = vec![
            simple_sensor("a", 1, "temp", 1.0),
            simple_sensor("b", 2, "temp", 2.0),
        ];
        let err = SensorArray::new(mux(), DEFAULT_HZ, sensors, vec![])
            .err()
            .expect("duplicate names must fail construction");
        assert!(matches!(err, BuildError::DuplicateOutput(name) if name == "temp"));
    }

    #[test]
    fn derived_reading_with_unknown_input_is_rejected_at_build() {
        let sensors = vec![simple_sensor("a", 1, "press", 1000.0)];
        let derived = vec![DerivedSpec {
            name: "height",
            inputs: &["press", "missing"],
            compute: |v| v[0] - v[1],
        }];
        let err = SensorArray::new(mux(), DEFAULT_HZ, sensors, derived)
            .err()
            .expect("unknown derived inputs must fail construction");
        assert!(matches!(err, BuildError::UnknownInput { ref input, .. } if input == "missing"));
    }

    #[test]
    fn sensor_without_outputs_is_rejected_at_build() {
        let sensors = vec![SensorSpec::new("mute", Box::new(SimSensor::new(&[])))];
        let err = SensorArray::new(mux(), DEFAULT_HZ, sensors, vec![])
            .err()
            .expect("output-less sensors must fail construction");
        assert!(matches!(err, BuildError::NoOutputs(label) if label == "mute"));
    }

    #[test]
    fn cycle_fills_slots_in_declaration_order_and_computes_derived() {
        let sensors = vec![
            simple_sensor("air", 1, "pressAir", 1013.2),
            simple_sensor("water", 2, "pressWater", 1023.0),
        ];
        let derived = vec![DerivedSpec {
            name: "height",
            inputs: &["pressWater", "pressAir"],
            compute: |v| (v[0] - v[1]) * 10.0 / 9.81,
        }];
        let mut array = SensorArray::new(mux(), DEFAULT_HZ, sensors, derived).unwrap();

        let mut bus = SimBus::new(DEFAULT_HZ);
        let mut clock = SimClock::new();
        let readings = array.run_cycle(&mut bus, &mut clock);

        let names: Vec<_> = readings.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["pressAir", "pressWater", "height"]);
        let height = readings.get("height").unwrap();
        assert!((height.value - (1023.0 - 1013.2) * 10.0 / 9.81).abs() < 1e-4);
        assert_eq!(height.validity, Validity::Ok);
    }

    #[test]
    fn slow_clock_sensor_is_bracketed_by_restart_park_and_restore() {
        let slow = SensorSpec::new("slow", Box::new(SimSensor::new(&[1023.0])))
            .with_channel(7, 5)
            .with_bus_clock(5_000)
            .with_output(OutputSpec::new("pressWater"));
        let sensors = vec![
            simple_sensor("first", 1, "tempAir", 21.1),
            slow,
            simple_sensor("last", 2, "humAir", 55.2),
        ];
        let mut array = SensorArray::new(mux(), DEFAULT_HZ, sensors, vec![]).unwrap();

        let mut bus = SimBus::new(DEFAULT_HZ);
        let mut clock = SimClock::new();
        array.run_cycle(&mut bus, &mut clock);

        assert_eq!(
            bus.transactions(),
            &[
                // first sensor, default clock
                Transaction::Write { addr: MUX_ADDR, bytes: vec![1 << 1] },
                // slow sensor: restart before its channel is selected
                Transaction::Restart { clock_hz: 5_000 },
                Transaction::Write { addr: MUX_ADDR, bytes: vec![1 << 7] },
                // park, then restore the default rate, before the next sensor
                Transaction::Write { addr: MUX_ADDR, bytes: vec![1 << 0] },
                Transaction::Restart { clock_hz: DEFAULT_HZ },
                // next sensor only after the bracket is closed
                Transaction::Write { addr: MUX_ADDR, bytes: vec![1 << 2] },
            ]
        );
        assert_eq!(bus.clock_hz(), DEFAULT_HZ, "default rate active at cycle end");
    }

    #[test]
    fn failed_init_still_reads_once_and_tags_outputs() {
        let flaky = SimSensor::new(&[999.9]).failing_begins(u32::MAX);
        let spec = SensorSpec::new("flaky", Box::new(flaky.clone()))
            .with_channel(7, 5)
            .with_init_retry(RetryPolicy {
                backoff_ms: 50,
                timeout_us: 2_000_000,
            })
            .with_output(OutputSpec::new("press"));
        let mut array = SensorArray::new(mux(), DEFAULT_HZ, vec![spec], vec![]).unwrap();

        let mut bus = SimBus::new(DEFAULT_HZ);
        let mut clock = SimClock::new();
        let readings = array.run_cycle(&mut bus, &mut clock);

        assert_eq!(flaky.read_calls(), 1, "exactly one read after the retry loop");
        let press = readings.get("press").unwrap();
        assert_eq!(press.validity, Validity::InitTimeout);
        assert_eq!(press.value, 999.9, "value is stored even after init timeout");
        // Cycle time stays bounded by the retry deadline plus fixed delays
        assert!(clock.micros() < 3_000_000);
    }

    #[test]
    fn retry_sensor_that_recovers_is_tagged_ok() {
        let flaky = SimSensor::new(&[1013.2]).failing_begins(2);
        let spec = SensorSpec::new("flaky", Box::new(flaky.clone()))
            .with_channel(7, 5)
            .with_init_retry(RetryPolicy {
                backoff_ms: 50,
                timeout_us: 2_000_000,
            })
            .with_output(OutputSpec::new("press"));
        let mut array = SensorArray::new(mux(), DEFAULT_HZ, vec![spec], vec![]).unwrap();

        let mut bus = SimBus::new(DEFAULT_HZ);
        let mut clock = SimClock::new();
        let readings = array.run_cycle(&mut bus, &mut clock);

        assert_eq!(flaky.begin_calls(), 3);
        assert_eq!(readings.get("press").unwrap().validity, Validity::Ok);
    }

    #[test]
    fn implausible_values_are_clamped_to_zero_before_derivation() {
        let wild = SimSensor::new(&[4444.0, -60.0]);
        let spec = SensorSpec::new("wild", Box::new(wild))
            .with_channel(7, 5)
            .with_output(OutputSpec::clamped("press", PlausibleRange::at_most(4030.0)))
            .with_output(OutputSpec::clamped("temp", PlausibleRange::at_least(-50.0)));
        let derived = vec![DerivedSpec {
            name: "height",
            inputs: &["press", "press"],
            compute: |v| v[0] + v[1],
        }];
        let mut array = SensorArray::new(mux(), DEFAULT_HZ, vec![spec], derived).unwrap();

        let mut bus = SimBus::new(DEFAULT_HZ);
        let mut clock = SimClock::new();
        let readings = array.run_cycle(&mut bus, &mut clock);

        let press = readings.get("press").unwrap();
        assert_eq!((press.value, press.validity), (0.0, Validity::Clamped));
        let temp = readings.get("temp").unwrap();
        assert_eq!((temp.value, temp.validity), (0.0, Validity::Clamped));
        assert_eq!(
            readings.get("height").unwrap().value,
            0.0,
            "derivation must see the sentinel, not the raw value"
        );
    }

    #[test]
    fn sensor_without_channel_issues_no_mux_traffic() {
        let spec = SensorSpec::new("battery", Box::new(SimSensor::new(&[3.98])))
            .with_output(OutputSpec::new("Vbatt"));
        let mut array = SensorArray::new(mux(), DEFAULT_HZ, vec![spec], vec![]).unwrap();

        let mut bus = SimBus::new(DEFAULT_HZ);
        let mut clock = SimClock::new();
        let readings = array.run_cycle(&mut bus, &mut clock);

        assert!(bus.transactions().is_empty());
        assert_eq!(readings.get("Vbatt").unwrap().value, 3.98);
    }
}
