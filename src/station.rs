//! # Reference Field Station
//!
//! The water-height monitoring station this logger PCB ships with: battery
//! gauge, on-board SHT35 (temperature/humidity) and BMP581 (temperature/
//! barometric pressure), and a submerged MS5837 pressure sensor on a roughly
//! ten-meter cable. Water height is derived from the pressure differential
//! between the submerged sensor and the barometer.
//!
//! Everything deployment-specific lives here as named constants: channel
//! assignments and settle times from the PCB layout, the slow bus clock the
//! long cable requires, the init-retry budget, and the plausibility clamps.
//! The roster order below is the export column order — add new outputs only
//! at the end (before the derived readings) so existing columns keep their
//! positions.

use crate::bus::Multiplexer;
use crate::cycle::{BuildError, SensorArray};
use crate::sensor::{DerivedSpec, OutputSpec, PlausibleRange, RetryPolicy, SensorDriver, SensorSpec};
use crate::sim::SimSensor;

/// Multiplexer address set in the PCB hardware.
pub const MUX_ADDRESS: u8 = 0x73;

/// Default bus clock rate, Hz.
pub const DEFAULT_BUS_CLOCK_HZ: u32 = 50_000;

/// Reduced clock rate for the MS5837's long cable, Hz.
///
/// Around ten meters of cable degrades edges too much for the default rate;
/// 5 kHz keeps the waveform readable at the far end.
pub const LONG_CABLE_CLOCK_HZ: u32 = 5_000;

/// SHT35 multiplexer channel (PCB wiring).
pub const SHT35_CHANNEL: u8 = 1;

/// BMP581 multiplexer channel (PCB wiring).
pub const BMP581_CHANNEL: u8 = 2;

/// MS5837 multiplexer channel (cable header).
pub const MS5837_CHANNEL: u8 = 7;

/// Settle after switching the multiplexer to an on-board sensor, ms.
pub const MUX_SETTLE_MS: u64 = 3;

/// Settle after switching the multiplexer to the cable header, ms.
pub const CABLE_SETTLE_MS: u64 = 5;

/// BMP581 conversion delay between init and data readout, ms.
pub const BMP581_CONVERSION_MS: u64 = 5;

/// Init retry budget for the MS5837: a flaky cable connection often answers
/// after a few attempts; two seconds bounds the cycle when it never does.
pub const MS5837_INIT_RETRY: RetryPolicy = RetryPolicy {
    backoff_ms: 50,
    timeout_us: 2_000_000,
};

/// Pressure readings above this are a disconnected or faulted MS5837, mbar.
pub const PRESSURE_PLAUSIBLE_MAX_MBAR: f32 = 4030.0;

/// Temperature readings below this are a disconnected or faulted MS5837, °C.
pub const TEMP_PLAUSIBLE_MIN_C: f32 = -50.0;

/// Standard gravity, m/s².
pub const STANDARD_GRAVITY: f32 = 9.81;

/// Water height in centimeters from the submerged/surface pressure
/// differential in millibar: 1 mbar of water column is 10/g centimeters.
fn water_height_cm(inputs: &[f32]) -> f32 {
    (inputs[0] - inputs[1]) * 10.0 / STANDARD_GRAVITY
}

/// Nominal values reported by the simulated drivers, one entry per sensor in
/// roster order. Chosen to look like a mild day at the station.
const NOMINAL_VBATT: [f32; 1] = [3.98];
const NOMINAL_SHT35: [f32; 2] = [21.4, 55.2];
const NOMINAL_BMP581: [f32; 2] = [21.1, 1013.2];
const NOMINAL_MS5837: [f32; 2] = [1023.0, 21.0];

/// Assemble the station roster over the given drivers.
///
/// Export column order: `Vbatt, tempSHT, humSHT, tempBMP, pressBMP,
/// pressMS, tempMS, htWat`.
pub fn sensor_array(
    battery: Box<dyn SensorDriver>,
    sht35: Box<dyn SensorDriver>,
    bmp581: Box<dyn SensorDriver>,
    ms5837: Box<dyn SensorDriver>,
) -> Result<SensorArray, BuildError> {
    let sensors = vec![
        SensorSpec::new("battery", battery).with_output(OutputSpec::new("Vbatt")),
        SensorSpec::new("sht35", sht35)
            .with_channel(SHT35_CHANNEL, MUX_SETTLE_MS)
            .with_output(OutputSpec::new("tempSHT"))
            .with_output(OutputSpec::new("humSHT")),
        SensorSpec::new("bmp581", bmp581)
            .with_channel(BMP581_CHANNEL, MUX_SETTLE_MS)
            .with_post_init_delay(BMP581_CONVERSION_MS)
            .with_output(OutputSpec::new("tempBMP"))
            .with_output(OutputSpec::new("pressBMP")),
        SensorSpec::new("ms5837", ms5837)
            .with_channel(MS5837_CHANNEL, CABLE_SETTLE_MS)
            .with_bus_clock(LONG_CABLE_CLOCK_HZ)
            .with_init_retry(MS5837_INIT_RETRY)
            .with_output(OutputSpec::clamped(
                "pressMS",
                PlausibleRange::at_most(PRESSURE_PLAUSIBLE_MAX_MBAR),
            ))
            .with_output(OutputSpec::clamped(
                "tempMS",
                PlausibleRange::at_least(TEMP_PLAUSIBLE_MIN_C),
            )),
    ];

    let derived = vec![DerivedSpec {
        name: "htWat",
        inputs: &["pressMS", "pressBMP"],
        compute: water_height_cm,
    }];

    SensorArray::new(
        Multiplexer::new(MUX_ADDRESS),
        DEFAULT_BUS_CLOCK_HZ,
        sensors,
        derived,
    )
}

/// The station roster over simulated drivers at nominal values, for
/// development mode and tests.
pub fn simulated() -> Result<SensorArray, BuildError> {
    sensor_array(
        Box::new(SimSensor::new(&NOMINAL_VBATT)),
        Box::new(SimSensor::new(&NOMINAL_SHT35)),
        Box::new(SimSensor::new(&NOMINAL_BMP581)),
        Box::new(SimSensor::new(&NOMINAL_MS5837)),
    )
}

/// Known sensor addresses for the hardware channel scan: (channel, address,
/// label).
pub const SCAN_TARGETS: [(u8, u8, &str); 3] = [
    (SHT35_CHANNEL, 0x44, "sht35"),
    (BMP581_CHANNEL, 0x46, "bmp581"),
    (MS5837_CHANNEL, 0x76, "ms5837"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBus, SimClock};

    #[test]
    fn roster_builds_with_the_expected_column_order() {
        let array = simulated().unwrap();
        let names: Vec<_> = array.readings().iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec!["Vbatt", "tempSHT", "humSHT", "tempBMP", "pressBMP", "pressMS", "tempMS", "htWat"]
        );
    }

    #[test]
    fn nominal_cycle_derives_roughly_ten_centimeters_of_water() {
        let mut array = simulated().unwrap();
        let mut bus = SimBus::new(DEFAULT_BUS_CLOCK_HZ);
        let mut clock = SimClock::new();

        let readings = array.run_cycle(&mut bus, &mut clock);

        let expected = (1023.0 - 1013.2) * 10.0 / STANDARD_GRAVITY;
        let ht = readings.get("htWat").unwrap().value;
        assert!((ht - expected).abs() < 1e-4, "htWat = {ht}, expected {expected}");
        assert!((ht - 9.99).abs() < 0.01, "reference scenario expects ~9.99 cm");
    }

    #[test]
    fn water_height_formula_matches_the_reference_values() {
        assert!((water_height_cm(&[1023.0, 1013.2]) - 9.9898).abs() < 1e-3);
        // Sentinel inputs produce a harmless (if wrong) height, never a crash
        assert!((water_height_cm(&[0.0, 1013.2]) + 1013.2 * 10.0 / 9.81).abs() < 1e-2);
    }
}
