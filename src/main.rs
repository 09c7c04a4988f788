//! # Field Datalogger Application Entry Point
//!
//! This binary drives one measurement cycle worth of tooling around the
//! library core. It supports a simulation mode for development on any host
//! (full cycle over simulated drivers, export lines on stdout) and, when
//! built with the `hardware` feature on Linux, a multiplexer channel scan
//! for checking a freshly wired station in the field.
//!
//! Production vendor sensor drivers plug into the library's `SensorDriver`
//! seam; they live in their own crates and are wired up by the deployment
//! firmware, not here.


#[cfg(all(target_os = "linux", feature = "hardware"))]
mod hw_i2c;

use std::env;

use anyhow::Result;
use chrono::Local;
use datalogger_lib::station;

/// Run one measurement cycle over the simulated station and print the
/// header line, the data row, and the debug listing.
fn run_simulated() -> Result<()> {
    use datalogger_lib::sim::{SimBus, SimClock};

    let mut array = station::simulated()?;
    let mut bus = SimBus::new(station::DEFAULT_BUS_CLOCK_HZ);
    let mut clock = SimClock::new();

    let readings = array.run_cycle(&mut bus, &mut clock);

    println!(
        "# measurement cycle at {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("{}", readings.file_header());
    println!("{}", readings.file_data());
    readings.serial_print();

    Ok(())
}

/// Walk all multiplexer channels and probe the station's known sensor
/// addresses with an empty addressed write, reporting what answers where.
///
/// This is a field-deployment aid: it catches swapped cables and dead
/// sensors before a station is left to log unattended.
#[cfg(all(target_os = "linux", feature = "hardware"))]
fn run_channel_scan() -> Result<()> {
    use crate::hw_i2c::LinuxI2cBus;
    use datalogger_lib::bus::{I2cBus, Multiplexer, CHANNEL_COUNT};
    use datalogger_lib::clock::{Clock, SystemClock};
    use datalogger_lib::config::Config;

    let config = Config::load();
    eprintln!("Scanning multiplexer channels on {}", config.bus.device);

    let mut bus = LinuxI2cBus::open(&config.bus.device)?;
    // Establish the default rate before any sensor traffic
    bus.restart(config.bus.default_clock_hz)?;
    let mux = Multiplexer::new(config.mux.address);
    let mut clock = SystemClock::new();

    for channel in 0..CHANNEL_COUNT {
        mux.select(&mut bus, channel);
        clock.delay_ms(station::CABLE_SETTLE_MS);

        for (expected_channel, address, label) in station::SCAN_TARGETS {
            if bus.write(address, &[]).is_ok() {
                if channel == expected_channel {
                    eprintln!("  channel {channel}: {label} (0x{address:02x}) present");
                } else {
                    eprintln!(
                        "  channel {channel}: {label} (0x{address:02x}) answering on an unexpected channel"
                    );
                }
            }
        }
    }

    // Leave the bus routed somewhere quiet
    mux.park(&mut bus);
    eprintln!("Scan complete");

    Ok(())
}

/// Main application entry point.
fn main() -> Result<()> {
    // Development mode: run the cycle over simulated drivers on any host
    let simulate = env::args().any(|arg| arg == "--simulate");

    if simulate {
        return run_simulated();
    }

    #[cfg(all(target_os = "linux", feature = "hardware"))]
    {
        run_channel_scan()?;
    }

    #[cfg(not(all(target_os = "linux", feature = "hardware")))]
    {
        eprintln!("Hardware support not enabled. Rebuild with --features hardware to talk to the bus.");
        eprintln!("Running a simulated measurement cycle instead:");
        run_simulated()?;
    }

    Ok(())
}
