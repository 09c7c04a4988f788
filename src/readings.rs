//! # Reading Buffer and Exporters
//!
//! The [`ReadingSet`] is the ordered, fixed-length buffer one measurement
//! cycle fills and the storage/logging collaborators read. Its length and
//! name order are fixed when the sensor roster is built; between cycles it
//! persists only as reusable storage — no history, no versioning.
//!
//! The exporters are pure formatting. Header and data rows are positionally
//! aligned: both emit one field per slot in slot order with a trailing
//! separator, so every data row ever produced lines up under the header.

use crate::{Reading, Validity};

/// Field separator in the exported header and data rows.
pub const FIELD_SEPARATOR: char = ';';

/// Ordered, fixed-length collection of named readings.
pub struct ReadingSet {
    readings: Vec<Reading>,
}

impl ReadingSet {
    /// Build the buffer from the declared output names, zero-filled.
    /// Name uniqueness is validated by the roster builder before this runs.
    pub(crate) fn new(names: Vec<&'static str>) -> Self {
        let readings = names
            .into_iter()
            .map(|name| Reading {
                name,
                value: 0.0,
                validity: Validity::Ok,
            })
            .collect();
        Self { readings }
    }

    /// Number of reading slots (fixed for the program lifetime).
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Slot index of a named reading, if declared.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.readings.iter().position(|r| r.name == name)
    }

    /// Reading by name.
    pub fn get(&self, name: &str) -> Option<&Reading> {
        self.readings.iter().find(|r| r.name == name)
    }

    /// Readings in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    /// Value at a slot index. Panics on an out-of-range index, which the
    /// roster builder makes impossible for resolved slots.
    pub(crate) fn value_at(&self, index: usize) -> f32 {
        self.readings[index].value
    }

    /// Reset all slots to the zero sentinel at the start of a cycle.
    pub(crate) fn reset(&mut self) {
        for r in &mut self.readings {
            r.value = 0.0;
            r.validity = Validity::Ok;
        }
    }

    /// Store one slot's value and validity for this cycle.
    pub(crate) fn store(&mut self, index: usize, value: f32, validity: Validity) {
        let r = &mut self.readings[index];
        r.value = value;
        r.validity = validity;
    }

    /// Header row: every name followed by the field separator, in slot
    /// order, trailing separator included.
    pub fn file_header(&self) -> String {
        let mut header = String::new();
        for r in &self.readings {
            header.push_str(r.name);
            header.push(FIELD_SEPARATOR);
        }
        header
    }

    /// Data row: every value at two decimals followed by the field
    /// separator, in the same slot order as [`file_header`](Self::file_header).
    pub fn file_data(&self) -> String {
        let mut row = String::new();
        for r in &self.readings {
            row.push_str(&format!("{:.2}", r.value));
            row.push(FIELD_SEPARATOR);
        }
        row
    }

    /// Human-readable "name: value" listing, one line per reading at one
    /// decimal, in slot order.
    pub fn display_string(&self) -> String {
        let mut listing = String::new();
        for r in &self.readings {
            listing.push_str(&format!("{}: {:.1}\n", r.name, r.value));
        }
        listing
    }

    /// Emit the display listing to the debug channel (stderr) and return it.
    pub fn serial_print(&self) -> String {
        let listing = self.display_string();
        eprint!("{listing}");
        listing
    }
}
