//! Simulated open-collector wiring between the controller and the host.

use std::cell::Cell;
use std::rc::Rc;

use crate::hal::{MatrixPort, Ps2Port};
use crate::keymap::{MATRIX_COLS, MATRIX_ROWS};

/// One open-collector line: low when either side pulls it low, pulled
/// high by the external resistor otherwise.
#[derive(Default)]
pub struct Line {
    device_low: Cell<bool>,
    host_low: Cell<bool>,
}

impl Line {
    pub fn level(&self) -> bool {
        !(self.device_low.get() || self.host_low.get())
    }

    pub fn set_host_low(&self, low: bool) {
        self.host_low.set(low);
    }

    fn set_device_low(&self, low: bool) {
        self.device_low.set(low);
    }
}

/// The PS/2 Clock and Data pair, shared between the device pins and the
/// host model.
#[derive(Default)]
pub struct Bus {
    pub clock: Line,
    pub data: Line,
}

impl Bus {
    pub fn new() -> Rc<Bus> {
        Rc::new(Bus::default())
    }
}

/// Device side of the bus, implementing the pin contract the engine
/// consumes. Driving low maps to pulling the shared line; releasing lets
/// the pull-up win. The skew delay is far below one simulation tick and
/// collapses to nothing here.
pub struct DevicePins {
    bus: Rc<Bus>,
}

impl DevicePins {
    pub fn new(bus: Rc<Bus>) -> Self {
        Self { bus }
    }
}

impl Ps2Port for DevicePins {
    fn clock_in(&self) -> bool {
        self.bus.clock.level()
    }

    fn data_in(&self) -> bool {
        self.bus.data.level()
    }

    fn drive_clock_low(&mut self) {
        self.bus.clock.set_device_low(true);
    }

    fn release_clock(&mut self) {
        self.bus.clock.set_device_low(false);
    }

    fn drive_data_low(&mut self) {
        self.bus.data.set_device_low(true);
    }

    fn release_data(&mut self) {
        self.bus.data.set_device_low(false);
    }

    fn skew(&mut self) {}
}

/// Simulated 8x8 key matrix. Columns read all ones until a row is
/// strobed; closed keys on the strobed row pull their column bit low.
pub struct SimMatrix {
    closed: [[bool; MATRIX_COLS]; MATRIX_ROWS],
    strobed: Option<u8>,
}

impl Default for SimMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl SimMatrix {
    pub fn new() -> Self {
        Self {
            closed: [[false; MATRIX_COLS]; MATRIX_ROWS],
            strobed: None,
        }
    }

    pub fn press(&mut self, row: u8, col: u8) {
        self.closed[row as usize][col as usize] = true;
    }

    pub fn release(&mut self, row: u8, col: u8) {
        self.closed[row as usize][col as usize] = false;
    }
}

impl MatrixPort for SimMatrix {
    fn row_drive_low(&mut self, row: u8) {
        self.strobed = Some(row);
    }

    fn row_release(&mut self, _row: u8) {
        self.strobed = None;
    }

    fn settle(&mut self) {}

    fn read_columns(&self) -> u8 {
        let Some(row) = self.strobed else {
            return 0xFF;
        };
        let mut bits = 0xFF;
        for col in 0..MATRIX_COLS {
            if self.closed[row as usize][col] {
                bits &= !(1 << col);
            }
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_is_low_when_either_side_pulls() {
        let line = Line::default();
        assert!(line.level());
        line.set_host_low(true);
        assert!(!line.level());
        line.set_device_low(true);
        line.set_host_low(false);
        assert!(!line.level());
        line.set_device_low(false);
        assert!(line.level());
    }

    #[test]
    fn columns_follow_the_strobed_row() {
        let mut matrix = SimMatrix::new();
        matrix.press(3, 5);
        assert_eq!(matrix.read_columns(), 0xFF);
        matrix.row_drive_low(3);
        assert_eq!(matrix.read_columns(), 0xFF & !(1 << 5));
        matrix.row_release(3);
        matrix.row_drive_low(2);
        assert_eq!(matrix.read_columns(), 0xFF);
    }
}
