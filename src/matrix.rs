//! Matrix scan and per-key debounce.
//!
//! Each pass strobes the eight rows in turn and runs every cell through a
//! small debounce counter. A level change arms the counter and flips the
//! stored state speculatively; the flip is confirmed, and the scan code
//! emitted, only if the level still agrees with it when the countdown
//! reaches one. If the level reverted in the meantime the flip stays
//! committed and a later pass re-arms, so the first edge always wins.
//! That bias is deliberate and adequate for mechanical switches.

use tracing::trace;

use crate::fifo::Fifo;
use crate::hal::MatrixPort;
use crate::keymap::{self, EXTENDED_PREFIX, MATRIX_COLS, MATRIX_ROWS, RELEASE_PREFIX};

/// Scan passes a candidate transition must survive before it is committed.
pub const DEBOUNCE_PASSES: u8 = 20;

#[derive(Clone, Copy)]
struct KeyCell {
    /// True while the switch is open. Matches the sampled column sense:
    /// pull-ups read 1, a closed key reads 0.
    released: bool,
    /// 0 when stable, otherwise the remaining countdown of a candidate
    /// transition.
    debounce: u8,
}

pub struct Matrix {
    cells: [[KeyCell; MATRIX_COLS]; MATRIX_ROWS],
}

impl Default for Matrix {
    fn default() -> Self {
        Self::new()
    }
}

impl Matrix {
    pub fn new() -> Self {
        Self {
            cells: [[KeyCell { released: true, debounce: 0 }; MATRIX_COLS]; MATRIX_ROWS],
        }
    }

    /// One full scan pass. Confirmed transitions are pushed to `tx` in
    /// row-major then column-major order.
    pub fn scan<P: MatrixPort>(&mut self, port: &mut P, tx: &Fifo) {
        for row in 0..MATRIX_ROWS as u8 {
            port.row_drive_low(row);
            port.settle();
            let columns = port.read_columns();
            port.row_release(row);

            for col in 0..MATRIX_COLS as u8 {
                let sampled = columns & (1 << col) != 0;
                let cell = &mut self.cells[row as usize][col as usize];

                if cell.debounce > 1 {
                    cell.debounce -= 1;
                } else if cell.debounce == 1 {
                    let code = keymap::scan_code(row, col);
                    if sampled == cell.released && code != 0 {
                        emit(tx, code, sampled);
                    }
                    cell.debounce = 0;
                } else if sampled != cell.released {
                    cell.released = sampled;
                    cell.debounce = DEBOUNCE_PASSES;
                }
            }
        }
    }
}

fn emit(tx: &Fifo, code: u8, released: bool) {
    if keymap::is_extended(code) {
        tx.push(EXTENDED_PREFIX);
    }
    if released {
        tx.push(RELEASE_PREFIX);
    }
    tx.push(code);
    trace!(
        "key {} scan code {code:02X}",
        if released { "break" } else { "make" }
    );
}
