//! Composition root mirroring the device split: a foreground loop and a
//! timer tick sharing two queues.

use std::rc::Rc;

use crate::command;
use crate::engine::Engine;
use crate::fifo::Fifo;
use crate::hal::{MatrixPort, Ps2Port};
use crate::matrix::Matrix;

pub struct Controller {
    matrix: Matrix,
    engine: Engine,
    tx: Rc<Fifo>,
    rx: Rc<Fifo>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    pub fn new() -> Self {
        let tx = Rc::new(Fifo::new());
        let rx = Rc::new(Fifo::new());
        Self {
            matrix: Matrix::new(),
            engine: Engine::new(tx.clone(), rx.clone()),
            tx,
            rx,
        }
    }

    /// One foreground iteration: a full matrix pass, then at most one
    /// received byte answered.
    pub fn step<M: MatrixPort>(&mut self, port: &mut M) {
        self.matrix.scan(port, &self.tx);
        let _ = command::process_one(&self.rx, &self.tx);
    }

    /// Timer tick body. On hardware this runs from the timer interrupt
    /// and preempts `step` at any point.
    pub fn tick<P: Ps2Port>(&mut self, port: &mut P) {
        self.engine.tick(port);
    }

    /// Scan codes and replies waiting to go out on the wire.
    pub fn outbound(&self) -> &Fifo {
        &self.tx
    }

    /// Host bytes waiting for the foreground loop.
    pub fn inbound(&self) -> &Fifo {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use crate::host::Bench;
    use crate::matrix::DEBOUNCE_PASSES;

    const TICKS_PER_PASS: usize = 40;

    fn settle(bench: &mut Bench, steps: usize) {
        for _ in 0..steps {
            bench.step(TICKS_PER_PASS);
        }
    }

    fn debounce_steps() -> usize {
        DEBOUNCE_PASSES as usize + 4
    }

    #[test]
    fn press_and_hold_emits_one_make_code() {
        let mut bench = Bench::new();
        bench.matrix.press(0, 0); // 0x16
        settle(&mut bench, debounce_steps());
        assert_eq!(bench.host.received, vec![0x16]);
        settle(&mut bench, 40);
        assert_eq!(bench.host.received, vec![0x16]);
        assert_eq!(bench.host.frame_errors, 0);
    }

    #[test]
    fn release_emits_break_sequence() {
        let mut bench = Bench::new();
        bench.matrix.press(0, 0);
        settle(&mut bench, debounce_steps());
        bench.matrix.release(0, 0);
        settle(&mut bench, debounce_steps());
        assert_eq!(bench.host.received, vec![0x16, 0xF0, 0x16]);
    }

    #[test]
    fn extended_key_round_trip() {
        let mut bench = Bench::new();
        bench.matrix.press(2, 0); // left arrow, 0x6B
        settle(&mut bench, debounce_steps());
        assert_eq!(bench.host.received, vec![0xE0, 0x6B]);
        bench.matrix.release(2, 0);
        settle(&mut bench, debounce_steps());
        assert_eq!(
            bench.host.received,
            vec![0xE0, 0x6B, 0xE0, 0xF0, 0x6B]
        );
    }

    #[test]
    fn reset_command_round_trip() {
        let mut bench = Bench::new();
        bench.host.send(0xFF);
        settle(&mut bench, 10);
        assert_eq!(bench.host.received, vec![0xFA, 0xAA]);
        assert_eq!(bench.host.acks, 1);
    }

    #[test]
    fn identify_round_trip() {
        let mut bench = Bench::new();
        bench.host.send(0xF2);
        settle(&mut bench, 10);
        assert_eq!(bench.host.received, vec![0xFA, 0xAB, 0x83]);
    }

    #[test]
    fn set_leds_is_acknowledged_per_byte() {
        let mut bench = Bench::new();
        bench.host.send(0xED);
        settle(&mut bench, 10);
        bench.host.send(0x02);
        settle(&mut bench, 10);
        assert_eq!(bench.host.received, vec![0xFA, 0xFA]);
    }

    #[test]
    fn inhibit_mid_frame_keeps_the_byte_queued() {
        let mut bench = Bench::new();
        bench.controller.outbound().push(0x16);

        // Let the frame run until the host has collected the start bit
        // and four data bits, then yank the clock.
        let mut reached = false;
        for _ in 0..200 {
            bench.tick();
            if bench.host.reading_bits() == Some(5) {
                reached = true;
                break;
            }
        }
        assert!(reached);
        bench.host.inhibit(8);
        bench.run(10);

        // Aborted, not consumed.
        assert_eq!(bench.controller.outbound().peek(), Some(0x16));
        assert_eq!(bench.controller.outbound().len(), 1);

        // After the clock is released the same byte goes out again.
        bench.run(100);
        assert_eq!(bench.host.received, vec![0x16]);
        assert!(bench.controller.outbound().is_empty());
        assert_eq!(bench.host.frame_errors, 0);
    }

    #[test]
    fn inhibit_after_parity_still_commits() {
        let mut bench = Bench::new();
        bench.controller.outbound().push(0x2D);

        let mut reached = false;
        for _ in 0..200 {
            bench.tick();
            if bench.host.reading_bits() == Some(10) {
                reached = true;
                break;
            }
        }
        assert!(reached);
        // Clock goes low between the parity and stop bits. The stop half
        // still runs, so the byte is committed even though the host never
        // sees the stop edge.
        bench.host.inhibit(8);
        bench.run(40);
        assert!(bench.controller.outbound().is_empty());
        bench.run(100);
        assert_eq!(bench.host.received, Vec::<u8>::new());
    }

    #[test]
    fn parity_error_drops_the_byte_and_preserves_outbound() {
        let mut bench = Bench::new();
        bench.host.send_with_parity_error(0xFF);
        bench.controller.outbound().push(0x29);
        bench.run(120);

        // Nothing reached the command processor and no reply went out;
        // the pending scan code survived because the outbound queue is
        // only cleared on a parity-valid receive.
        assert!(bench.controller.inbound().is_empty());
        assert_eq!(bench.host.received, vec![0x29]);
    }

    #[test]
    fn accepted_command_supersedes_pending_output() {
        let mut bench = Bench::new();
        bench.host.send(0xF2);
        bench.controller.outbound().push(0x16);
        settle(&mut bench, 10);

        // The stale 0x16 was cleared when the command was accepted; only
        // the identify reply reaches the host.
        assert_eq!(bench.host.received, vec![0xFA, 0xAB, 0x83]);
    }
}
