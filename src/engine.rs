//! PS/2 line engine.
//!
//! Runs once per timer tick at twice the bit rate: each frame position
//! spends one tick on the clock-high half (data transitions and samples)
//! and one on the clock-low half (the rising edge). A frame is the usual
//! 11 bits: start, eight data bits LSB first, odd parity, stop. The engine
//! clocks in both directions; the host signals request-to-send by holding
//! Data low with Clock released, and inhibits the bus by holding Clock
//! low.
//!
//! Two contracts shape the state machine:
//!
//! * A transmitted byte is popped from the outbound queue only after its
//!   stop-bit low half completed. Any host inhibit before that leaves the
//!   byte at the queue head for retry.
//! * A received byte is pushed to the inbound queue only when its parity
//!   checks out, and accepting it clears any stale outbound bytes first.

use std::rc::Rc;

use tracing::{trace, warn};

use crate::fifo::Fifo;
use crate::hal::Ps2Port;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Recv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    High,
    Low,
}

/// Position within a frame. `Data` carries the bit index 0..8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Arbitrate,
    Start,
    Data { bit: u8 },
    Parity,
    Stop,
    Gap,
}

pub struct Engine {
    tx: Rc<Fifo>,
    rx: Rc<Fifo>,
    frame: Frame,
    phase: Phase,
    direction: Direction,
    shift: u8,
    parity_ones: u8,
}

impl Engine {
    pub fn new(tx: Rc<Fifo>, rx: Rc<Fifo>) -> Self {
        Self {
            tx,
            rx,
            frame: Frame::Arbitrate,
            phase: Phase::High,
            direction: Direction::Send,
            shift: 0,
            parity_ones: 0,
        }
    }

    /// Host pulled Clock low against our high half: stop driving Data and
    /// go back to arbitration. In send mode the byte was only peeked, so
    /// it stays queued for retry.
    fn abort<P: Ps2Port>(&mut self, port: &mut P) {
        trace!("host inhibit, frame aborted at {:?}", self.frame);
        port.release_data();
        self.frame = Frame::Arbitrate;
    }

    /// One timer tick. Samples the live line levels first, then acts on
    /// the current frame position and clock phase.
    pub fn tick<P: Ps2Port>(&mut self, port: &mut P) {
        let clock_in = port.clock_in();
        let data_in = port.data_in();

        match self.frame {
            Frame::Arbitrate => {
                // Data high means the bus is ours to send on; Data low is
                // a host request-to-send. Either way, wait out an inhibit.
                self.direction = if data_in { Direction::Send } else { Direction::Recv };
                if clock_in {
                    self.frame = Frame::Start;
                }
            }

            Frame::Start => {
                if self.phase == Phase::High && clock_in {
                    match self.direction {
                        Direction::Send => {
                            let Some(byte) = self.tx.peek() else {
                                // Nothing queued; keep the bus idle.
                                self.frame = Frame::Arbitrate;
                                return;
                            };
                            self.shift = byte;
                            self.parity_ones = 0;
                            trace!("sending {byte:02X}");
                            port.drive_data_low();
                            port.skew();
                            port.drive_clock_low();
                            self.phase = Phase::Low;
                        }
                        Direction::Recv => {
                            self.shift = 0;
                            self.parity_ones = 0;
                            port.skew();
                            port.drive_clock_low();
                            self.phase = Phase::Low;
                        }
                    }
                } else if self.phase == Phase::High {
                    self.abort(port);
                } else {
                    port.skew();
                    port.release_clock();
                    self.phase = Phase::High;
                    self.frame = Frame::Data { bit: 0 };
                }
            }

            Frame::Data { bit } => {
                if self.phase == Phase::High && clock_in {
                    match self.direction {
                        Direction::Send => {
                            if self.shift & 0x01 != 0 {
                                port.release_data();
                                self.parity_ones += 1;
                            } else {
                                port.drive_data_low();
                            }
                            self.shift >>= 1;
                        }
                        Direction::Recv => {
                            if data_in {
                                self.parity_ones += 1;
                                self.shift |= 0x80;
                            }
                            // Shift between bits; after the eighth the
                            // byte sits LSB-first in `shift`.
                            if bit < 7 {
                                self.shift >>= 1;
                            }
                        }
                    }
                    port.skew();
                    port.drive_clock_low();
                    self.phase = Phase::Low;
                } else if self.phase == Phase::High {
                    self.abort(port);
                } else {
                    port.skew();
                    port.release_clock();
                    self.phase = Phase::High;
                    self.frame = if bit == 7 {
                        Frame::Parity
                    } else {
                        Frame::Data { bit: bit + 1 }
                    };
                }
            }

            Frame::Parity => {
                if self.phase == Phase::High && clock_in {
                    match self.direction {
                        Direction::Send => {
                            // Odd parity: the parity bit tops the data
                            // ones up to an odd total.
                            if self.parity_ones % 2 == 0 {
                                port.release_data();
                            } else {
                                port.drive_data_low();
                            }
                        }
                        Direction::Recv => {
                            let total = self.parity_ones + data_in as u8;
                            if total % 2 == 1 {
                                trace!("received {:02X} from host", self.shift);
                                // A host byte supersedes anything we had
                                // queued to send.
                                self.tx.clear();
                                self.rx.push(self.shift);
                            } else {
                                warn!(
                                    "parity error on host byte {:02X}, dropped",
                                    self.shift
                                );
                            }
                        }
                    }
                    port.skew();
                    port.drive_clock_low();
                    self.phase = Phase::Low;
                } else if self.phase == Phase::High {
                    self.abort(port);
                } else {
                    port.skew();
                    port.release_clock();
                    self.phase = Phase::High;
                    self.frame = Frame::Stop;
                }
            }

            Frame::Stop => {
                // No inhibit check here: some hosts drop the clock right
                // after the parity bit, and the frame must still complete
                // its stop half.
                if self.phase == Phase::High {
                    match self.direction {
                        Direction::Send => port.release_data(),
                        Direction::Recv => port.drive_data_low(),
                    }
                    port.skew();
                    port.drive_clock_low();
                    self.phase = Phase::Low;
                } else {
                    port.skew();
                    port.release_clock();
                    port.release_data();
                    if self.direction == Direction::Send {
                        // Commit point: the stop bit made it out.
                        let sent = self.tx.pop();
                        trace!("sent {:02X?}", sent);
                    }
                    self.phase = Phase::High;
                    self.frame = Frame::Gap;
                }
            }

            Frame::Gap => {
                self.frame = Frame::Arbitrate;
            }
        }
    }
}
