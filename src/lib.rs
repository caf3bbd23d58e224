//! Firmware core of a PS/2 keyboard controller for an 8x8 key matrix,
//! plus a simulated host bench for exercising it off-target.
//!
//! The core mirrors the device split: a foreground loop scans the matrix
//! and answers host commands, while a periodic timer tick runs the line
//! engine that bit-bangs the PS/2 Clock and Data lines. The two halves
//! are decoupled by a pair of ring buffers and meet the hardware only
//! through the traits in [`hal`].

pub mod command;
pub mod controller;
pub mod engine;
pub mod fifo;
pub mod hal;
pub mod host;
pub mod keymap;
pub mod matrix;
