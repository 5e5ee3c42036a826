//! intcode-vm library
//!
//! An Intcode virtual machine with growable memory, three addressing modes
//! and port-based I/O, plus the patterns for wiring engines together.

pub mod ascii;
pub mod compose;
pub mod config;
pub mod interpreter;
pub mod port;
pub mod program;
