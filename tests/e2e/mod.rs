//! End-to-end tests for convoy
//!
//! Each test runs real supervisors against simulated clients and checks what
//! they did to the client and published on the bus.

pub mod companion;
pub mod menu;
pub mod supervisor;
pub mod watchdog;

pub use helpers::*;
