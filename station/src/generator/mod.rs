//! Synthetic stand-ins for hardware and profile files.

pub mod demo;
pub mod naca;
