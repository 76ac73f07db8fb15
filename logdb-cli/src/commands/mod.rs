pub mod config;
pub mod consume;
pub mod emit;
pub mod listen;
