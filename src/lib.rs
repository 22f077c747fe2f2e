#[macro_use]
extern crate nolog;

pub mod ack;
pub mod bridge;
pub mod config;
pub mod error;
pub mod frame;
pub mod net;
pub mod phy;
pub mod pipeline;
pub mod queue;
pub mod symbol;
