//! The strategy capability interface for the Q21 player, the data types that flow through it,
//! and a demo implementation.

mod context;
pub use context::*;

mod strategy;
pub use strategy::Strategy;

mod demo;
pub use demo::DemoStrategy;
