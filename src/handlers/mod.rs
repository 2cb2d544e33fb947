//! HTTP handlers for the back office API

mod amortization;
mod client;
mod health;
mod loan;
mod payment;
mod voiding;

pub use amortization::*;
pub use client::*;
pub use health::*;
pub use loan::*;
pub use payment::*;
pub use voiding::*;
