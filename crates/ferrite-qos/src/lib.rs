//! Per-client quality-of-service enforcement for ferrite.
//!
//! Two independent limits per client id: a concurrency cap (checked once at
//! admission, held for the entire transfer) and a soft bandwidth ceiling
//! (checked per chunk against a one-second window).

mod controller;

pub use controller::QosController;
