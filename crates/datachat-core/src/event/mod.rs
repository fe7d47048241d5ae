//! Progress event distribution.

pub mod bus;
