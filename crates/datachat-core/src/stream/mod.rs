//! Byte stream to typed event pipeline.
//!
//! `transport` opens the request, `decoder` splits the body into frames, and
//! `dispatch` classifies each frame into a `StreamEvent`.

pub mod decoder;
pub mod dispatch;
pub mod transport;
