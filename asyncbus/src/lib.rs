//! Decoder for SRAM-like asynchronous parallel buses.
//!
//! The bus has a read strobe, a write strobe, six address lines and eight
//! data lines. A capture of those 16 lines is walked with a [`SignalCursor`]
//! and every strobe assertion/release pair becomes one [`Transaction`], which
//! is reported to a [`Sink`] as an `ITEM` event plus a text annotation.
//!
//! # Capture files
//!
//! Captures can be loaded from a compact binary format (see [`file`]) or from
//! a plain text listing of value changes.

pub mod bitpack;
pub mod capture;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod file;
pub mod info;
pub mod lines;
pub mod output;
pub mod varint;

pub use capture::{Capture, SampleCursor};
pub use cursor::{Condition, Requirement, SamplePosition, SignalCursor};
pub use decoder::{Decoder, Direction, Options, StrobePolarity, Transaction};
pub use error::DecodeError;
pub use lines::{ChannelId, LineVector};
pub use output::{Record, Sink};
