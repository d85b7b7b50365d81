//! Centralized error type for the consort umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("MIDI: {0}")]
    Midi(#[from] consort_midi_io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
