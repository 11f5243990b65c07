//! SDR front-end ownership: a [`Source`] covers a frequency window derived
//! from its sample rate, owns pools of digital/analog/debug/sigmf
//! recorders, and runs an [`AutotuneManager`] to track and correct tuning
//! drift. Concrete radio drivers plug in through [`SdrFrontEnd`].

mod autotune;
mod error;
mod front_end;
mod source;

pub use autotune::AutotuneManager;
pub use error::CaptureError;
pub use front_end::SdrFrontEnd;
pub use source::{usable_window, DriverKind, Source};
