//! Kiosk display engine.
//!
//! ARCHITECTURE
//! ============
//! Everything in this module is synchronous and clock-injected: callers pass
//! `Instant`s and wall-clock times in, and get back the surfaces whose
//! visible content changed. The websocket session in `routes::display` owns
//! one `DisplayEngine` per connected kiosk and drives it from a `select!`
//! loop; nothing here touches the network or the database.

pub mod debounce;
pub mod engine;
pub mod rotation;
pub mod schedule;

pub use debounce::Debounce;
pub use engine::{DisplayEngine, DisplaySnapshot, DisplayUpdate, Surface};
pub use rotation::{Rotatable, Rotation};
