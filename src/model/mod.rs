//! Domain types shared by services, the display engine, and routes.

pub mod account;
pub mod clock;
pub mod content;
