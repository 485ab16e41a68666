//! signdeck: multi-tenant digital signage server.
//!
//! SYSTEM CONTEXT
//! ==============
//! Owners manage content through the JSON API, kiosks hold a display
//! websocket and render whatever the display engine says is visible, and a
//! super-admin approves subscription requests and manages activation windows.
//! The `signdeck` binary serves all of it; `build-tv` packages the kiosk
//! frontend for sub-path hosting.

pub mod bundle;
pub mod config;
pub mod db;
pub mod display;
pub mod frame;
pub mod model;
pub mod rate_limit;
pub mod routes;
pub mod services;
pub mod state;
