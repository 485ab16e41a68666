//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and auth plumbing.

pub mod account;
pub mod auth;
pub mod branch;
pub mod content;
pub mod display;
pub mod email;
pub mod feed;
pub mod housekeeping;
pub mod media;
pub mod probe;
pub mod session;
pub mod slides;
pub mod subscription;
