//! Crosscap - cross-device capture session core
//!
//! The protocol and state-machine heart of the verification wizard: a
//! desktop session can delegate its capture steps to a mobile browser,
//! synchronized over a room-scoped relay channel, while a step router
//! compiles the declarative step list into the screen sequence for either
//! flow and keeps position in navigable history.
//!
//! Rendered screens, phone-number validation, and transport internals are
//! external collaborators; this crate exposes the capabilities they plug
//! into.

// Allow dead code in the library - some surface is only used by main.rs
#![allow(dead_code)]

pub mod config;
pub mod logging;
pub mod router;
pub mod sms;
pub mod steps;
pub mod sync;
