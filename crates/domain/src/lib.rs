//! # datapool-domain
//!
//! Pure domain model for the datapool data-distribution core.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Values** (the opaque payload carried on a channel)
//! - Define **Messages** (a keyed value travelling to or from a device)
//! - Define **Events** (what listeners observe once a message was handled)
//! - Define **Devices** (the identity a datapool instance is bound to)
//! - Define **Connection events** (link up/down notifications per device)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or threading crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod connection;
pub mod device;
pub mod event;
pub mod message;
pub mod value;
