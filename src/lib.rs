//! Client and hub for a networked pet feeder.
//!
//! The feeder's state lives in a live hierarchical tree served by the hub:
//! `Schedules/<id>` holds the weekly feeding rules and `Variables` the
//! shared device control record. Clients mirror those subtrees through
//! push subscriptions and write through to them; recordings and captures
//! go to the hub's blob storage.

pub mod commands;
pub mod config;
pub mod connectivity;
pub mod hub;
pub mod media;
pub mod models;
pub mod remote;
pub mod stores;
