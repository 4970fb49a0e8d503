//! Polyglot core library. Relays messages between Discord channels, translating
//! each one into the language of every target channel.

pub mod config;
pub mod discord;
pub mod error;
pub mod init;
pub mod logging;
pub mod relay;
pub mod service;
pub mod translate;
