//! Native OCR and Everything file search for the Tuff desktop host.
//!
//! [`boundary::NativeHost`] is the entry point: it validates loosely typed
//! arguments and dispatches to the platform OCR provider and the Everything
//! SDK search executor. [`server`] exposes the same calls over HTTP.

pub mod boundary;
pub mod config;
pub mod error;
pub mod everything;
pub mod ocr;
pub mod server;
pub mod text;
