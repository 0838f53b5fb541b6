//! Opens the editor at the source location behind a click in a running app.
//!
//! Build workers of one project agree on a single localhost endpoint through
//! the [`store`]; the [`service`] answers locate requests, and the
//! [`launcher`] starts whichever editor the [`editor`] resolver finds.

pub mod config;
pub mod config_io;
pub mod editor;
pub mod launcher;
pub mod partial_config;
pub mod service;
pub mod store;
