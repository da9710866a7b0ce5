//! CLI library components for the protocol form tool.

pub mod logging;
