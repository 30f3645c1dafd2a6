//! Library side of the `bip` binary: logging setup and pipeline stages.

pub mod logging;
pub mod pipeline;
