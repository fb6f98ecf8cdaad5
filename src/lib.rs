//! Online judge: sandboxed judge nodes behind a load-balanced dispatcher

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod toolchain;
