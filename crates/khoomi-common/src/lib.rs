//! Khoomi Common
//!
//! Process-level plumbing shared by the Khoomi binaries.

pub mod logging;
pub mod shutdown;

pub use logging::init_logging;
pub use shutdown::shutdown_signal;
