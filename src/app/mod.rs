//! Process-level plumbing shared by the library and the `serialrelay` binary.

mod logging;
#[cfg(test)]
mod tests;

#[cfg(test)]
pub(crate) use logging::set_logging_for_tests;
pub use logging::{
    crash_log_path, init_logging, install_panic_hook, log_debug, log_debug_content,
    log_file_path, log_panic,
};
