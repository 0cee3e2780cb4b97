/**
 * Logging setup: console and rolling file
 *  layers, panic logging and build info.
 */
pub mod process;
/**
 * On-disk configuration in ~/.tunnel
 */
pub mod state;
/**
 * Build metadata injected by build.rs
 */
pub mod version;
