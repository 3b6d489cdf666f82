#![allow(
    clippy::len_zero,
    clippy::needless_lifetimes,
    clippy::enum_variant_names,
    clippy::new_without_default
)]

#[macro_use]
mod macros;

pub mod cli;
pub mod config;
pub mod exporter;
pub mod format;
pub mod kms;
pub mod logger;
pub mod monitor;
pub mod renderer;
pub mod surface;
#[cfg(test)]
mod test_utils;
pub mod utils;
pub mod video;
