pub mod config;
pub mod domain;
pub mod error;
pub mod handle;
pub mod library;
pub mod output;
pub mod shock;
pub mod sra;
pub mod validate;

#[cfg(test)]
mod test_support;
