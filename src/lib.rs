pub mod backend;
pub mod config;
pub mod error;
pub mod layout;
pub mod library;
pub mod logging;
pub mod preload;
pub mod sound;
pub mod upload;
pub mod viewer;

#[cfg(test)]
mod test_support;
