pub mod backend;
pub mod config;
pub mod document;
pub mod error;
pub mod highlight;
pub mod logging;
pub mod narration;
pub mod pages;
pub mod segment;
pub mod session;
pub mod speech;
pub mod store;
pub mod viewport;

#[cfg(test)]
mod test_support;
