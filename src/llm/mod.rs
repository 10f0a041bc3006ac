pub mod classification;
pub mod client;
pub mod prompts;

pub use classification::*;
pub use client::*;
