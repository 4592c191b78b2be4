mod chromium;

pub mod error;
pub mod markup;
pub mod pool;
pub mod service;

pub use chromium::{Chromium, ChromiumLauncher};
