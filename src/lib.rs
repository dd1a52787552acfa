pub mod capture;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod display;
pub mod engine;
mod error;
pub mod fps;
pub mod geometry;
pub mod overlay;
pub mod pipeline;
pub mod pose;
pub mod reference;
pub mod session;

pub use error::Error;
