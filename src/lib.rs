//! Compiles a declarative test request into a LAVA job definition and an optional device dictionary.

pub mod app_config;
pub mod context;
pub mod device_dict;
pub mod devices;
pub mod error;
pub mod jobs;
pub mod registry;
pub mod request;
pub mod suites;
pub mod templates;
pub mod tuxmake;
pub mod utils;

pub use error::JobError;
pub use jobs::Job;
pub use request::{Artefact, Request};
