//! Remote object-detection service.
//!
//! Each captured frame is posted as base64 JPEG to a single endpoint, which
//! answers with free-text guidance and an optional actionable instruction.

mod client;
mod endpoint;
mod result;

pub use client::{DetectionClient, DetectionError, DEFAULT_TIMEOUT};
pub use endpoint::{resolve_endpoint, DETECT_PATH, ENDPOINT_ENV, LOCAL_DEV_ENDPOINT};
pub use result::{DetectionResult, NO_OBJECTS_MESSAGE};
