//! Network-facing implementations of [`sonar_core::ResearchBackend`].

pub mod perplexity;

pub use perplexity::{PerplexityClient, DEFAULT_ENDPOINT};
