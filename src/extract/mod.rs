//! Candidate discovery, classification, and resolution.

pub mod assemble;
pub mod classifier;
pub mod dom;
pub mod observer;
pub mod resolver;

pub use assemble::{assemble, merge_candidates, resolve_candidates, ResolveLimits};
pub use classifier::ProviderClassifier;
pub use dom::DomExtractor;
pub use observer::NetworkObserver;
pub use resolver::{normalize_candidate, HttpResolver, ResolveFinal};
