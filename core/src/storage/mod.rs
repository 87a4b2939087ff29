//! # Storage
//!
//! The document store and the normalizer: everything concerned with getting
//! the tuition document into and out of memory.
//!
//! External JSON enters the system exclusively through [`normalize::normalize`],
//! which never fails and coerces any shape into the canonical document.

pub mod normalize;
pub mod store;

pub use normalize::normalize;
pub use store::{ChangeSource, DocumentError, DocumentStore};
