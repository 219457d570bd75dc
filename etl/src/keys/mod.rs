//! Surrogate-key reconciliation.
//!
//! The three pieces run in order for every parent table:
//!
//! 1. [`NaturalKeyPreserver`] - split a cleaned table into a storage payload
//!    and a shadow map of its source identifiers
//! 2. [`SurrogateResolver`] - after the payload is persisted, map the natural
//!    attribute of each stored row to its surrogate key
//! 3. [`DependencyRewriter`] - rewrite child foreign keys through the shadow
//!    map and the resolver, dropping rows with no persisted parent

pub mod preserver;
pub mod resolver;
pub mod rewriter;

pub use preserver::{NaturalKeyPreserver, PreservedTable};
pub use resolver::SurrogateResolver;
pub use rewriter::{DependencyRewriter, Rewritten};
