//! Reference modules
//!
//! Minimal concrete layers for building module trees: a dense layer, a
//! normalization layer with persisted running statistics, and an ordered
//! container. They exist so trees can be constructed, transformed, and
//! checkpointed without an external framework.

mod linear;
mod norm;
mod sequential;


pub use linear::Linear;
pub use norm::BatchNorm;
pub use sequential::Sequential;
