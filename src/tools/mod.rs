//! Shared building blocks for the codecs.

pub mod bits;
pub mod prefix_tree;
pub mod ring_buffer;
