//! Synthetic sequence generation from a compacted De Bruijn graph.
//!
//! Input sequences are split into k-mers, which form the edges of a De Bruijn graph over
//! (k-1)-mers. Unless every (k-1)-mer occurs, unary chains of the graph are contracted into
//! unitigs. Edge multiplicities give a row-stochastic transition matrix, and new sequences are
//! generated by random walks from START to END over this matrix.

pub mod capacity;
pub mod decoder;
pub mod error;
pub mod graph;
pub mod kmer;
pub mod pipeline;
pub mod progress;
pub mod sampler;
pub mod transition;
