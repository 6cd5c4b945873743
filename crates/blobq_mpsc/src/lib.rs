#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

// -----------------------------------------------------------------------------
// no_std support

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod consumer;
mod error;
mod guard;
mod node;
mod node_alloc;
mod queue;

// -----------------------------------------------------------------------------
// Exports

pub use consumer::Consumer;
pub use error::QueueError;
pub use node_alloc::{Global, NodeAlloc};
pub use queue::MpscQueue;
