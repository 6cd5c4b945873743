#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

pub use blobq_mpsc as mpsc;
pub use blobq_os as os;

pub use blobq_mpsc::{Consumer, MpscQueue, QueueError};
