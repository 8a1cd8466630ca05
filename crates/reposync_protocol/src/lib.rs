//! # reposync protocol
//!
//! Chain protocol types for reposync.
//!
//! This crate provides:
//! - [`LinkId`] and its object-name codec (the chain namer/parser)
//! - [`build_canonical_chain`] which turns an unordered store listing into
//!   the canonical, conflict-free link sequence
//! - [`LinkPayload`], the CBOR envelope carried inside each encrypted link
//! - [`CommitId`] for the version-control commits links refer to
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Key Invariants
//!
//! - Names sort lexicographically in chain order (number, then generation)
//! - Within a chain position at most one generation is selected as final
//! - The canonical chain never skips a completed position
//! - Ties at the same (number, generation) are broken by the store's upload
//!   timestamp, then by instance id

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod chain;
mod commit;
mod error;
mod link;
mod payload;

pub use chain::{build_canonical_chain, CanonicalChain, ChainEntry};
pub use commit::CommitId;
pub use error::{ProtocolError, ProtocolResult};
pub use link::{
    LinkId, GENERATION_WIDTH, LINK_SUFFIX, MAX_GENERATION, MAX_NUMBER, NUMBER_WIDTH, SEPARATOR,
};
pub use payload::{LinkPayload, PAYLOAD_FORMAT_VERSION};
