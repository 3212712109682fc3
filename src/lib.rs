//! Liun: a decentralized information-theoretically-secure digital-signature
//! and consensus substrate.
//!
//! This crate is the top composing layer over [`liun_field`] and
//! [`liun_shamir`]'s algebraic primitives and [`liun_dkg`]'s distributed-key-
//! generation protocol: it builds the KeyChannel adapter, unconditionally-
//! secure threshold signatures, multi-path bootstrap, peer introduction, the
//! overlay, trust, epoch lifecycle, and the orchestrating [`node::Node`]
//! itself on top of them.
//!
//! Re-exports the sub-crates by component name so callers rarely need to
//! depend on them directly.

pub mod bootstrap;
pub mod channel;
pub mod checkpoint;
pub mod config;
pub mod epoch;
pub mod expand;
pub mod intro;
pub mod node;
pub mod overlay;
pub mod trust;
pub mod uss;
pub mod wire;

pub use liun_dkg as dkg;
pub use liun_field as field;
pub use liun_shamir as shamir;

pub use channel::{ChannelError, KeyChannel, NodeId, SimulatedChannel};
pub use config::NodeConfig;
pub use node::{Node, NodeError};
