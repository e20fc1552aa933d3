//! Core types shared by the arena, the collector and its drivers.
//!
//! This crate provides the foundational vocabulary of the collector:
//! node identity, child slots, tri-color tags, collector phases and the
//! error taxonomy.
//!
//! # Overview
//!
//! - [`NodeId`] - Stable index of a node inside the arena
//! - [`Side`] - Which child slot of a node is addressed
//! - [`Color`] - Tri-color marking tag
//! - [`GcPhase`] - Phase of the current collection cycle
//! - [`GcError`] - Errors reported by arena, allocator and mutator operations
//!
//! # Examples
//!
//! ```
//! use core_types::{Color, GcError, NodeId, Side};
//!
//! let id = NodeId::new(4);
//! assert_eq!(id.index(), 4);
//! assert!(NodeId::NIL.is_nil());
//! assert_eq!(Side::Left.other(), Side::Right);
//! assert!(Color::White < Color::Grey);
//!
//! let err = GcError::OutOfRange { id, capacity: 4 };
//! assert_eq!(err.to_string(), "node 4 is out of range for an arena of 4 nodes");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod color;
mod error;
mod id;

pub use color::{Color, GcPhase};
pub use error::{GcError, GcResult};
pub use id::{NodeId, Side};
