// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer tree data model.
//!
//! A *layer* is a node in a compositing tree. Each layer has:
//!
//! - An identity ([`LayerId`]), a generational handle that becomes stale when
//!   the layer is destroyed, preventing use-after-free bugs at the API level.
//! - Topology: parent, first-child, and sibling links forming an ordered tree.
//! - **Relations** outside the tree: scroll parent, clip parent, mask and
//!   replica. These are lookups stored on both ends, never ownership.
//! - **Inputs** set by the caller: geometry ([`bounds`](LayerStore::set_bounds),
//!   [`position`](LayerStore::set_position),
//!   [`transform`](LayerStore::set_transform)), effects
//!   ([`opacity`](LayerStore::set_opacity),
//!   [`filters`](LayerStore::set_filters), [`flags`](LayerStore::set_flags)),
//!   scroll state and resolved [`animation`](LayerStore::set_animation)
//!   values.
//! - **Outputs** written by
//!   [`calculate_draw_properties`](LayerStore::calculate_draw_properties):
//!   [`DrawProperties`](crate::draw::DrawProperties) for every layer and a
//!   [`RenderSurface`](crate::draw::RenderSurface) for layers that own one.
//!
//! Layers are stored in struct-of-arrays layout with index-based handles
//! for cache-friendly traversal.
//!
//! # Dirty tracking
//!
//! Property mutations automatically mark the corresponding dirty channel
//! (see [`dirty`](crate::dirty)) and raise
//! [`needs_update`](LayerStore::needs_update):
//!
//! - **GEOMETRY** / **EFFECTS**: propagate to all descendants, since
//!   transforms, clips and opacities are inherited.
//! - **RELATIONS**: local; both ends of a changed relation are marked.
//! - **TOPOLOGY**: structural changes (add/remove child, create/destroy
//!   layer).

mod id;
mod props;
mod relations;
mod store;
mod traverse;

pub use id::{INVALID, LayerId};
pub use props::{
    AnimationState, BlendMode, FilterOperation, LayerFlags, PositionConstraint, ScaleAnimation,
};
pub use store::LayerStore;
pub use traverse::Children;

pub(crate) use traverse::ChildIndices;
