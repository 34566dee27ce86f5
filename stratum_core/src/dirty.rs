// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! Stratum uses multi-channel dirty tracking (via [`understory_dirty`]) to
//! record which layers were touched between two draw-property passes. Each
//! channel represents an independent category of change.
//!
//! # Propagation semantics
//!
//! - **Propagating**: [`GEOMETRY`] and [`EFFECTS`] use
//!   [`EagerPolicy`](understory_dirty::EagerPolicy) and have dependency edges
//!   from child to parent. Marking a parent dirty marks all descendants,
//!   because draw transforms, clips and draw opacities are inherited.
//!
//! - **Local-only**: [`RELATIONS`] is marked on both ends of a scroll-parent,
//!   clip-parent, mask or replica change. Only the explicitly marked layers
//!   appear in the drain output.
//!
//! - **Structural**: [`TOPOLOGY`] is marked on add/remove child and
//!   create/destroy layer.
//!
//! # Consumption
//!
//! Every [`calculate_draw_properties`](crate::layer::LayerStore::calculate_draw_properties)
//! call recomputes the whole tree, drains all channels and reports the union
//! of affected layers in [`DrawPass::changed`](crate::draw::DrawPass::changed).

use understory_dirty::Channel;

/// Bounds, position, transform, scroll or position-constraint changed.
pub const GEOMETRY: Channel = Channel::new(0);

/// Opacity, blend mode, filters, flags or animation state changed.
pub const EFFECTS: Channel = Channel::new(1);

/// A scroll-parent, clip-parent, mask or replica relation changed.
pub const RELATIONS: Channel = Channel::new(2);

/// Tree topology changed.
pub const TOPOLOGY: Channel = Channel::new(3);
