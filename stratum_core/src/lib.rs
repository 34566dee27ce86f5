// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer tree and draw-property computation for GPU compositing.
//!
//! `stratum_core` turns a retained tree of compositing layers into the data a
//! GPU compositor needs to draw it: per-layer transforms into a render target
//! and into screen space, clip and visible rectangles, accumulated opacity,
//! and the set of layers that must be drawn through an off-screen *render
//! surface*. It is `no_std` compatible (with `alloc`) and uses array-based
//! struct-of-arrays storage with index handles for cache-friendly traversal.
//!
//! # Architecture
//!
//! ```text
//!   LayerStore (inputs: geometry, effects, scroll, relations)
//!       │
//!       ▼
//!   calculate_draw_properties(root, DrawConfig)
//!       │   ├─ pre-pass: subtree aggregates, relation checks
//!       │   └─ walk: transforms, clips, surfaces, layer lists
//!       ▼
//!   DrawPass (render-surface layer list, changed layers)
//!       │
//!       ▼
//!   LayerStore::draw_properties / render_surface (per-layer outputs)
//! ```
//!
//! **[`layer`]**: Struct-of-arrays layer tree with generational handles,
//! input properties, and the non-tree relations (scroll parent, clip parent,
//! mask, replica) stored as explicit relation tables.
//!
//! **[`draw`]**: The draw-property engine: configuration, pre-pass,
//! render-surface decision, the transform/clip/visibility walk, and the
//! verification harness.
//!
//! **[`dirty`]**: Multi-channel dirty tracking via `understory_dirty`.
//! Property mutations mark the appropriate channel; each pass drains them and
//! reports the affected layers.
//!
//! **[`transform`]**: 4×4 transform with the inversion, flattening and
//! classification queries the engine needs.
//!
//! **[`geometry`]**: Rectangle mapping and projection through transforms that
//! may place points behind the viewer.
//!
//! **[`trace`]**: [`DrawTraceSink`](trace::DrawTraceSink) trait and event
//! types for pass instrumentation, with a zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod dirty;
pub mod draw;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod trace;
pub mod transform;
