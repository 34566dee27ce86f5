// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for draw-property passes.
//!
//! This module provides a [`DrawTraceSink`] trait with per-event methods that
//! the engine calls while it computes draw properties. All method bodies
//! default to no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn DrawTraceSink`. When the `trace`
//! feature is **off**, every `Tracer` method compiles to nothing (zero
//! overhead). When **on**, each method performs a single `Option` branch
//! before dispatching.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

pub use crate::draw::SurfaceReason;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Why the walker skipped a whole subtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The layer's transform cannot be inverted and is not animating.
    SingularTransform,
    /// Nothing in the subtree is drawn, copied or hit-tested.
    NotDrawn,
    /// The layer is fully transparent and no opacity animation may start.
    ZeroOpacity,
    /// The layer's surface faces away from the viewer and is single-sided.
    BackFacingSurface,
}

/// Why a render surface was retracted after its subtree was walked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceRemoval {
    /// Nothing was drawn into the surface.
    EmptyLayerList,
    /// The surface's clipped content rect is empty.
    EmptyContentRect,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted before the pre-pass starts.
#[derive(Clone, Copy, Debug)]
pub struct PassBeginEvent {
    /// Pass generation.
    pub generation: u64,
    /// Slot index of the root layer.
    pub root: u32,
    /// Number of allocated layer slots.
    pub layer_slots: u32,
}

/// Emitted when a layer is given a render surface.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceCreatedEvent {
    /// Slot index of the owning layer.
    pub layer: u32,
    /// First reason that applied.
    pub reason: SurfaceReason,
}

/// Emitted when the walker prunes a subtree.
#[derive(Clone, Copy, Debug)]
pub struct SubtreeSkippedEvent {
    /// Slot index of the subtree root.
    pub layer: u32,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Emitted when a render surface is retracted.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceRemovedEvent {
    /// Slot index of the owning layer.
    pub layer: u32,
    /// Why it was removed.
    pub reason: SurfaceRemoval,
}

/// Per-pass summary emitted once the walk completes.
#[derive(Clone, Copy, Debug)]
pub struct PassSummary {
    /// Pass generation.
    pub generation: u64,
    /// Layers the walker visited.
    pub layers_visited: u32,
    /// Render surfaces in the final list.
    pub render_surfaces: u32,
    /// Layers that drew into some surface.
    pub layers_drawn: u32,
    /// Layers reported as changed since the previous pass.
    pub changed: u32,
}

// ---------------------------------------------------------------------------
// DrawTraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from draw-property passes.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait DrawTraceSink {
    /// Called before the pre-pass starts.
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        _ = e;
    }

    /// Called when a layer is given a render surface.
    fn on_surface_created(&mut self, e: &SurfaceCreatedEvent) {
        _ = e;
    }

    /// Called when the walker prunes a subtree.
    fn on_subtree_skipped(&mut self, e: &SubtreeSkippedEvent) {
        _ = e;
    }

    /// Called when a render surface is retracted.
    fn on_surface_removed(&mut self, e: &SurfaceRemovedEvent) {
        _ = e;
    }

    /// Called with the pass summary.
    fn on_pass_end(&mut self, s: &PassSummary) {
        _ = s;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`DrawTraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl DrawTraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`DrawTraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn DrawTraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn DrawTraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn DrawTraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`PassBeginEvent`].
    #[inline]
    pub fn pass_begin(&mut self, e: &PassBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_pass_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`SurfaceCreatedEvent`].
    #[inline]
    pub fn surface_created(&mut self, e: &SurfaceCreatedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_surface_created(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`SubtreeSkippedEvent`].
    #[inline]
    pub fn subtree_skipped(&mut self, e: &SubtreeSkippedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_subtree_skipped(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`SurfaceRemovedEvent`].
    #[inline]
    pub fn surface_removed(&mut self, e: &SurfaceRemovedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_surface_removed(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PassSummary`].
    #[inline]
    pub fn pass_end(&mut self, s: &PassSummary) {
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_pass_end(s);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = s;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
