// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`DrawTraceSink`] and writes one line per
//! event to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use stratum_core::draw::SurfaceReason;
use stratum_core::trace::{
    DrawTraceSink, PassBeginEvent, PassSummary, SkipReason, SubtreeSkippedEvent,
    SurfaceCreatedEvent, SurfaceRemoval, SurfaceRemovedEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the destination, consuming the sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Short name of a surface reason.
pub fn surface_reason_name(reason: SurfaceReason) -> &'static str {
    match reason {
        SurfaceReason::Mask => "mask",
        SurfaceReason::Replica => "replica",
        SurfaceReason::Filters => "filters",
        SurfaceReason::FilterAnimationPending => "filter-animation",
        SurfaceReason::FlattensExisting3dContext => "flattens-3d-context",
        SurfaceReason::BlendMode => "blend-mode",
        SurfaceReason::NonAxisAlignedClip => "non-axis-aligned-clip",
        SurfaceReason::GroupOpacity => "group-opacity",
        SurfaceReason::Root => "root",
        SurfaceReason::IsolatedGroup => "isolated-group",
        SurfaceReason::Forced => "forced",
        SurfaceReason::CopyRequest => "copy-request",
    }
}

fn skip_reason_name(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::SingularTransform => "singular-transform",
        SkipReason::NotDrawn => "not-drawn",
        SkipReason::ZeroOpacity => "zero-opacity",
        SkipReason::BackFacingSurface => "back-facing",
    }
}

fn removal_name(reason: SurfaceRemoval) -> &'static str {
    match reason {
        SurfaceRemoval::EmptyLayerList => "empty-layer-list",
        SurfaceRemoval::EmptyContentRect => "empty-content-rect",
    }
}

impl<W: Write> DrawTraceSink for PrettyPrintSink<W> {
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[pass:begin] gen={} root={} slots={}",
            e.generation, e.root, e.layer_slots,
        );
    }

    fn on_surface_created(&mut self, e: &SurfaceCreatedEvent) {
        let _ = writeln!(
            self.writer,
            "[surface] layer={} reason={}",
            e.layer,
            surface_reason_name(e.reason),
        );
    }

    fn on_subtree_skipped(&mut self, e: &SubtreeSkippedEvent) {
        let _ = writeln!(
            self.writer,
            "[skip] layer={} reason={}",
            e.layer,
            skip_reason_name(e.reason),
        );
    }

    fn on_surface_removed(&mut self, e: &SurfaceRemovedEvent) {
        let _ = writeln!(
            self.writer,
            "[surface:removed] layer={} reason={}",
            e.layer,
            removal_name(e.reason),
        );
    }

    fn on_pass_end(&mut self, s: &PassSummary) {
        let _ = writeln!(
            self.writer,
            "[pass:end] gen={} visited={} surfaces={} drawn={} changed={}",
            s.generation, s.layers_visited, s.render_surfaces, s.layers_drawn, s.changed,
        );
    }
}
