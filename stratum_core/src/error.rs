// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors returned when a draw-property pass is rejected.
//!
//! Configuration and relation errors are detected before the walk starts.
//! Clip relations that cross a transformed render surface are only found
//! during the walk; the partial outputs are reset before the error is
//! returned. Store API misuse (stale handles, destroying a layer with children)
//! panics instead, as it does everywhere else in the crate.

use core::fmt;

/// The role a layer was configured for in a [`DrawConfig`](crate::draw::DrawConfig).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerRole {
    /// The layer whose children receive the page scale.
    PageScale,
    /// The layer whose children receive the elastic overscroll translation.
    ElasticOverscroll,
    /// The inner viewport scroll layer.
    InnerViewportScroll,
    /// The outer viewport scroll layer.
    OuterViewportScroll,
}

impl fmt::Display for LayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PageScale => "page-scale layer",
            Self::ElasticOverscroll => "elastic-overscroll layer",
            Self::InnerViewportScroll => "inner viewport scroll layer",
            Self::OuterViewportScroll => "outer viewport scroll layer",
        })
    }
}

/// Reasons a draw-property pass refuses to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawPropertiesError {
    /// The root handle does not refer to a live layer.
    StaleRoot,
    /// The root layer has a parent.
    RootHasParent,
    /// The viewport size is negative or not finite.
    InvalidViewport,
    /// The maximum texture size is zero.
    InvalidMaxTextureSize,
    /// The device scale factor is not a positive finite number.
    InvalidDeviceScaleFactor,
    /// A non-unit page scale factor was supplied without a page-scale layer.
    PageScaleWithoutLayer,
    /// A non-zero elastic overscroll was supplied without a layer to apply it to.
    ElasticOverscrollWithoutLayer,
    /// A configured layer is stale or not in the root's subtree.
    LayerNotInTree {
        /// Which configuration slot named the layer.
        role: LayerRole,
    },
    /// A layer's clip parent is not one of its ancestors.
    ClipParentNotAncestor {
        /// Slot index of the clip child.
        layer: u32,
    },
    /// A layer's scroll parent is not below the layer's own parent.
    ScrollParentNotInParentSubtree {
        /// Slot index of the scroll child.
        layer: u32,
    },
    /// Scroll-parent edges between siblings form a cycle.
    ScrollParentCycle {
        /// Slot index of a layer on the cycle.
        layer: u32,
    },
    /// A clip or scroll child's clip would have to be carried through a
    /// render surface that does more than translate.
    ClipRelationCrossesTransformedSurface {
        /// Slot index of the clip or scroll child.
        layer: u32,
        /// Slot index of the owner of the offending surface.
        surface: u32,
    },
    /// The tree is deeper than the configured limit.
    TreeTooDeep {
        /// The configured maximum depth.
        limit: usize,
    },
}

impl fmt::Display for DrawPropertiesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleRoot => f.write_str("root layer handle is stale"),
            Self::RootHasParent => f.write_str("root layer has a parent"),
            Self::InvalidViewport => f.write_str("viewport size must be finite and non-negative"),
            Self::InvalidMaxTextureSize => f.write_str("maximum texture size must be non-zero"),
            Self::InvalidDeviceScaleFactor => {
                f.write_str("device scale factor must be positive and finite")
            }
            Self::PageScaleWithoutLayer => {
                f.write_str("page scale factor is not 1 but no page-scale layer is set")
            }
            Self::ElasticOverscrollWithoutLayer => {
                f.write_str("elastic overscroll is non-zero but no layer is set to apply it")
            }
            Self::LayerNotInTree { role } => write!(f, "{role} is not in the root's subtree"),
            Self::ClipParentNotAncestor { layer } => {
                write!(f, "clip parent of layer {layer} is not an ancestor")
            }
            Self::ScrollParentNotInParentSubtree { layer } => {
                write!(f, "scroll parent of layer {layer} is not below its parent")
            }
            Self::ScrollParentCycle { layer } => {
                write!(f, "scroll parents form a cycle through layer {layer}")
            }
            Self::ClipRelationCrossesTransformedSurface { layer, surface } => write!(
                f,
                "clip of layer {layer} crosses the non-translating surface of layer {surface}"
            ),
            Self::TreeTooDeep { limit } => write!(f, "layer tree exceeds depth limit {limit}"),
        }
    }
}

impl core::error::Error for DrawPropertiesError {}
