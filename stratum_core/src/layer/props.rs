// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Input property types set on layers by the scene-graph owner.

use kurbo::Vec2;

/// Per-layer boolean flags.
///
/// The defaults describe a double-sided, flattening grouping layer that draws
/// nothing itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerFlags {
    /// Hides the layer and its entire subtree.
    ///
    /// A pending copy request still forces the layer to be drawn.
    pub hidden: bool,
    /// Whether the back face of the layer is drawn.
    pub double_sided: bool,
    /// Whether the layer flattens its subtree onto its own plane.
    ///
    /// Clearing this lets descendants share the layer's 3D space.
    pub should_flatten_transform: bool,
    /// Forces the layer to own a render surface.
    pub force_render_surface: bool,
    /// Clips the subtree to the layer's bounds.
    pub masks_to_bounds: bool,
    /// Every pixel within the layer's bounds is opaque.
    pub contents_opaque: bool,
    /// The layer has content of its own to draw.
    pub draws_content: bool,
    /// Blending in this subtree must not read outside it.
    pub is_root_for_isolated_group: bool,
    /// Back-face visibility is decided by the parent's transform.
    pub use_parent_backface_visibility: bool,
    /// Fixed-position descendants are positioned relative to this layer.
    pub is_container_for_fixed_position: bool,
    /// The layer handles wheel events.
    pub has_wheel_handlers: bool,
    /// The layer presents externally produced content that may draw outside
    /// its bounds unless clipped.
    pub has_delegated_content: bool,
}

impl Default for LayerFlags {
    fn default() -> Self {
        Self {
            hidden: false,
            double_sided: true,
            should_flatten_transform: true,
            force_render_surface: false,
            masks_to_bounds: false,
            contents_opaque: false,
            draws_content: false,
            is_root_for_isolated_group: false,
            use_parent_backface_visibility: false,
            is_container_for_fixed_position: false,
            has_wheel_handlers: false,
            has_delegated_content: false,
        }
    }
}

/// How a layer's content is composited with what is behind it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Standard source-over alpha compositing.
    #[default]
    SourceOver,
    /// Multiply blend.
    Multiply,
    /// Screen blend.
    Screen,
    /// Overlay blend.
    Overlay,
    /// Darken blend.
    Darken,
    /// Lighten blend.
    Lighten,
    /// Difference blend.
    Difference,
    /// Luminosity blend.
    Luminosity,
}

/// A single entry of a filter or background-filter list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterOperation {
    /// Gaussian blur with the given standard deviation.
    Blur(f32),
    /// Scales color channels.
    Brightness(f32),
    /// Multiplies alpha.
    Opacity(f32),
    /// Desaturates by the given amount.
    Grayscale(f32),
    /// Offset, blurred copy of the alpha mask drawn underneath.
    DropShadow {
        /// Shadow offset.
        offset: Vec2,
        /// Blur standard deviation.
        blur: f32,
    },
}

/// Fixed-position constraint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PositionConstraint {
    /// The layer stays put while its ancestors up to the nearest fixed
    /// container scroll.
    pub is_fixed_position: bool,
    /// Follow the container's right edge when it resizes.
    pub anchored_right: bool,
    /// Follow the container's bottom edge when it resizes.
    pub anchored_bottom: bool,
}

/// A running scale animation as resolved by the animation system.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScaleAnimation {
    /// Largest scale the animation reaches, if it can be determined.
    pub maximum_target_scale: Option<f32>,
    /// Scale at the start of the animation, if it can be determined.
    pub starting_scale: Option<f32>,
}

/// Animation state supplied by the external animation system.
///
/// The engine never interpolates; it only uses these flags to decide what
/// may be culled and how conservative raster scales must be.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AnimationState {
    /// A transform animation is running.
    pub transform_is_animating: bool,
    /// An opacity animation is running.
    pub opacity_is_animating: bool,
    /// An opacity animation may start without a new commit.
    pub opacity_can_animate: bool,
    /// A filter animation has not produced its first value yet.
    pub filter_animation_pending: bool,
    /// A running animation that affects scale, if any.
    pub scale: Option<ScaleAnimation>,
}
