// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-pass configuration.

use kurbo::{Size, Vec2};

use crate::error::{DrawPropertiesError, LayerRole};
use crate::layer::{INVALID, LayerId, LayerStore};
use crate::transform::Transform3d;

/// How eligible text is for subpixel (LCD) antialiasing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LcdTextPolicy {
    /// Never use LCD text.
    Disabled,
    /// Use LCD text where the layer is opaque, unscaled and pixel aligned.
    #[default]
    Enabled,
    /// Use LCD text everywhere it is not disabled by an animation.
    AlwaysAllowed,
}

/// Global inputs for one draw-property pass.
///
/// Construct with [`DrawConfig::new`] and refine with the `with_*` methods.
///
/// ```
/// use kurbo::Size;
/// use stratum_core::draw::{DrawConfig, LcdTextPolicy};
///
/// let config = DrawConfig::new(Size::new(800.0, 600.0))
///     .with_device_scale_factor(2.0)
///     .with_lcd_text(LcdTextPolicy::Disabled);
/// assert_eq!(config.max_texture_size, 8192);
/// ```
#[derive(Clone, Debug)]
pub struct DrawConfig {
    /// Size of the device viewport in device pixels.
    pub viewport: Size,
    /// Transform from the root's space to device space, applied before the
    /// device scale.
    pub device_transform: Transform3d,
    /// Ratio of device pixels to layout pixels.
    pub device_scale_factor: f64,
    /// Layer whose children receive [`page_scale_factor`](Self::page_scale_factor).
    pub page_scale_layer: Option<LayerId>,
    /// Pinch-zoom scale.
    pub page_scale_factor: f64,
    /// Inner viewport scroll layer; its parent is a fixed-position container.
    pub inner_viewport_scroll_layer: Option<LayerId>,
    /// Outer viewport scroll layer; its parent is a fixed-position container.
    pub outer_viewport_scroll_layer: Option<LayerId>,
    /// Rubber-band overscroll translation.
    pub elastic_overscroll: Vec2,
    /// Layer whose children receive [`elastic_overscroll`](Self::elastic_overscroll).
    pub elastic_overscroll_layer: Option<LayerId>,
    /// Largest texture dimension a render surface may have.
    pub max_texture_size: u32,
    /// LCD-text policy.
    pub lcd_text: LcdTextPolicy,
    /// Allow render surfaces other than the root's.
    pub can_render_to_separate_surface: bool,
    /// Compute animation contents scales.
    pub can_adjust_raster_scales: bool,
    /// Cross-check results with the verification harness (debug builds).
    pub verify: bool,
    /// The tree is being prepared for activation; fully transparent layers
    /// that may start an opacity animation are kept.
    pub is_pending_tree: bool,
    /// Deepest tree a pass accepts.
    pub max_depth: usize,
}

impl DrawConfig {
    /// Default maximum tree depth.
    pub const DEFAULT_MAX_DEPTH: usize = 256;

    /// Creates a configuration for the given viewport with neutral defaults.
    #[must_use]
    pub const fn new(viewport: Size) -> Self {
        Self {
            viewport,
            device_transform: Transform3d::IDENTITY,
            device_scale_factor: 1.0,
            page_scale_layer: None,
            page_scale_factor: 1.0,
            inner_viewport_scroll_layer: None,
            outer_viewport_scroll_layer: None,
            elastic_overscroll: Vec2::ZERO,
            elastic_overscroll_layer: None,
            max_texture_size: 8192,
            lcd_text: LcdTextPolicy::Enabled,
            can_render_to_separate_surface: true,
            can_adjust_raster_scales: true,
            verify: false,
            is_pending_tree: false,
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets the device transform.
    #[must_use]
    pub fn with_device_transform(mut self, transform: Transform3d) -> Self {
        self.device_transform = transform;
        self
    }

    /// Sets the device scale factor.
    #[must_use]
    pub fn with_device_scale_factor(mut self, scale: f64) -> Self {
        self.device_scale_factor = scale;
        self
    }

    /// Sets the page-scale layer and factor.
    #[must_use]
    pub fn with_page_scale(mut self, layer: LayerId, factor: f64) -> Self {
        self.page_scale_layer = Some(layer);
        self.page_scale_factor = factor;
        self
    }

    /// Sets the inner and outer viewport scroll layers.
    #[must_use]
    pub fn with_viewport_scroll_layers(
        mut self,
        inner: Option<LayerId>,
        outer: Option<LayerId>,
    ) -> Self {
        self.inner_viewport_scroll_layer = inner;
        self.outer_viewport_scroll_layer = outer;
        self
    }

    /// Sets the elastic overscroll and the layer it applies to.
    #[must_use]
    pub fn with_elastic_overscroll(mut self, layer: LayerId, overscroll: Vec2) -> Self {
        self.elastic_overscroll_layer = Some(layer);
        self.elastic_overscroll = overscroll;
        self
    }

    /// Sets the maximum texture size.
    #[must_use]
    pub fn with_max_texture_size(mut self, size: u32) -> Self {
        self.max_texture_size = size;
        self
    }

    /// Sets the LCD-text policy.
    #[must_use]
    pub fn with_lcd_text(mut self, policy: LcdTextPolicy) -> Self {
        self.lcd_text = policy;
        self
    }

    /// Allows or forbids non-root render surfaces.
    #[must_use]
    pub fn with_separate_surfaces(mut self, enabled: bool) -> Self {
        self.can_render_to_separate_surface = enabled;
        self
    }

    /// Enables or disables animation scale estimation.
    #[must_use]
    pub fn with_raster_scale_adjustment(mut self, enabled: bool) -> Self {
        self.can_adjust_raster_scales = enabled;
        self
    }

    /// Enables or disables result verification.
    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Marks the pass as running on a tree that is about to activate.
    #[must_use]
    pub fn with_pending_tree(mut self, pending: bool) -> Self {
        self.is_pending_tree = pending;
        self
    }

    /// Sets the maximum accepted tree depth.
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Checks the configuration against `store` before a pass over `root`.
    ///
    /// # Errors
    ///
    /// Returns the first contract violation found; see
    /// [`DrawPropertiesError`].
    pub fn validate(&self, store: &LayerStore, root: LayerId) -> Result<(), DrawPropertiesError> {
        if !store.is_alive(root) {
            return Err(DrawPropertiesError::StaleRoot);
        }
        if store.parent[root.idx as usize] != INVALID {
            return Err(DrawPropertiesError::RootHasParent);
        }
        let Size { width, height } = self.viewport;
        if !(width.is_finite() && height.is_finite() && width >= 0.0 && height >= 0.0) {
            return Err(DrawPropertiesError::InvalidViewport);
        }
        if self.max_texture_size == 0 {
            return Err(DrawPropertiesError::InvalidMaxTextureSize);
        }
        if !(self.device_scale_factor.is_finite() && self.device_scale_factor > 0.0) {
            return Err(DrawPropertiesError::InvalidDeviceScaleFactor);
        }
        if self.page_scale_factor != 1.0 && self.page_scale_layer.is_none() {
            return Err(DrawPropertiesError::PageScaleWithoutLayer);
        }
        if self.elastic_overscroll != Vec2::ZERO && self.elastic_overscroll_layer.is_none() {
            return Err(DrawPropertiesError::ElasticOverscrollWithoutLayer);
        }

        let configured = [
            (self.page_scale_layer, LayerRole::PageScale),
            (self.elastic_overscroll_layer, LayerRole::ElasticOverscroll),
            (
                self.inner_viewport_scroll_layer,
                LayerRole::InnerViewportScroll,
            ),
            (
                self.outer_viewport_scroll_layer,
                LayerRole::OuterViewportScroll,
            ),
        ];
        for (layer, role) in configured {
            if let Some(layer) = layer
                && !(store.is_alive(layer) && store.has_ancestor_or_self(layer.idx, root.idx))
            {
                return Err(DrawPropertiesError::LayerNotInTree { role });
            }
        }
        Ok(())
    }

    /// Returns the configured layer's slot, or [`INVALID`].
    pub(crate) fn slot(layer: Option<LayerId>) -> u32 {
        layer.map_or(INVALID, |l| l.idx)
    }
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self::new(Size::ZERO)
    }
}
