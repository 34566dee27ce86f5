// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The draw-property engine.
//!
//! [`LayerStore::calculate_draw_properties`] runs one pass over a layer tree:
//!
//! 1. **Validate** the [`DrawConfig`] against the store.
//! 2. **Reset** every slot's [`DrawProperties`] and [`RenderSurface`].
//! 3. **Pre-pass**: subtree aggregates, relation checks, depth limit and
//!    scroll-parent-first child orders.
//! 4. **Walk**: transforms, clips, opacity, render surfaces and layer lists.
//! 5. **Drain** the dirty channels into [`DrawPass::changed`].
//! 6. **Verify** (optional) against an independent recomputation.
//!
//! Results are read back through the store accessors
//! ([`LayerStore::draw_properties`], [`LayerStore::render_surface`]) and the
//! returned [`DrawPass`].

mod config;
mod list;
mod prepass;
mod properties;
mod surface;
pub mod verify;
mod walk;

#[cfg(test)]
mod tests;

use alloc::vec::Vec;

pub use config::{DrawConfig, LcdTextPolicy};
pub use properties::{DrawProperties, RenderSurface};
pub use surface::SurfaceReason;

use crate::dirty;
use crate::error::DrawPropertiesError;
use crate::layer::{LayerId, LayerStore};
use crate::trace::{PassBeginEvent, PassSummary, Tracer};

/// The result of one draw-property pass.
#[derive(Clone, Debug, Default)]
pub struct DrawPass {
    /// Slot indices of the layers owning render surfaces, in tree pre-order:
    /// the root's surface first and every surface after the target it draws
    /// into. Rasterizers draw the list back to front so that contributing
    /// surfaces are ready before their targets.
    pub render_surface_layer_list: Vec<u32>,
    /// Slot indices whose inputs changed since the previous pass, sorted and
    /// deduplicated.
    pub changed: Vec<u32>,
    /// Layers were added, removed or moved since the previous pass.
    pub topology_changed: bool,
    /// Pass generation.
    pub generation: u64,
}

impl DrawPass {
    /// Iterates the render surfaces in drawing order together with their
    /// owning slots.
    pub fn surfaces<'a>(
        &'a self,
        store: &'a LayerStore,
    ) -> impl Iterator<Item = (u32, &'a RenderSurface)> + 'a {
        self.render_surface_layer_list
            .iter()
            .map(|&idx| (idx, &store.surface[idx as usize]))
    }

    /// Number of layer-list entries across all surfaces that are layers
    /// drawing their own content (not contributing child surfaces).
    #[must_use]
    pub fn layers_drawn(&self, store: &LayerStore) -> usize {
        self.surfaces(store)
            .map(|(owner, s)| {
                s.layer_list
                    .iter()
                    .filter(|&&l| l == owner || store.draw[l as usize].render_target != l)
                    .count()
            })
            .sum()
    }
}

impl LayerStore {
    /// Computes draw properties for the tree rooted at `root`.
    ///
    /// Every live slot's outputs are reset first; layers not reached keep the
    /// reset values (`render_target` is
    /// [`INVALID`](crate::layer::INVALID)).
    ///
    /// # Errors
    ///
    /// Returns [`DrawPropertiesError`] if the configuration or the tree's
    /// relations are malformed. Every output is left in its reset state in
    /// that case.
    ///
    /// # Panics
    ///
    /// Panics if `root` is stale, on internal invariant violations, and (in
    /// debug builds with [`DrawConfig::verify`] set) if verification finds a
    /// mismatch.
    pub fn calculate_draw_properties(
        &mut self,
        root: LayerId,
        config: &DrawConfig,
        tracer: &mut Tracer<'_>,
    ) -> Result<DrawPass, DrawPropertiesError> {
        config.validate(self, root)?;

        self.pass_generation += 1;
        let generation = self.pass_generation;
        self.reset_outputs();
        tracer.pass_begin(&PassBeginEvent {
            generation,
            root: root.idx,
            layer_slots: self.len,
        });

        let walked = prepass::run(self, root.idx, config.max_depth)
            .and_then(|()| walk::run(self, root.idx, config, tracer));
        let (render_surface_layer_list, stats) = match walked {
            Ok(walked) => walked,
            Err(err) => {
                self.reset_outputs();
                return Err(err);
            }
        };

        let changed = self.drain_changes();
        let topology_changed = {
            let topology: Vec<u32> = self
                .dirty
                .drain(dirty::TOPOLOGY)
                .deterministic()
                .run()
                .collect();
            !topology.is_empty()
        };
        self.needs_update = false;

        let pass = DrawPass {
            render_surface_layer_list,
            changed,
            topology_changed,
            generation,
        };

        if config.verify && cfg!(debug_assertions) {
            let mismatches = verify::verify_draw_properties(self, root, config);
            assert!(
                mismatches.is_empty(),
                "draw properties disagree with the reference computation: {mismatches:?}"
            );
        }

        tracer.pass_end(&PassSummary {
            generation,
            layers_visited: stats.layers_visited,
            render_surfaces: u32::try_from(pass.render_surface_layer_list.len())
                .unwrap_or(u32::MAX),
            layers_drawn: u32::try_from(pass.layers_drawn(self)).unwrap_or(u32::MAX),
            changed: u32::try_from(pass.changed.len()).unwrap_or(u32::MAX),
        });
        Ok(pass)
    }

    fn reset_outputs(&mut self) {
        for d in &mut self.draw {
            d.reset();
        }
        for s in &mut self.surface {
            s.reset();
        }
    }

    /// Union of the layers marked on the geometry, effects and relations
    /// channels.
    fn drain_changes(&mut self) -> Vec<u32> {
        let mut changed: Vec<u32> = self
            .dirty
            .drain(dirty::GEOMETRY)
            .affected()
            .deterministic()
            .run()
            .collect();
        changed.extend(
            self.dirty
                .drain(dirty::EFFECTS)
                .affected()
                .deterministic()
                .run(),
        );
        changed.extend(self.dirty.drain(dirty::RELATIONS).deterministic().run());
        // Destroyed slots may still be queued.
        changed.retain(|&idx| idx < self.len && self.free_list.iter().all(|&f| f != idx));
        changed.sort_unstable();
        changed.dedup();
        changed
    }

    /// Returns the draw properties computed by the last pass.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn draw_properties(&self, id: LayerId) -> &DrawProperties {
        self.validate(id);
        &self.draw[id.idx as usize]
    }

    /// Returns the draw properties of a slot index, as found in layer lists.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of range.
    #[must_use]
    pub fn draw_properties_at(&self, idx: u32) -> &DrawProperties {
        assert!(idx < self.len, "slot {idx} out of range");
        &self.draw[idx as usize]
    }

    /// Returns the layer's render surface if it owned one in the last pass.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn render_surface(&self, id: LayerId) -> Option<&RenderSurface> {
        self.validate(id);
        self.render_surface_at(id.idx)
    }

    /// Returns the render surface owned by a slot index, if any.
    #[must_use]
    pub fn render_surface_at(&self, idx: u32) -> Option<&RenderSurface> {
        let i = idx as usize;
        (idx < self.len && self.draw[i].has_render_surface).then(|| &self.surface[i])
    }

    /// Returns the owner of the surface the layer draws into, or `None` if
    /// the last pass did not reach the layer.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn render_target(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.handle(self.draw[id.idx as usize].render_target)
    }

    /// Generation of the last pass, `0` before the first.
    #[must_use]
    pub fn pass_generation(&self) -> u64 {
        self.pass_generation
    }
}
