// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Non-tree relations between layers.
//!
//! Scroll parents, clip parents, masks and replicas are lookups, never
//! ownership. Each relation is stored on both ends so that either side can be
//! queried in O(1) and destroying a layer can detach it cleanly.

use alloc::vec::Vec;

use super::id::{INVALID, LayerId};
use super::store::LayerStore;
use crate::dirty;

impl LayerStore {
    /// Sets (or clears) the layer whose scrolling this layer follows.
    ///
    /// The scroll parent must be a descendant of the layer's tree parent that
    /// is not inside the layer's own subtree. That is checked when draw
    /// properties are computed, since the tree may still be under
    /// construction here.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale or a layer is made its own scroll parent.
    pub fn set_scroll_parent(&mut self, id: LayerId, scroll_parent: Option<LayerId>) {
        self.validate(id);
        let idx = id.idx;
        let new = scroll_parent.map_or(INVALID, |p| {
            self.validate(p);
            p.idx
        });
        assert!(new != idx, "layer cannot be its own scroll parent");

        let old = self.scroll_parent[idx as usize];
        if old == new {
            return;
        }
        if old != INVALID {
            self.scroll_children[old as usize].retain(|&c| c != idx);
            self.touch(old, dirty::RELATIONS, false);
        }
        if new != INVALID {
            self.scroll_children[new as usize].push(idx);
            self.touch(new, dirty::RELATIONS, false);
        }
        self.scroll_parent[idx as usize] = new;
        self.touch(idx, dirty::RELATIONS, false);
        self.touch(idx, dirty::GEOMETRY, true);
    }

    /// Returns the layer whose scrolling this layer follows.
    #[must_use]
    pub fn scroll_parent(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.handle(self.scroll_parent[id.idx as usize])
    }

    /// Returns the layers naming `id` as their scroll parent.
    #[must_use]
    pub fn scroll_children(&self, id: LayerId) -> Vec<LayerId> {
        self.validate(id);
        self.scroll_children[id.idx as usize]
            .iter()
            .filter_map(|&c| self.handle(c))
            .collect()
    }

    /// Sets (or clears) the ancestor whose clip applies to this layer instead
    /// of the clip inherited from its tree parent.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale or a layer is made its own clip parent.
    pub fn set_clip_parent(&mut self, id: LayerId, clip_parent: Option<LayerId>) {
        self.validate(id);
        let idx = id.idx;
        let new = clip_parent.map_or(INVALID, |p| {
            self.validate(p);
            p.idx
        });
        assert!(new != idx, "layer cannot be its own clip parent");

        let old = self.clip_parent[idx as usize];
        if old == new {
            return;
        }
        if old != INVALID {
            self.clip_children[old as usize].retain(|&c| c != idx);
            self.touch(old, dirty::RELATIONS, false);
        }
        if new != INVALID {
            self.clip_children[new as usize].push(idx);
            self.touch(new, dirty::RELATIONS, false);
        }
        self.clip_parent[idx as usize] = new;
        self.touch(idx, dirty::RELATIONS, false);
        self.touch(idx, dirty::GEOMETRY, true);
    }

    /// Returns the layer's clip parent.
    #[must_use]
    pub fn clip_parent(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.handle(self.clip_parent[id.idx as usize])
    }

    /// Returns the layers naming `id` as their clip parent.
    #[must_use]
    pub fn clip_children(&self, id: LayerId) -> Vec<LayerId> {
        self.validate(id);
        self.clip_children[id.idx as usize]
            .iter()
            .filter_map(|&c| self.handle(c))
            .collect()
    }

    /// Sets (or clears) the mask layer of `id`.
    ///
    /// The mask must be a parentless layer not attached to anything else.
    /// Giving a layer a mask forces it to own a render surface.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale, the mask has a parent, or the mask is
    /// already attached to another layer.
    pub fn set_mask_layer(&mut self, id: LayerId, mask: Option<LayerId>) {
        self.validate(id);
        let new = self.check_attachable(id, mask);
        let old = core::mem::replace(&mut self.mask_layer[id.idx as usize], new);
        self.reattach(id.idx, old, new);
    }

    /// Returns the mask layer of `id`.
    #[must_use]
    pub fn mask_layer(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.handle(self.mask_layer[id.idx as usize])
    }

    /// Sets (or clears) the replica layer of `id`.
    ///
    /// The replica's position, transform and origin describe where the
    /// reflected copy of `id`'s surface is drawn.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`set_mask_layer`](Self::set_mask_layer).
    pub fn set_replica_layer(&mut self, id: LayerId, replica: Option<LayerId>) {
        self.validate(id);
        let new = self.check_attachable(id, replica);
        let old = core::mem::replace(&mut self.replica_layer[id.idx as usize], new);
        self.reattach(id.idx, old, new);
    }

    /// Returns the replica layer of `id`.
    #[must_use]
    pub fn replica_layer(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.handle(self.replica_layer[id.idx as usize])
    }

    /// Returns the layer a mask or replica layer is attached to.
    #[must_use]
    pub fn attached_to(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.handle(self.attached_to[id.idx as usize])
    }

    /// Clears every relation naming `idx`, on both ends.
    pub(crate) fn detach_relations(&mut self, idx: u32) {
        let i = idx as usize;

        let scroll_parent = core::mem::replace(&mut self.scroll_parent[i], INVALID);
        if scroll_parent != INVALID {
            self.scroll_children[scroll_parent as usize].retain(|&c| c != idx);
            self.touch(scroll_parent, dirty::RELATIONS, false);
        }
        for child in core::mem::take(&mut self.scroll_children[i]) {
            self.scroll_parent[child as usize] = INVALID;
            self.touch(child, dirty::GEOMETRY, true);
        }

        let clip_parent = core::mem::replace(&mut self.clip_parent[i], INVALID);
        if clip_parent != INVALID {
            self.clip_children[clip_parent as usize].retain(|&c| c != idx);
            self.touch(clip_parent, dirty::RELATIONS, false);
        }
        for child in core::mem::take(&mut self.clip_children[i]) {
            self.clip_parent[child as usize] = INVALID;
            self.touch(child, dirty::GEOMETRY, true);
        }

        for attached in [
            core::mem::replace(&mut self.mask_layer[i], INVALID),
            core::mem::replace(&mut self.replica_layer[i], INVALID),
        ] {
            if attached != INVALID {
                self.attached_to[attached as usize] = INVALID;
            }
        }

        let owner = core::mem::replace(&mut self.attached_to[i], INVALID);
        if owner != INVALID {
            let o = owner as usize;
            if self.mask_layer[o] == idx {
                self.mask_layer[o] = INVALID;
            }
            if self.replica_layer[o] == idx {
                self.replica_layer[o] = INVALID;
            }
            self.touch(owner, dirty::EFFECTS, true);
        }
    }

    fn check_attachable(&self, owner: LayerId, attached: Option<LayerId>) -> u32 {
        let Some(layer) = attached else {
            return INVALID;
        };
        self.validate(layer);
        let a = layer.idx as usize;
        assert!(layer != owner, "layer cannot be attached to itself");
        assert!(
            self.parent[a] == INVALID,
            "mask and replica layers must not have a parent"
        );
        assert!(
            self.attached_to[a] == INVALID || self.attached_to[a] == owner.idx,
            "layer is already attached to another layer"
        );
        layer.idx
    }

    fn reattach(&mut self, owner: u32, old: u32, new: u32) {
        if old == new {
            return;
        }
        if old != INVALID {
            self.attached_to[old as usize] = INVALID;
            self.touch(old, dirty::RELATIONS, false);
        }
        if new != INVALID {
            self.attached_to[new as usize] = owner;
            self.touch(new, dirty::RELATIONS, false);
        }
        self.touch(owner, dirty::RELATIONS, false);
        self.touch(owner, dirty::EFFECTS, true);
    }
}
