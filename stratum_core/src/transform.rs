// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Column-major 4×4 transform.
//!
//! This type covers the subset of 3-D transform math the draw-property engine
//! needs (composition, inversion, flattening, back-face and axis-alignment
//! queries, homogeneous point mapping) without pulling in a full
//! linear-algebra crate.
//!
//! Element accessors use `(row, col)` order; storage is column-major.

use core::ops::Mul;

use kurbo::{Affine, Vec2};
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

/// Tolerance used by the structural predicates (axis alignment, back-face).
const EPSILON: f64 = f32::EPSILON as f64;

/// A column-major 4×4 transform stored as `[[f64; 4]; 4]`.
///
/// Each inner array is one *column* of the matrix, matching the memory layout
/// used by GPU APIs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3d {
    /// Four columns, each a 4-element array `[x, y, z, w]`.
    pub cols: [[f64; 4]; 4],
}

impl Transform3d {
    /// The 4×4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Creates a transform from four column arrays.
    #[inline]
    #[must_use]
    pub const fn from_cols(col0: [f64; 4], col1: [f64; 4], col2: [f64; 4], col3: [f64; 4]) -> Self {
        Self {
            cols: [col0, col1, col2, col3],
        }
    }

    /// Creates a transform from a column-major 2-D array.
    #[inline]
    #[must_use]
    pub const fn from_cols_array_2d(cols: [[f64; 4]; 4]) -> Self {
        Self { cols }
    }

    /// Returns the columns as a 2-D array.
    #[inline]
    #[must_use]
    pub const fn to_cols_array_2d(self) -> [[f64; 4]; 4] {
        self.cols
    }

    /// Returns column `i` (0-based).
    ///
    /// # Panics
    ///
    /// Panics if `i >= 4`.
    #[inline]
    #[must_use]
    pub const fn col(self, i: usize) -> [f64; 4] {
        self.cols[i]
    }

    /// Returns the element at `(row, col)`.
    #[inline]
    #[must_use]
    pub const fn get(&self, row: usize, col: usize) -> f64 {
        self.cols[col][row]
    }

    /// Sets the element at `(row, col)`.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.cols[col][row] = value;
    }

    /// Creates a pure translation transform.
    #[inline]
    #[must_use]
    pub const fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [x, y, z, 1.0],
            ],
        }
    }

    /// Creates a non-uniform scale transform.
    #[inline]
    #[must_use]
    pub const fn from_scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            cols: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, sz, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation around the Z axis (radians).
    #[inline]
    #[must_use]
    pub fn from_rotation_z(radians: f64) -> Self {
        let (s, c) = (radians.sin(), radians.cos());
        Self {
            cols: [
                [c, s, 0.0, 0.0],
                [-s, c, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation around the Y axis (radians).
    #[inline]
    #[must_use]
    pub fn from_rotation_y(radians: f64) -> Self {
        let (s, c) = (radians.sin(), radians.cos());
        Self {
            cols: [
                [c, 0.0, -s, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [s, 0.0, c, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a perspective projection with the given viewer distance.
    ///
    /// A non-positive depth yields the identity.
    #[inline]
    #[must_use]
    pub fn from_perspective(depth: f64) -> Self {
        let mut t = Self::IDENTITY;
        if depth > 0.0 {
            t.set(3, 2, -1.0 / depth);
        }
        t
    }

    /// Embeds a 2-D affine transform.
    #[must_use]
    pub fn from_affine(affine: Affine) -> Self {
        let [a, b, c, d, e, f] = affine.as_coeffs();
        Self {
            cols: [
                [a, b, 0.0, 0.0],
                [c, d, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [e, f, 0.0, 1.0],
            ],
        }
    }

    /// Is this transform [finite]?
    ///
    /// [finite]: f64::is_finite
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.cols.iter().flatten().all(|v| v.is_finite())
    }

    /// Is this transform [NaN]?
    ///
    /// [NaN]: f64::is_nan
    #[inline]
    #[must_use]
    pub fn is_nan(&self) -> bool {
        self.cols.iter().flatten().any(|v| v.is_nan())
    }

    // -- Structural predicates --

    /// Returns `true` if this is exactly the identity.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Returns `true` if the bottom row is anything other than `[0, 0, 0, 1]`.
    #[must_use]
    pub fn has_perspective(&self) -> bool {
        self.get(3, 0) != 0.0 || self.get(3, 1) != 0.0 || self.get(3, 2) != 0.0 || self.get(3, 3) != 1.0
    }

    /// Returns `true` if the transform is the identity or a pure translation.
    #[must_use]
    pub fn is_identity_or_translation(&self) -> bool {
        let c = &self.cols;
        c[0][..3] == [1.0, 0.0, 0.0]
            && c[1][..3] == [0.0, 1.0, 0.0]
            && c[2][..3] == [0.0, 0.0, 1.0]
            && !self.has_perspective()
    }

    /// Returns `true` if the transform is a translation by whole units.
    #[must_use]
    pub fn is_identity_or_integer_translation(&self) -> bool {
        if !self.is_identity_or_translation() {
            return false;
        }
        let t = self.cols[3];
        t[0] == t[0].trunc() && t[1] == t[1].trunc() && t[2] == t[2].trunc()
    }

    /// Returns `true` if the transform only scales and translates.
    #[must_use]
    pub fn is_scale_or_translation(&self) -> bool {
        for col in 0..3 {
            for row in 0..3 {
                if row != col && self.get(row, col) != 0.0 {
                    return false;
                }
            }
        }
        !self.has_perspective()
    }

    /// Returns `true` if an axis-aligned 2-D rectangle stays axis aligned
    /// after being mapped through this transform and projected to z = 0.
    #[must_use]
    pub fn preserves_2d_axis_alignment(&self) -> bool {
        // Only the upper-left 2x2 block and the x/y perspective terms matter
        // for 2-D inputs and 2-D outputs.
        if self.get(3, 0) != 0.0 || self.get(3, 1) != 0.0 {
            return false;
        }
        let nz = |v: f64| usize::from(v.abs() > EPSILON);
        let (a, b, c, d) = (
            nz(self.get(0, 0)),
            nz(self.get(0, 1)),
            nz(self.get(1, 0)),
            nz(self.get(1, 1)),
        );
        a + b <= 1 && c + d <= 1 && a + c <= 1 && b + d <= 1
    }

    /// Returns the 2-D translation component.
    #[inline]
    #[must_use]
    pub fn translation_2d(&self) -> Vec2 {
        Vec2::new(self.get(0, 3), self.get(1, 3))
    }

    /// Returns the lengths of the transformed x and y basis vectors.
    ///
    /// Transforms with perspective return `fallback` for both axes.
    #[must_use]
    pub fn scale_components_2d(&self, fallback: f64) -> Vec2 {
        if self.has_perspective() {
            return Vec2::new(fallback, fallback);
        }
        let axis = |col: usize| {
            let (x, y, z) = (self.get(0, col), self.get(1, col), self.get(2, col));
            (x * x + y * y + z * z).sqrt()
        };
        Vec2::new(axis(0), axis(1))
    }

    // -- Composition --

    /// Returns `self * translation(x, y, z)`: the translation is applied
    /// first, in this transform's source space.
    #[inline]
    #[must_use]
    pub fn pre_translate(self, x: f64, y: f64, z: f64) -> Self {
        self * Self::from_translation(x, y, z)
    }

    /// Returns `self * scale(sx, sy, sz)`.
    #[inline]
    #[must_use]
    pub fn pre_scale(self, sx: f64, sy: f64, sz: f64) -> Self {
        self * Self::from_scale(sx, sy, sz)
    }

    /// Returns `translation(x, y, z) * self`.
    #[inline]
    #[must_use]
    pub fn then_translate(self, x: f64, y: f64, z: f64) -> Self {
        Self::from_translation(x, y, z) * self
    }

    /// Drops the z contribution so the transform maps onto the z = 0 plane.
    #[must_use]
    pub fn flattened(mut self) -> Self {
        self.set(2, 0, 0.0);
        self.set(2, 1, 0.0);
        self.set(0, 2, 0.0);
        self.set(1, 2, 0.0);
        self.set(2, 2, 1.0);
        self.set(3, 2, 0.0);
        self.set(2, 3, 0.0);
        self
    }

    /// Rounds the x/y translation components to whole units.
    #[must_use]
    pub fn round_translation(mut self) -> Self {
        self.set(0, 3, self.get(0, 3).round());
        self.set(1, 3, self.get(1, 3).round());
        self
    }

    // -- Inversion --

    /// Returns the determinant.
    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.adjugate().1
    }

    /// Returns `true` if [`inverse`](Self::inverse) would succeed.
    #[must_use]
    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();
        det != 0.0 && det.is_finite()
    }

    /// Returns the inverse, or `None` if the matrix is singular.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        if self.is_identity_or_translation() {
            let t = self.cols[3];
            return Some(Self::from_translation(-t[0], -t[1], -t[2]));
        }
        let (adj, det) = self.adjugate();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        let mut cols = [[0.0_f64; 4]; 4];
        for (i, v) in adj.iter().enumerate() {
            cols[i / 4][i % 4] = v * inv_det;
        }
        let out = Self { cols };
        out.is_finite().then_some(out)
    }

    /// Returns `true` if a layer facing +z would show its back after being
    /// mapped through this transform.
    ///
    /// Singular transforms are never considered back facing.
    #[must_use]
    pub fn is_back_face_visible(&self) -> bool {
        let (adj, det) = self.adjugate();
        if det == 0.0 {
            return false;
        }
        // The transformed normal's z is cofactor(2, 2) / det; only the sign
        // matters, so compare the product instead of dividing.
        adj[10] * det < -EPSILON
    }

    /// Returns the adjugate in column-major order and the determinant.
    fn adjugate(&self) -> ([f64; 16], f64) {
        let mut m = [0.0_f64; 16];
        for (c, col) in self.cols.iter().enumerate() {
            m[c * 4..c * 4 + 4].copy_from_slice(col);
        }
        let mut inv = [0.0_f64; 16];
        inv[0] = m[5] * m[10] * m[15] - m[5] * m[11] * m[14] - m[9] * m[6] * m[15]
            + m[9] * m[7] * m[14]
            + m[13] * m[6] * m[11]
            - m[13] * m[7] * m[10];
        inv[4] = -m[4] * m[10] * m[15] + m[4] * m[11] * m[14] + m[8] * m[6] * m[15]
            - m[8] * m[7] * m[14]
            - m[12] * m[6] * m[11]
            + m[12] * m[7] * m[10];
        inv[8] = m[4] * m[9] * m[15] - m[4] * m[11] * m[13] - m[8] * m[5] * m[15]
            + m[8] * m[7] * m[13]
            + m[12] * m[5] * m[11]
            - m[12] * m[7] * m[9];
        inv[12] = -m[4] * m[9] * m[14] + m[4] * m[10] * m[13] + m[8] * m[5] * m[14]
            - m[8] * m[6] * m[13]
            - m[12] * m[5] * m[10]
            + m[12] * m[6] * m[9];
        inv[1] = -m[1] * m[10] * m[15] + m[1] * m[11] * m[14] + m[9] * m[2] * m[15]
            - m[9] * m[3] * m[14]
            - m[13] * m[2] * m[11]
            + m[13] * m[3] * m[10];
        inv[5] = m[0] * m[10] * m[15] - m[0] * m[11] * m[14] - m[8] * m[2] * m[15]
            + m[8] * m[3] * m[14]
            + m[12] * m[2] * m[11]
            - m[12] * m[3] * m[10];
        inv[9] = -m[0] * m[9] * m[15] + m[0] * m[11] * m[13] + m[8] * m[1] * m[15]
            - m[8] * m[3] * m[13]
            - m[12] * m[1] * m[11]
            + m[12] * m[3] * m[9];
        inv[13] = m[0] * m[9] * m[14] - m[0] * m[10] * m[13] - m[8] * m[1] * m[14]
            + m[8] * m[2] * m[13]
            + m[12] * m[1] * m[10]
            - m[12] * m[2] * m[9];
        inv[2] = m[1] * m[6] * m[15] - m[1] * m[7] * m[14] - m[5] * m[2] * m[15]
            + m[5] * m[3] * m[14]
            + m[13] * m[2] * m[7]
            - m[13] * m[3] * m[6];
        inv[6] = -m[0] * m[6] * m[15] + m[0] * m[7] * m[14] + m[4] * m[2] * m[15]
            - m[4] * m[3] * m[14]
            - m[12] * m[2] * m[7]
            + m[12] * m[3] * m[6];
        inv[10] = m[0] * m[5] * m[15] - m[0] * m[7] * m[13] - m[4] * m[1] * m[15]
            + m[4] * m[3] * m[13]
            + m[12] * m[1] * m[7]
            - m[12] * m[3] * m[5];
        inv[14] = -m[0] * m[5] * m[14] + m[0] * m[6] * m[13] + m[4] * m[1] * m[14]
            - m[4] * m[2] * m[13]
            - m[12] * m[1] * m[6]
            + m[12] * m[2] * m[5];
        inv[3] = -m[1] * m[6] * m[11] + m[1] * m[7] * m[10] + m[5] * m[2] * m[11]
            - m[5] * m[3] * m[10]
            - m[9] * m[2] * m[7]
            + m[9] * m[3] * m[6];
        inv[7] = m[0] * m[6] * m[11] - m[0] * m[7] * m[10] - m[4] * m[2] * m[11]
            + m[4] * m[3] * m[10]
            + m[8] * m[2] * m[7]
            - m[8] * m[3] * m[6];
        inv[11] = -m[0] * m[5] * m[11] + m[0] * m[7] * m[9] + m[4] * m[1] * m[11]
            - m[4] * m[3] * m[9]
            - m[8] * m[1] * m[7]
            + m[8] * m[3] * m[5];
        inv[15] = m[0] * m[5] * m[10] - m[0] * m[6] * m[9] - m[4] * m[1] * m[10]
            + m[4] * m[2] * m[9]
            + m[8] * m[1] * m[6]
            - m[8] * m[2] * m[5];
        let det = m[0] * inv[0] + m[1] * inv[4] + m[2] * inv[8] + m[3] * inv[12];
        (inv, det)
    }

    // -- Point mapping --

    /// Maps the homogeneous point `(x, y, z, 1)` and returns `[x, y, z, w]`
    /// without dividing by `w`.
    #[must_use]
    pub fn map_homogeneous(&self, x: f64, y: f64, z: f64) -> [f64; 4] {
        let c = &self.cols;
        let mut out = [0.0; 4];
        for (r, o) in out.iter_mut().enumerate() {
            *o = c[0][r] * x + c[1][r] * y + c[2][r] * z + c[3][r];
        }
        out
    }

    /// Maps the 2-D point `(x, y)` along the z axis onto the z = 0 plane of
    /// the destination space and returns the homogeneous result.
    ///
    /// When the source plane is edge-on to the z axis the projection is
    /// undefined and the origin is returned.
    #[must_use]
    pub fn project_homogeneous(&self, x: f64, y: f64) -> [f64; 4] {
        let m22 = self.get(2, 2);
        if m22 == 0.0 {
            return [0.0, 0.0, 0.0, 1.0];
        }
        let z = -(self.get(2, 0) * x + self.get(2, 1) * y + self.get(2, 3)) / m22;
        self.map_homogeneous(x, y, z)
    }
}

impl Default for Transform3d {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Affine> for Transform3d {
    fn from(affine: Affine) -> Self {
        Self::from_affine(affine)
    }
}

impl Mul for Transform3d {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let a = &self.cols;
        let b = &rhs.cols;
        let mut out = [[0.0_f64; 4]; 4];
        let mut j = 0;
        while j < 4 {
            let mut i = 0;
            while i < 4 {
                out[j][i] =
                    a[0][i] * b[j][0] + a[1][i] * b[j][1] + a[2][i] * b[j][2] + a[3][i] * b[j][3];
                i += 1;
            }
            j += 1;
        }
        Self { cols: out }
    }
}
