//! 4x4 matrices and 3-vectors.
//!
//! Matrices are stored row-major and transform row vectors (`p' = p * M`, translation in row 3).
//! `multiply(a, b)` therefore means "apply `a`, then `b`". Uploading the raw storage to a
//! column-major shader matrix yields the column-vector form, so shaders compute
//! `proj * view * model * p`. Projections are left-handed with clip depth in 0..1.

use bytemuck::{Pod, Zeroable};

pub type Vec3 = [f32; 3];

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Matrix {
    pub m: [f32; 16],
}

impl Default for Matrix {
    fn default() -> Self {
        identity()
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        m: [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
    };

    pub fn from_rows(m: [f32; 16]) -> Self {
        Self { m }
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.m[row * 4 + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.m[row * 4 + col] = value;
    }

    /// True when every element is within `eps` of `other`.
    pub fn approx_eq(&self, other: &Matrix, eps: f32) -> bool {
        self.m.iter().zip(other.m.iter()).all(|(a, b)| (a - b).abs() <= eps)
    }
}

pub fn identity() -> Matrix {
    Matrix::IDENTITY
}

/// Composition: the result applies `a` first, then `b`.
pub fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    let mut out = Matrix { m: [0.0; 16] };
    for r in 0..4 {
        for c in 0..4 {
            let mut sum = 0.0;
            for k in 0..4 {
                sum += a.at(r, k) * b.at(k, c);
            }
            out.set(r, c, sum);
        }
    }
    out
}

pub fn translation(x: f32, y: f32, z: f32) -> Matrix {
    let mut out = identity();
    out.set(3, 0, x);
    out.set(3, 1, y);
    out.set(3, 2, z);
    out
}

pub fn scale(x: f32, y: f32, z: f32) -> Matrix {
    let mut out = identity();
    out.set(0, 0, x);
    out.set(1, 1, y);
    out.set(2, 2, z);
    out
}

fn rotation_x(rad: f32) -> Matrix {
    let (s, c) = rad.sin_cos();
    Matrix::from_rows([1.0, 0.0, 0.0, 0.0, 0.0, c, s, 0.0, 0.0, -s, c, 0.0, 0.0, 0.0, 0.0, 1.0])
}

fn rotation_y(rad: f32) -> Matrix {
    let (s, c) = rad.sin_cos();
    Matrix::from_rows([c, 0.0, -s, 0.0, 0.0, 1.0, 0.0, 0.0, s, 0.0, c, 0.0, 0.0, 0.0, 0.0, 1.0])
}

fn rotation_z(rad: f32) -> Matrix {
    let (s, c) = rad.sin_cos();
    Matrix::from_rows([c, s, 0.0, 0.0, -s, c, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0])
}

/// Euler rotation in degrees, applied about X, then Y, then Z.
pub fn rotation(x_deg: f32, y_deg: f32, z_deg: f32) -> Matrix {
    let rx = rotation_x(x_deg.to_radians());
    let ry = rotation_y(y_deg.to_radians());
    let rz = rotation_z(z_deg.to_radians());
    multiply(&multiply(&rx, &ry), &rz)
}

/// Left-handed view matrix looking from `eye` towards `center`.
pub fn look_at(eye: Vec3, center: Vec3, up: Vec3) -> Matrix {
    let z = normalize(sub(center, eye));
    let x = normalize(cross(up, z));
    let y = cross(z, x);
    Matrix::from_rows([
        x[0], y[0], z[0], 0.0,
        x[1], y[1], z[1], 0.0,
        x[2], y[2], z[2], 0.0,
        -dot(x, eye), -dot(y, eye), -dot(z, eye), 1.0,
    ])
}

/// Left-handed perspective projection; `near` maps to depth 0 and `far` to depth 1.
pub fn perspective(fov_rad: f32, aspect: f32, near: f32, far: f32) -> Matrix {
    let ys = 1.0 / (fov_rad * 0.5).tan();
    let xs = ys / aspect;
    let q = far / (far - near);
    Matrix::from_rows([
        xs, 0.0, 0.0, 0.0,
        0.0, ys, 0.0, 0.0,
        0.0, 0.0, q, 1.0,
        0.0, 0.0, -near * q, 0.0,
    ])
}

/// Screen-space orthographic projection over a viewport rectangle, origin top-left, y down.
pub fn ortho_2d(x: f32, y: f32, width: f32, height: f32, near: f32, far: f32) -> Matrix {
    let (l, r, t, b) = (x, x + width, y, y + height);
    Matrix::from_rows([
        2.0 / (r - l), 0.0, 0.0, 0.0,
        0.0, 2.0 / (t - b), 0.0, 0.0,
        0.0, 0.0, 1.0 / (far - near), 0.0,
        (l + r) / (l - r), (t + b) / (b - t), near / (near - far), 1.0,
    ])
}

pub fn transpose(m: &Matrix) -> Matrix {
    let mut out = Matrix { m: [0.0; 16] };
    for r in 0..4 {
        for c in 0..4 {
            out.set(c, r, m.at(r, c));
        }
    }
    out
}

fn minor3(m: &Matrix, skip_row: usize, skip_col: usize) -> f32 {
    let mut e = [0.0f32; 9];
    let mut i = 0;
    for r in (0..4).filter(|&r| r != skip_row) {
        for c in (0..4).filter(|&c| c != skip_col) {
            e[i] = m.at(r, c);
            i += 1;
        }
    }
    e[0] * (e[4] * e[8] - e[5] * e[7]) - e[1] * (e[3] * e[8] - e[5] * e[6]) + e[2] * (e[3] * e[7] - e[4] * e[6])
}

fn cofactor(m: &Matrix, row: usize, col: usize) -> f32 {
    let sign = if (row + col) % 2 == 0 { 1.0 } else { -1.0 };
    sign * minor3(m, row, col)
}

/// Cofactor expansion along the first row.
pub fn determinant(m: &Matrix) -> f32 {
    (0..4).map(|c| m.at(0, c) * cofactor(m, 0, c)).sum()
}

/// Adjugate over determinant. A singular input yields non-finite elements.
pub fn inverse(m: &Matrix) -> Matrix {
    let inv_det = 1.0 / determinant(m);
    let mut out = Matrix { m: [0.0; 16] };
    for r in 0..4 {
        for c in 0..4 {
            out.set(c, r, cofactor(m, r, c) * inv_det);
        }
    }
    out
}

/// Transforms `p` as a point (w = 1) and returns the full homogeneous result.
pub fn transform_point4(m: &Matrix, p: Vec3) -> [f32; 4] {
    let mut out = [0.0; 4];
    for (c, o) in out.iter_mut().enumerate() {
        *o = p[0] * m.at(0, c) + p[1] * m.at(1, c) + p[2] * m.at(2, c) + m.at(3, c);
    }
    out
}

/// Transforms `p` as a point (w = 1), dropping w.
pub fn transform_point(m: &Matrix, p: Vec3) -> Vec3 {
    let [x, y, z, _] = transform_point4(m, p);
    [x, y, z]
}

/// Transforms `v` as a direction (w = 0).
pub fn transform_vector(m: &Matrix, v: Vec3) -> Vec3 {
    let mut out = [0.0; 3];
    for (c, o) in out.iter_mut().enumerate() {
        *o = v[0] * m.at(0, c) + v[1] * m.at(1, c) + v[2] * m.at(2, c);
    }
    out
}

#[inline]
pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn scale3(v: Vec3, s: f32) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

#[inline]
pub fn dot(a: Vec3, b: Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [a[1] * b[2] - a[2] * b[1], a[2] * b[0] - a[0] * b[2], a[0] * b[1] - a[1] * b[0]]
}

#[inline]
pub fn length(v: Vec3) -> f32 {
    dot(v, v).sqrt()
}

/// Unit vector along `v`; a zero vector is returned unchanged.
pub fn normalize(v: Vec3) -> Vec3 {
    let len = length(v);
    if len > 0.0 {
        scale3(v, 1.0 / len)
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Matrix {
        multiply(&multiply(&rotation(30.0, -45.0, 10.0), &scale(2.0, 0.5, 3.0)), &translation(4.0, -1.0, 7.0))
    }

    #[test]
    fn multiply_by_identity_is_exact() {
        let m = sample();
        assert_eq!(multiply(&m, &identity()), m);
        assert_eq!(multiply(&identity(), &m), m);
    }

    #[test]
    fn inverse_round_trips() {
        let m = sample();
        assert!(inverse(&inverse(&m)).approx_eq(&m, 1e-4));
        assert!(multiply(&m, &inverse(&m)).approx_eq(&identity(), 1e-5));
    }

    #[test]
    fn singular_inverse_is_not_finite() {
        let m = scale(1.0, 0.0, 1.0);
        assert_eq!(determinant(&m), 0.0);
        assert!(inverse(&m).m.iter().any(|v| !v.is_finite()));
    }

    #[test]
    fn determinant_of_scale_is_product() {
        assert!((determinant(&scale(2.0, 3.0, 4.0)) - 24.0).abs() < 1e-6);
        assert!((determinant(&rotation(10.0, 20.0, 30.0)) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn multiply_applies_left_operand_first() {
        // scale then translate: the translation is not scaled
        let m = multiply(&scale(2.0, 2.0, 2.0), &translation(1.0, 0.0, 0.0));
        let p = transform_point(&m, [1.0, 1.0, 1.0]);
        assert_eq!(p, [3.0, 2.0, 2.0]);
    }

    #[test]
    fn rotation_z_turns_x_into_y() {
        let p = transform_point(&rotation(0.0, 0.0, 90.0), [1.0, 0.0, 0.0]);
        assert!((p[0]).abs() < 1e-6 && (p[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn transpose_is_involution() {
        let m = sample();
        assert_eq!(transpose(&transpose(&m)), m);
        assert_eq!(transpose(&m).at(1, 3), m.at(3, 1));
    }

    #[test]
    fn ortho_maps_viewport_corners_to_clip_corners() {
        let m = ortho_2d(0.0, 0.0, 800.0, 600.0, -999.0, 999.0);
        let tl = transform_point4(&m, [0.0, 0.0, 0.0]);
        let br = transform_point4(&m, [800.0, 600.0, 0.0]);
        assert!((tl[0] + 1.0).abs() < 1e-6 && (tl[1] - 1.0).abs() < 1e-6);
        assert!((br[0] - 1.0).abs() < 1e-6 && (br[1] + 1.0).abs() < 1e-6);
        assert!((tl[2] - 0.5).abs() < 1e-6);
        assert_eq!(tl[3], 1.0);
    }

    #[test]
    fn perspective_depth_range_is_zero_to_one() {
        let m = perspective(60f32.to_radians(), 4.0 / 3.0, 0.5, 100.0);
        let near = transform_point4(&m, [0.0, 0.0, 0.5]);
        let far = transform_point4(&m, [0.0, 0.0, 100.0]);
        assert!((near[2] / near[3]).abs() < 1e-6);
        assert!((far[2] / far[3] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn look_at_puts_target_on_positive_z() {
        let view = look_at([0.0, 0.0, -5.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let p = transform_point(&view, [0.0, 0.0, 0.0]);
        assert!((p[0]).abs() < 1e-6 && (p[1]).abs() < 1e-6 && (p[2] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn vector_helpers() {
        assert_eq!(cross([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]), [0.0, 0.0, 1.0]);
        let n = normalize([0.0, 3.0, 4.0]);
        assert!((n[1] - 0.6).abs() < 1e-6 && (n[2] - 0.8).abs() < 1e-6);
        assert_eq!(normalize([0.0; 3]), [0.0; 3]);
        assert_eq!(length([2.0, 3.0, 6.0]), 7.0);
    }
}
