//! # 3×3 矩阵工具
//!
//! 行列式、转置、求逆、矩阵·向量。
//!
//! ## 依赖关系
//! - 被 `math/lattice.rs` 使用
//! - 使用 `error.rs`

use crate::error::{Result, StructuraError};

/// 3×3 矩阵（行优先）
pub type Matrix3 = [[f64; 3]; 3];

/// 三维向量
pub type Vec3 = [f64; 3];

/// 奇异判据
pub const SINGULAR_EPSILON: f64 = 1e-10;

/// 行列式
pub fn det3x3(m: &Matrix3) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

pub fn transpose(m: &Matrix3) -> Matrix3 {
    [
        [m[0][0], m[1][0], m[2][0]],
        [m[0][1], m[1][1], m[2][1]],
        [m[0][2], m[1][2], m[2][2]],
    ]
}

/// m · v（v 视为列向量）
pub fn mat_vec(m: &Matrix3, v: &Vec3) -> Vec3 {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// 伴随矩阵法求逆
///
/// `|det| < 1e-10` 时返回 `SingularMatrix`。
pub fn invert3x3(m: &Matrix3) -> Result<Matrix3> {
    let det = det3x3(m);
    if det.abs() < SINGULAR_EPSILON || !det.is_finite() {
        return Err(StructuraError::SingularMatrix { determinant: det });
    }

    Ok([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) / det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) / det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
        ],
    ])
}

pub fn norm(v: &Vec3) -> f64 {
    dot(v, v).sqrt()
}

pub fn dot(u: &Vec3, v: &Vec3) -> f64 {
    u[0] * v[0] + u[1] * v[1] + u[2] * v[2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_det_identity() {
        let m = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert!((det3x3(&m) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_invert_triclinic() {
        let m = [[4.0, 0.0, 0.0], [1.0, 5.0, 0.0], [0.5, 0.3, 6.0]];
        let inv = invert3x3(&m).unwrap();

        // m · m⁻¹ = I
        for i in 0..3 {
            for j in 0..3 {
                let v: f64 = (0..3).map(|k| m[i][k] * inv[k][j]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((v - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_invert_singular() {
        let m = [[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]];
        assert!(matches!(
            invert3x3(&m),
            Err(StructuraError::SingularMatrix { .. })
        ));
    }

    #[test]
    fn test_transpose_and_mat_vec() {
        let m = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let t = transpose(&m);
        assert_eq!(t[0], [1.0, 4.0, 7.0]);
        assert_eq!(mat_vec(&m, &[1.0, 0.0, 0.0]), [1.0, 4.0, 7.0]);
    }
}
