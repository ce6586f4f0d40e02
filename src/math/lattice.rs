//! # 晶格参数与坐标换算
//!
//! - `lattice_params`: 矩阵 → (a, b, c, α, β, γ, V)
//! - `cell_to_matrix`: (a, b, c, α, β, γ) → 矩阵（CIF 使用）
//! - `CoordinateFrame`: 分数 ↔ 笛卡尔坐标换算的唯一实现
//!
//! ## 依赖关系
//! - 被 `models/structure.rs` 及所有解析器使用
//! - 使用 `math/matrix.rs`

use super::matrix::{det3x3, dot, invert3x3, mat_vec, norm, transpose, Matrix3, Vec3, SINGULAR_EPSILON};
use serde::{Deserialize, Serialize};

/// 晶格参数（长度 Å，角度 度）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeParams {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub volume: f64,
}

/// 两向量夹角（度）；零长度向量按 90° 处理
fn angle_between(u: &Vec3, v: &Vec3) -> f64 {
    let denom = norm(u) * norm(v);
    if denom < SINGULAR_EPSILON {
        return 90.0;
    }
    (dot(u, v) / denom).clamp(-1.0, 1.0).acos().to_degrees()
}

/// 从行向量矩阵计算晶格参数
pub fn lattice_params(m: &Matrix3) -> LatticeParams {
    LatticeParams {
        a: norm(&m[0]),
        b: norm(&m[1]),
        c: norm(&m[2]),
        alpha: angle_between(&m[1], &m[2]),
        beta: angle_between(&m[0], &m[2]),
        gamma: angle_between(&m[0], &m[1]),
        volume: det3x3(m),
    }
}

/// 从晶格参数构造矩阵，a 沿 x 轴，b 在 xy 平面内
pub fn cell_to_matrix(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Matrix3 {
    let cos_alpha = alpha.to_radians().cos();
    let cos_beta = beta.to_radians().cos();
    let cos_gamma = gamma.to_radians().cos();
    let sin_gamma = gamma.to_radians().sin();

    let a_vec = [a, 0.0, 0.0];
    let b_vec = [b * cos_gamma, b * sin_gamma, 0.0];

    let c1 = c * cos_beta;
    let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
    // 角度组合不合法时 c3² 可能略小于 0
    let c3 = (c * c - c1 * c1 - c2 * c2).max(0.0).sqrt();

    [a_vec, b_vec, [c1, c2, c3]]
}

/// 分数 ↔ 笛卡尔坐标换算器
///
/// 构造时完成"转置再求逆"，之后对每个原子只做一次矩阵·向量。
/// 晶格奇异时记录警告并退化为按轴对角元素相除。
#[derive(Debug, Clone)]
pub struct CoordinateFrame {
    matrix: Matrix3,
    columns: Matrix3,
    inverse: Option<Matrix3>,
}

impl CoordinateFrame {
    pub fn new(matrix: &Matrix3) -> Self {
        let columns = transpose(matrix);
        let inverse = match invert3x3(&columns) {
            Ok(inv) => Some(inv),
            Err(e) => {
                log::warn!("{}; using axis-aligned fractional coordinates", e);
                None
            }
        };
        CoordinateFrame {
            matrix: *matrix,
            columns,
            inverse,
        }
    }

    /// 分数坐标 → 笛卡尔坐标: f₀·a + f₁·b + f₂·c
    pub fn to_cartesian(&self, frac: &Vec3) -> Vec3 {
        mat_vec(&self.columns, frac)
    }

    /// 笛卡尔坐标 → 分数坐标
    pub fn to_fractional(&self, cart: &Vec3) -> Vec3 {
        match &self.inverse {
            Some(inv) => mat_vec(inv, cart),
            None => {
                let m = &self.matrix;
                let axis = |i: usize| {
                    if m[i][i].abs() > SINGULAR_EPSILON {
                        cart[i] / m[i][i]
                    } else {
                        0.0
                    }
                };
                [axis(0), axis(1), axis(2)]
            }
        }
    }

    pub fn is_singular(&self) -> bool {
        self.inverse.is_none()
    }
}

/// 分数坐标折回 [0, 1)
pub fn wrap_fractional(frac: &Vec3) -> Vec3 {
    let wrap = |x: f64| {
        let w = x - x.floor();
        // x.floor() 的舍入可能让 w 恰好等于 1.0
        if w >= 1.0 {
            0.0
        } else {
            w
        }
    };
    [wrap(frac[0]), wrap(frac[1]), wrap(frac[2])]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cell_to_matrix_cubic() {
        let m = cell_to_matrix(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        let p = lattice_params(&m);

        assert!((p.a - 5.0).abs() < 1e-6);
        assert!((p.alpha - 90.0).abs() < 1e-6);
        assert!((p.volume - 125.0).abs() < 1e-6);
    }

    #[test]
    fn test_cell_to_matrix_hexagonal() {
        let m = cell_to_matrix(3.0, 3.0, 5.0, 90.0, 90.0, 120.0);
        let p = lattice_params(&m);

        assert!((p.b - 3.0).abs() < 1e-9);
        assert!((p.gamma - 120.0).abs() < 1e-9);
        assert!((p.volume - 3.0 * 3.0 * 5.0 * (120f64.to_radians().sin())).abs() < 1e-9);
    }

    #[test]
    fn test_singular_frame_falls_back_to_axis_division() {
        let m = [[2.0, 0.0, 0.0], [4.0, 0.0, 0.0], [0.0, 0.0, 5.0]];
        let frame = CoordinateFrame::new(&m);
        assert!(frame.is_singular());

        let frac = frame.to_fractional(&[1.0, 3.0, 2.5]);
        assert!((frac[0] - 0.5).abs() < 1e-12);
        assert_eq!(frac[1], 0.0);
        assert!((frac[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_wrap_fractional() {
        let w = wrap_fractional(&[1.25, -0.25, 0.999]);
        assert!((w[0] - 0.25).abs() < 1e-12);
        assert!((w[1] - 0.75).abs() < 1e-12);
        assert!((w[2] - 0.999).abs() < 1e-12);
    }

    fn lattice_strategy() -> impl Strategy<Value = Matrix3> {
        (
            prop::array::uniform3(2.0f64..10.0),
            prop::array::uniform6(-1.0f64..1.0),
        )
            .prop_map(|(d, o)| [[d[0], o[0], o[1]], [o[2], d[1], o[3]], [o[4], o[5], d[2]]])
    }

    proptest! {
        #[test]
        fn prop_params_round_trip(m in lattice_strategy()) {
            let p = lattice_params(&m);
            let rebuilt = cell_to_matrix(p.a, p.b, p.c, p.alpha, p.beta, p.gamma);
            let q = lattice_params(&rebuilt);

            // 重建矩阵相差一个刚体转动，比较转动不变量
            prop_assert!((p.a - q.a).abs() < 1e-6);
            prop_assert!((p.b - q.b).abs() < 1e-6);
            prop_assert!((p.c - q.c).abs() < 1e-6);
            prop_assert!((p.alpha - q.alpha).abs() < 1e-6);
            prop_assert!((p.beta - q.beta).abs() < 1e-6);
            prop_assert!((p.gamma - q.gamma).abs() < 1e-6);
            prop_assert!((p.volume.abs() - q.volume.abs()).abs() < 1e-6);
        }

        #[test]
        fn prop_fractional_cartesian_inverse(
            m in lattice_strategy(),
            f in prop::array::uniform3(-1.0f64..2.0),
        ) {
            let frame = CoordinateFrame::new(&m);
            let back = frame.to_fractional(&frame.to_cartesian(&f));
            for i in 0..3 {
                prop_assert!((back[i] - f[i]).abs() < 1e-6);
            }
        }
    }
}
