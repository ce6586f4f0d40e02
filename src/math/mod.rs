//! # 数值/晶格内核
//!
//! 3×3 矩阵运算与晶格参数换算，被所有解析器共享。纯函数，无状态。
//!
//! 存储的晶格矩阵是**行向量**约定（每行一个晶格矢量 a, b, c），
//! 而分数坐标↔笛卡尔坐标换算需要列向量约定，必须先转置再求逆。
//! 这一约定只在 [`lattice::CoordinateFrame`] 里实现一次，
//! 解析器一律通过它做坐标换算。
//!
//! ## 依赖关系
//! - 被 `models/`, `parsers/`, `binary/` 使用
//! - 子模块: matrix, lattice

pub mod lattice;
pub mod matrix;

pub use lattice::{cell_to_matrix, lattice_params, wrap_fractional, CoordinateFrame, LatticeParams};
pub use matrix::{det3x3, invert3x3, mat_vec, transpose, Matrix3, Vec3};
