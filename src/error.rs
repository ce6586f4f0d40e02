//! # 统一错误处理模块
//!
//! 定义 Structura 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 错误分类
//! - 格式识别: `UnsupportedFormat`, `UnsupportedBinaryFormat`
//! - 语法错误: `MalformedInput`, `InvalidCoordinate`, `InsufficientCoordinates`
//! - 数值错误: `SingularMatrix`（仅在坐标转换内部出现，调用方就地回退）
//! - 二进制容器: `MissingRequiredDataset`, `InvalidSignature`
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// Structura 统一错误类型
#[derive(Error, Debug)]
pub enum StructuraError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误（仅二进制入口使用，库本身不做 I/O）
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 格式识别错误
    // ─────────────────────────────────────────────────────────────
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported {format} file: {message}")]
    UnsupportedBinaryFormat { format: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Malformed {format} input: {reason}")]
    MalformedInput { format: String, reason: String },

    #[error("Invalid coordinate value: '{0}'")]
    InvalidCoordinate(String),

    #[error("Expected 3 coordinates but found {found} in line: '{line}'")]
    InsufficientCoordinates { line: String, found: usize },

    #[error("Singular lattice matrix (det = {determinant:e})")]
    SingularMatrix { determinant: f64 },

    // ─────────────────────────────────────────────────────────────
    // 二进制容器错误
    // ─────────────────────────────────────────────────────────────
    #[error("Required dataset '{dataset}' not found (searched: {})", searched.join(", "))]
    MissingRequiredDataset {
        dataset: String,
        searched: Vec<String>,
    },

    #[error("Invalid {format} signature: expected {expected}, found {found}")]
    InvalidSignature {
        format: String,
        expected: String,
        found: String,
    },

    // ─────────────────────────────────────────────────────────────
    // 序列化错误
    // ─────────────────────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Other(String),
}

impl StructuraError {
    /// 构造 `MalformedInput` 的便捷函数
    pub fn malformed(format: &str, reason: impl Into<String>) -> Self {
        StructuraError::MalformedInput {
            format: format.to_string(),
            reason: reason.into(),
        }
    }

    /// 构造已识别但不支持的二进制/压缩格式错误
    pub fn unsupported_binary(format: &str, message: impl Into<String>) -> Self {
        StructuraError::UnsupportedBinaryFormat {
            format: format.to_string(),
            message: message.into(),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, StructuraError>;
