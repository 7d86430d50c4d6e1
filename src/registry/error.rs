// ==========================================
// 成绩登记系统 - 登记表错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 登记表错误均为批次级错误,由编排器映射为 EngineError
// ==========================================

use std::path::PathBuf;
use thiserror::Error;

/// 登记表错误类型
#[derive(Error, Debug)]
pub enum RegistryError {
    // ===== 文件相关错误 =====
    #[error("登记表不存在: {0}")]
    NotFound(PathBuf),

    #[error("登记表格式不支持（仅支持 .xlsx）: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("登记表读取失败 ({path}): {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("登记表正被占用 ({path}): {holder}")]
    Locked { path: PathBuf, holder: String },

    // ===== 结构错误 =====
    #[error("登记表结构错误 ({path}): {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("单元格越界: row={row}, col={col}")]
    CellOutOfRange { row: u32, col: u16 },

    // ===== 状态机错误 =====
    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ===== 持久化错误 =====
    #[error("登记表保存失败 ({path}): {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("登记表保存后校验失败 ({path}): {message}")]
    VerificationFailed { path: PathBuf, message: String },

    #[error("登记表恢复失败 ({path}): {message}")]
    RestoreFailed { path: PathBuf, message: String },

    #[error("IO 错误: {0}")]
    Io(String),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Io(err.to_string())
    }
}

/// Result 类型别名
pub type RegistryResult<T> = Result<T, RegistryError>;
