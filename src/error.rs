// ==========================================
// 成绩登记系统 - 批次级错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 只有批次级致命错误以 Err 返回;单个文件的问题一律记入报告
// ==========================================

use crate::config::ConfigError;
use crate::domain::report::BatchReport;
use crate::importer::error::ImportError;
use crate::registry::error::RegistryError;
use std::path::PathBuf;
use thiserror::Error;

/// 批次级错误
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 登记表不可用（无任何写入） =====
    #[error("登记表无法读取 ({path}): {detail}")]
    ArtifactUnreadable { path: PathBuf, detail: String },

    #[error("登记表结构错误 ({path}): {detail}")]
    MalformedRegistry { path: PathBuf, detail: String },

    #[error("登记表正被占用 ({path}): {holder}")]
    ArtifactLocked { path: PathBuf, holder: String },

    // ===== 保存失败（已回滚） =====
    #[error("登记表保存失败,已回滚 ({path}): {cause}")]
    CommitFailed {
        path: PathBuf,
        cause: String,
        report: Box<BatchReport>,
    },

    // ===== 调用错误 =====
    #[error("批次范围无效: {0}")]
    InvalidScope(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl EngineError {
    /// 保存失败时随错误返回的报告
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            EngineError::CommitFailed { report, .. } => Some(report.as_ref()),
            _ => None,
        }
    }
}

// 实现 From<RegistryError>（打开 / 校验阶段）
impl From<RegistryError> for EngineError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(path) => EngineError::ArtifactUnreadable {
                detail: "文件不存在".to_string(),
                path,
            },
            RegistryError::UnsupportedFormat(path) => EngineError::ArtifactUnreadable {
                detail: "仅支持 .xlsx 登记表".to_string(),
                path,
            },
            RegistryError::Unreadable { path, message } => EngineError::ArtifactUnreadable {
                path,
                detail: message,
            },
            RegistryError::Locked { path, holder } => EngineError::ArtifactLocked { path, holder },
            RegistryError::Malformed { path, message } => EngineError::MalformedRegistry {
                path,
                detail: message,
            },
            other => EngineError::Internal(other.to_string()),
        }
    }
}

// 实现 From<ImportError>
impl From<ImportError> for EngineError {
    fn from(err: ImportError) -> Self {
        EngineError::Internal(err.to_string())
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
