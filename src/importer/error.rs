// ==========================================
// 成绩登记系统 - 提取模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 这些错误只影响单个文件,由编排器折叠进报告
// ==========================================

use thiserror::Error;

/// 提取模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("文件写入失败: {0}")]
    FileWriteError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("docx 解析失败: {0}")]
    DocxParseError(String),

    // ===== 结构错误 =====
    #[error("缺少必需列 ({path}): 期望表头之一 {labels:?}")]
    MissingColumn { path: String, labels: Vec<String> },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<zip::result::ZipError>
impl From<zip::result::ZipError> for ImportError {
    fn from(err: zip::result::ZipError) -> Self {
        ImportError::DocxParseError(err.to_string())
    }
}

// 实现 From<regex::Error>
impl From<regex::Error> for ImportError {
    fn from(err: regex::Error) -> Self {
        ImportError::InternalError(format!("正则表达式编译失败: {}", err))
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
