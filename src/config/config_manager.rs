// ==========================================
// 成绩登记系统 - 配置管理器
// ==========================================
// 职责: 配置加载、校验、键值覆写
// 存储: JSON 配置文件（缺省字段取默认值）
// ==========================================

use crate::domain::types::{Grade, GradeScheme, IdentifierPosition};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读取失败 ({path}): {message}")]
    ConfigReadError { path: String, message: String },

    #[error("配置项未知 (key: {0})")]
    UnknownKey(String),

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

// ==========================================
// EngineConfig - 引擎配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // ===== 评分制 =====
    pub grading_scheme: GradeScheme,

    // ===== 登记表约定 =====
    pub name_column_labels: Vec<String>,   // 姓名列表头（任一匹配即可）
    pub grade_column_pattern: String,      // 作业列命名,`{n}` 为作业编号
    pub registry_sheet: Option<String>,    // 指定工作表（缺省为第一个）
    pub registry_name_keywords: Vec<String>, // 登记表文件名关键字（发现阶段排除）

    // ===== 文件发现 =====
    pub rich_text_extensions: Vec<String>,
    pub tabular_extensions: Vec<String>,
    pub filename_separators: Vec<char>,
    pub identifier_position: IdentifierPosition,

    // ===== 文档评分标记 =====
    pub structured_keywords: Vec<String>,  // 路径含此关键字即为结构化文档
    pub structured_cell_label: String,     // 教师签字单元格标签
    pub freeform_grade_marker: String,     // 末尾评分行标记
    pub freeform_comment_marker: String,   // 末尾评语行标记
    pub lock_marker: String,               // 锁定标记

    // ===== 格式错误兜底 =====
    pub fallback_grade: String,
    pub fallback_comment: String,

    // ===== 汇总表 =====
    pub summary_grade_labels: Vec<String>,

    // ===== 作业编号兜底 =====
    pub default_assignment_number: u32,

    // ===== 运行模式 =====
    pub dry_run: bool,
    pub audit_db_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grading_scheme: GradeScheme::Letter,
            name_column_labels: vec!["姓名".to_string(), "学生姓名".to_string()],
            grade_column_pattern: "第{n}次作业".to_string(),
            registry_sheet: None,
            registry_name_keywords: vec!["登记表".to_string()],
            rich_text_extensions: vec!["docx".to_string(), "txt".to_string()],
            tabular_extensions: vec!["xlsx".to_string(), "xls".to_string(), "csv".to_string()],
            filename_separators: vec!['_', '-'],
            identifier_position: IdentifierPosition::Auto,
            structured_keywords: vec!["实验报告".to_string(), "实验".to_string()],
            structured_cell_label: "教师（签字）".to_string(),
            freeform_grade_marker: "老师评分：".to_string(),
            freeform_comment_marker: "教师评价：".to_string(),
            lock_marker: "【格式错误-已锁定】".to_string(),
            fallback_grade: "D".to_string(),
            fallback_comment: "【格式错误-已锁定】未找到教师评分表格，请按模板重新提交".to_string(),
            summary_grade_labels: vec![
                "成绩".to_string(),
                "等级".to_string(),
                "评分".to_string(),
                "分数".to_string(),
                "总评".to_string(),
            ],
            default_assignment_number: 1,
            dry_run: false,
            audit_db_path: None,
        }
    }
}

impl EngineConfig {
    /// 渲染作业列表头
    pub fn grade_column_header(&self, assignment_number: u32) -> String {
        self.grade_column_pattern
            .replace("{n}", &assignment_number.to_string())
    }

    /// 兜底成绩（按当前评分制校验）
    pub fn fallback(&self) -> Result<Grade, ConfigError> {
        Grade::parse(&self.fallback_grade, self.grading_scheme).ok_or_else(|| {
            ConfigError::ConfigValueError {
                key: config_keys::FALLBACK_GRADE.to_string(),
                value: self.fallback_grade.clone(),
                message: format!("不属于评分制 {}", self.grading_scheme),
            }
        })
    }

    /// 配置一致性校验
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, value: String, message: &str| ConfigError::ConfigValueError {
            key: key.to_string(),
            value,
            message: message.to_string(),
        };

        if !self.grade_column_pattern.contains("{n}") {
            return Err(invalid(
                config_keys::GRADE_COLUMN_PATTERN,
                self.grade_column_pattern.clone(),
                "必须包含 {n} 占位符",
            ));
        }
        if self.name_column_labels.iter().all(|l| l.trim().is_empty()) {
            return Err(invalid(
                config_keys::NAME_COLUMN_LABELS,
                String::new(),
                "至少需要一个姓名列表头",
            ));
        }
        if self.lock_marker.trim().is_empty() {
            return Err(invalid(config_keys::LOCK_MARKER, String::new(), "锁定标记不能为空"));
        }
        if self.structured_cell_label.trim().is_empty() {
            return Err(invalid(
                config_keys::STRUCTURED_CELL_LABEL,
                String::new(),
                "签字单元格标签不能为空",
            ));
        }
        if self.freeform_grade_marker.trim().is_empty() {
            return Err(invalid(
                config_keys::FREEFORM_GRADE_MARKER,
                String::new(),
                "评分标记不能为空",
            ));
        }
        if self.default_assignment_number == 0 {
            return Err(invalid(
                config_keys::DEFAULT_ASSIGNMENT_NUMBER,
                "0".to_string(),
                "作业编号从 1 开始",
            ));
        }
        self.fallback()?;
        Ok(())
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    config: EngineConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 使用默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 文件加载配置
    ///
    /// # 参数
    /// - path: 配置文件路径
    ///
    /// # 返回
    /// - Ok(ConfigManager): 缺省字段已补默认值并通过校验
    /// - Err: 文件不可读、JSON 格式错误、配置值非法
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ConfigReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;

        info!(path = %path.display(), "配置加载完成");
        Ok(Self {
            config,
            source: Some(path.to_path_buf()),
        })
    }

    /// 按优先级加载：显式路径 > 用户配置目录 > 默认值
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_config_path() {
            Some(default_path) if default_path.exists() => Self::load(&default_path),
            _ => {
                debug!("未找到配置文件,使用默认配置");
                Ok(Self::new())
            }
        }
    }

    /// 用户配置目录下的默认配置路径
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("grade-registry").join("config.json"))
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_config(self) -> EngineConfig {
        self.config
    }

    /// 键值覆写（命令行 `--set key=value`）
    ///
    /// 列表类配置以逗号分隔;覆写后重新校验整体配置
    pub fn set_override(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        use config_keys::*;

        let value_error = |message: &str| ConfigError::ConfigValueError {
            key: key.to_string(),
            value: value.to_string(),
            message: message.to_string(),
        };
        let list = || -> Vec<String> {
            value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };

        let mut next = self.config.clone();
        match key {
            GRADING_SCHEME => {
                next.grading_scheme = match value.trim().to_uppercase().as_str() {
                    "LETTER" => GradeScheme::Letter,
                    "QUALITATIVE" => GradeScheme::Qualitative,
                    "NUMERIC" => GradeScheme::Numeric,
                    _ => return Err(value_error("可选值: LETTER / QUALITATIVE / NUMERIC")),
                }
            }
            NAME_COLUMN_LABELS => next.name_column_labels = list(),
            GRADE_COLUMN_PATTERN => next.grade_column_pattern = value.to_string(),
            REGISTRY_SHEET => {
                next.registry_sheet = Some(value.trim().to_string()).filter(|s| !s.is_empty())
            }
            REGISTRY_NAME_KEYWORDS => next.registry_name_keywords = list(),
            RICH_TEXT_EXTENSIONS => next.rich_text_extensions = list(),
            TABULAR_EXTENSIONS => next.tabular_extensions = list(),
            FILENAME_SEPARATORS => {
                next.filename_separators = value.chars().filter(|c| *c != ',').collect()
            }
            IDENTIFIER_POSITION => {
                next.identifier_position = match value.trim().to_uppercase().as_str() {
                    "AUTO" => IdentifierPosition::Auto,
                    "PREFIX" => IdentifierPosition::Prefix,
                    "SUFFIX" => IdentifierPosition::Suffix,
                    _ => return Err(value_error("可选值: AUTO / PREFIX / SUFFIX")),
                }
            }
            STRUCTURED_KEYWORDS => next.structured_keywords = list(),
            STRUCTURED_CELL_LABEL => next.structured_cell_label = value.to_string(),
            FREEFORM_GRADE_MARKER => next.freeform_grade_marker = value.to_string(),
            FREEFORM_COMMENT_MARKER => next.freeform_comment_marker = value.to_string(),
            LOCK_MARKER => next.lock_marker = value.to_string(),
            FALLBACK_GRADE => next.fallback_grade = value.trim().to_string(),
            FALLBACK_COMMENT => next.fallback_comment = value.to_string(),
            SUMMARY_GRADE_LABELS => next.summary_grade_labels = list(),
            DEFAULT_ASSIGNMENT_NUMBER => {
                next.default_assignment_number = value
                    .trim()
                    .parse()
                    .map_err(|_| value_error("必须为正整数"))?
            }
            DRY_RUN => {
                next.dry_run = matches!(
                    value.trim().to_lowercase().as_str(),
                    "1" | "true" | "yes" | "y" | "on"
                )
            }
            AUDIT_DB_PATH => {
                next.audit_db_path = Some(PathBuf::from(value.trim())).filter(|p| !p.as_os_str().is_empty())
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }

        next.validate()?;
        debug!(key = key, value = value, "配置覆写");
        self.config = next;
        Ok(())
    }

    /// 获取配置快照（JSON）
    ///
    /// # 用途
    /// - 批次开始时写入日志,便于复现报告
    pub fn get_config_snapshot(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(&self.config)?)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 评分制
    pub const GRADING_SCHEME: &str = "grading_scheme";

    // 登记表
    pub const NAME_COLUMN_LABELS: &str = "name_column_labels";
    pub const GRADE_COLUMN_PATTERN: &str = "grade_column_pattern";
    pub const REGISTRY_SHEET: &str = "registry_sheet";
    pub const REGISTRY_NAME_KEYWORDS: &str = "registry_name_keywords";

    // 文件发现
    pub const RICH_TEXT_EXTENSIONS: &str = "rich_text_extensions";
    pub const TABULAR_EXTENSIONS: &str = "tabular_extensions";
    pub const FILENAME_SEPARATORS: &str = "filename_separators";
    pub const IDENTIFIER_POSITION: &str = "identifier_position";

    // 评分标记
    pub const STRUCTURED_KEYWORDS: &str = "structured_keywords";
    pub const STRUCTURED_CELL_LABEL: &str = "structured_cell_label";
    pub const FREEFORM_GRADE_MARKER: &str = "freeform_grade_marker";
    pub const FREEFORM_COMMENT_MARKER: &str = "freeform_comment_marker";
    pub const LOCK_MARKER: &str = "lock_marker";

    // 格式错误兜底
    pub const FALLBACK_GRADE: &str = "fallback_grade";
    pub const FALLBACK_COMMENT: &str = "fallback_comment";

    // 汇总表
    pub const SUMMARY_GRADE_LABELS: &str = "summary_grade_labels";

    // 作业编号
    pub const DEFAULT_ASSIGNMENT_NUMBER: &str = "default_assignment_number";

    // 运行模式
    pub const DRY_RUN: &str = "dry_run";
    pub const AUDIT_DB_PATH: &str = "audit_db_path";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grade_column_header(3), "第3次作业");
    }

    #[test]
    fn test_load_partial_json_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"grading_scheme": "NUMERIC", "fallback_grade": "60"}}"#).unwrap();

        let manager = ConfigManager::load(file.path()).unwrap();
        assert_eq!(manager.config().grading_scheme, GradeScheme::Numeric);
        assert_eq!(manager.config().lock_marker, "【格式错误-已锁定】");
        assert_eq!(manager.source(), Some(file.path()));
    }

    #[test]
    fn test_load_rejects_fallback_outside_scheme() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"grading_scheme": "NUMERIC"}}"#).unwrap();

        // 默认兜底成绩 "D" 不属于百分制
        let result = ConfigManager::load(file.path());
        assert!(matches!(result, Err(ConfigError::ConfigValueError { .. })));
    }

    #[test]
    fn test_set_override() {
        let mut manager = ConfigManager::new();
        manager
            .set_override(config_keys::SUMMARY_GRADE_LABELS, "成绩, 最终成绩")
            .unwrap();
        manager.set_override(config_keys::DRY_RUN, "yes").unwrap();

        assert_eq!(
            manager.config().summary_grade_labels,
            vec!["成绩".to_string(), "最终成绩".to_string()]
        );
        assert!(manager.config().dry_run);

        assert!(matches!(
            manager.set_override("no_such_key", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        // 非法覆写不生效
        assert!(manager
            .set_override(config_keys::GRADE_COLUMN_PATTERN, "作业")
            .is_err());
        assert_eq!(manager.config().grade_column_pattern, "第{n}次作业");
    }

    #[test]
    fn test_config_snapshot_is_json() {
        let manager = ConfigManager::new();
        let snapshot = manager.get_config_snapshot().unwrap();
        let value: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
        assert_eq!(value["grading_scheme"], "LETTER");
    }
}
