// ==========================================
// 成绩登记系统 - 核心库
// ==========================================
// 系统定位: 把分散在学生文档与班级汇总表中的成绩归档到一张登记表
// 技术栈: Rust + xlsx/docx 容器 + SQLite（审计日志,可选）
// 红线: 登记表要么整体保存,要么逐字节回滚
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 成绩、候选记录、花名册、报告
pub mod domain;

// 配置层 - 引擎配置
pub mod config;

// 提取层 - 学生文档 / 汇总表
pub mod importer;

// 登记表层 - 打开、校验、暂存、提交、回滚
pub mod registry;

// 引擎层 - 姓名匹配、批次编排
pub mod engine;

// 数据仓储层 - 审计日志
pub mod repository;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 批次级错误
pub mod error;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use config::{ConfigError, ConfigManager, EngineConfig};
pub use domain::{
    AssignmentIdentity, BatchReport, BatchScope, CandidateRecord, DocumentExtraction,
    FailureReason, Grade, GradeColumn, GradeScheme, ReportEntry, RosterRow, RosterSource,
    SkipReason, WriteResult,
};
pub use engine::{BatchOrchestrator, MatchOutcome, NameMatcher};
pub use error::{EngineError, EngineResult};
pub use registry::{RegistryManager, RegistryState, WorkbookCodec, XlsxCodec};

// ==========================================
// 版本信息
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "成绩登记系统";
