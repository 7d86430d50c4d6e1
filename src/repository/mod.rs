// ==========================================
// 成绩登记系统 - 数据仓储层
// ==========================================
// 职责: 成绩审计日志持久化
// 约束: 所有查询使用参数化,防止 SQL 注入
// 红线: Repository 不含业务逻辑
// ==========================================

pub mod audit_log_repo;
pub mod error;

// 重导出核心仓储
pub use audit_log_repo::GradeAuditRepository;
pub use error::{RepositoryError, RepositoryResult};
