// ==========================================
// 成绩登记系统 - 领域模型层
// ==========================================
// 职责: 定义成绩、候选记录、花名册、报告等领域类型
// 红线: 不含文件访问逻辑,不含引擎逻辑
// ==========================================

pub mod audit;
pub mod candidate;
pub mod report;
pub mod roster;
pub mod types;

// 重导出核心类型
pub use audit::GradeAuditEntry;
pub use candidate::{
    CandidateRecord, DocumentExtraction, DocumentKind, RowDiagnostic, TabularExtraction,
};
pub use report::{
    BatchReport, BatchScope, FailureReason, ReportEntry, SkipReason, WriteResult,
};
pub use roster::{GradeColumn, RosterRow, RosterSource};
pub use types::{
    AssignmentIdentity, Grade, GradeScheme, IdentifierPosition, LetterGrade, QualitativeGrade,
    ResolverStrategy,
};
