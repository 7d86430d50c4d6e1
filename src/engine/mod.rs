// ==========================================
// 成绩登记系统 - 引擎层
// ==========================================
// 职责: 姓名匹配、批次编排
// 红线: 引擎不直接读写文件格式,格式细节在 importer / registry
// ==========================================

pub mod name_matcher;
pub mod orchestrator;

pub use name_matcher::{normalize_name, MatchOutcome, NameMatcher};
pub use orchestrator::BatchOrchestrator;
