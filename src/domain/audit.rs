// ==========================================
// 成绩登记系统 - 成绩审计日志领域模型
// ==========================================
// 红线: 只记录已提交的写入
// 对齐: grade_audit_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeAuditEntry {
    pub audit_id: String,             // 日志ID (UUID)
    pub batch_id: String,             // 所属批次
    pub registry_path: String,        // 登记表路径
    pub student_name: String,         // 登记表中的姓名
    pub column_header: String,        // 作业列表头
    pub old_value: String,            // 写入前的值（空串表示空单元格）
    pub new_value: String,            // 写入后的值
    pub source_path: String,          // 成绩来源文件
    pub recorded_at: NaiveDateTime,   // 记录时间
}
