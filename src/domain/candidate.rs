// ==========================================
// 成绩登记系统 - 候选成绩记录
// ==========================================
// 职责: 提取层输出的中间结构
// 生命周期: 仅在单个批次的单个文件处理过程内,不落盘
// ==========================================

use crate::domain::types::{AssignmentIdentity, Grade};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ==========================================
// CandidateRecord - 候选成绩
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub raw_identifier: String,         // 文件名或表格中的姓名原文
    pub assignment: AssignmentIdentity, // 目标作业列
    pub grade: Grade,                   // 已校验成绩
    pub comment: Option<String>,        // 教师评语（仅文档模式）
    pub source_path: PathBuf,           // 来源文件
    pub row_number: Option<usize>,      // 汇总表行号（从 1 开始,含表头）
}

// ==========================================
// 文档标记状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    Structured, // 含教师签字表格
    Freeform,   // 末尾追加评分行
}

// ==========================================
// DocumentExtraction - 单份学生文档的提取结果
// ==========================================
// Locked / FormatError 需要调用方区别处理,不能折叠为空结果
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentExtraction {
    /// 找到成绩
    Graded(CandidateRecord),

    /// 未批改（无评分标记）
    Ungraded {
        raw_identifier: String,
        assignment: AssignmentIdentity,
        kind: DocumentKind,
    },

    /// 文档含锁定标记,拒绝任何写入
    Locked {
        raw_identifier: String,
        assignment: AssignmentIdentity,
    },

    /// 结构化文档缺少教师签字单元格
    FormatError {
        raw_identifier: String,
        assignment: AssignmentIdentity,
        detail: String,
    },

    /// 找到评分标记但成绩不在词表内
    Unparseable {
        raw_identifier: String,
        assignment: AssignmentIdentity,
        raw_grade: String,
    },
}

impl DocumentExtraction {
    pub fn raw_identifier(&self) -> &str {
        match self {
            DocumentExtraction::Graded(record) => &record.raw_identifier,
            DocumentExtraction::Ungraded { raw_identifier, .. }
            | DocumentExtraction::Locked { raw_identifier, .. }
            | DocumentExtraction::FormatError { raw_identifier, .. }
            | DocumentExtraction::Unparseable { raw_identifier, .. } => raw_identifier,
        }
    }

    pub fn assignment(&self) -> AssignmentIdentity {
        match self {
            DocumentExtraction::Graded(record) => record.assignment,
            DocumentExtraction::Ungraded { assignment, .. }
            | DocumentExtraction::Locked { assignment, .. }
            | DocumentExtraction::FormatError { assignment, .. }
            | DocumentExtraction::Unparseable { assignment, .. } => *assignment,
        }
    }
}

// ==========================================
// TabularExtraction - 汇总表提取结果
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct TabularExtraction {
    pub records: Vec<CandidateRecord>,
    pub diagnostics: Vec<RowDiagnostic>,
}

/// 汇总表行级诊断（成绩无法识别）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDiagnostic {
    pub row_number: usize,
    pub raw_identifier: String,
    pub raw_grade: String,
}
