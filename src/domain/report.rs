// ==========================================
// 成绩登记系统 - 写入结果与批次报告
// ==========================================
// 职责: WriteResult / ReportEntry / BatchReport
// 红线: 跳过 ≠ 失败;原因码为稳定的 snake_case 字符串
// ==========================================

use crate::domain::roster::{GradeColumn, RosterRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ==========================================
// 失败原因
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FailureReason {
    AmbiguousMatch { candidates: Vec<String> },
    NoMatch,
    RowNotFound { name: String },
    UnparseableGrade { raw_grade: String },
    ArtifactUnreadable { detail: String },
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::AmbiguousMatch { .. } => "ambiguous_match",
            FailureReason::NoMatch => "no_match",
            FailureReason::RowNotFound { .. } => "row_not_found",
            FailureReason::UnparseableGrade { .. } => "unparseable_grade",
            FailureReason::ArtifactUnreadable { .. } => "artifact_unreadable",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::AmbiguousMatch { candidates } => {
                write!(f, "姓名匹配不唯一: {}", candidates.join(" / "))
            }
            FailureReason::NoMatch => write!(f, "花名册中无匹配姓名"),
            FailureReason::RowNotFound { name } => write!(f, "登记表中找不到学生行: {}", name),
            FailureReason::UnparseableGrade { raw_grade } => {
                write!(f, "成绩无法识别: {}", raw_grade)
            }
            FailureReason::ArtifactUnreadable { detail } => write!(f, "文件无法读取: {}", detail),
        }
    }
}

// ==========================================
// 跳过原因
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SkipReason {
    Unchanged { value: String },
    Ungraded,
    Locked,
}

impl SkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::Unchanged { .. } => "unchanged",
            SkipReason::Ungraded => "ungraded",
            SkipReason::Locked => "locked",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unchanged { value } => write!(f, "成绩未变化: {}", value),
            SkipReason::Ungraded => write!(f, "未批改"),
            SkipReason::Locked => write!(f, "文档已锁定"),
        }
    }
}

// ==========================================
// WriteResult - 单条写入结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteResult {
    Success {
        row: RosterRow,
        column: GradeColumn,
        old_value: String,
        new_value: String,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        reason: FailureReason,
    },
}

impl WriteResult {
    pub fn is_success(&self) -> bool {
        matches!(self, WriteResult::Success { .. })
    }

    /// 非成功结果的原因码
    pub fn reason_code(&self) -> Option<&'static str> {
        match self {
            WriteResult::Success { .. } => None,
            WriteResult::Skipped { reason } => Some(reason.code()),
            WriteResult::Failed { reason } => Some(reason.code()),
        }
    }
}

// ==========================================
// BatchScope - 批次范围
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchScope {
    Assignment, // 单次作业目录
    Class,      // 班级目录（多份汇总表）
}

impl fmt::Display for BatchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchScope::Assignment => write!(f, "ASSIGNMENT"),
            BatchScope::Class => write!(f, "CLASS"),
        }
    }
}

// ==========================================
// ReportEntry - 报告明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub source_path: PathBuf,
    pub row_number: Option<usize>,
    pub raw_identifier: Option<String>,
    pub assignment_number: Option<u32>,
    pub result: WriteResult,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl ReportEntry {
    pub fn new(source_path: PathBuf, result: WriteResult) -> Self {
        Self {
            source_path,
            row_number: None,
            raw_identifier: None,
            assignment_number: None,
            result,
            notes: Vec::new(),
        }
    }
}

// ==========================================
// BatchReport - 批次报告（批次唯一返回值,不落盘）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub scope: BatchScope,
    pub registry_path: PathBuf,
    pub assignment_number: Option<u32>,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub entries: Vec<ReportEntry>,
    pub persisted: bool,
    pub dry_run: bool,
    pub stale_backup: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u128,
}

impl BatchReport {
    pub fn new(batch_id: String, scope: BatchScope, registry_path: PathBuf) -> Self {
        Self {
            batch_id,
            scope,
            registry_path,
            assignment_number: None,
            total: 0,
            success: 0,
            failed: 0,
            skipped: 0,
            entries: Vec::new(),
            persisted: false,
            dry_run: false,
            stale_backup: None,
            notes: Vec::new(),
            started_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    /// 追加明细并更新计数
    pub fn push(&mut self, entry: ReportEntry) {
        self.total += 1;
        match &entry.result {
            WriteResult::Success { .. } => self.success += 1,
            WriteResult::Skipped { .. } => self.skipped += 1,
            WriteResult::Failed { .. } => self.failed += 1,
        }
        self.entries.push(entry);
    }

    /// 非成功明细（路径 + 原因）
    pub fn issues(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| !e.result.is_success())
    }

    /// 保存失败后标注成功明细未落盘
    pub fn mark_not_persisted(&mut self) {
        self.persisted = false;
        for entry in self.entries.iter_mut().filter(|e| e.result.is_success()) {
            entry.notes.push("not_persisted".to_string());
        }
    }

    /// 渲染为人读文本（计数 + 非成功明细）
    pub fn render(&self) -> String {
        let mut out = format!(
            "批次 {} [{}] 共 {} 条: 成功 {}, 失败 {}, 跳过 {}{}\n",
            self.batch_id,
            self.scope,
            self.total,
            self.success,
            self.failed,
            self.skipped,
            if self.dry_run { " (试运行)" } else { "" },
        );
        for entry in self.issues() {
            let reason = match &entry.result {
                WriteResult::Skipped { reason } => format!("[{}] {}", reason.code(), reason),
                WriteResult::Failed { reason } => format!("[{}] {}", reason.code(), reason),
                WriteResult::Success { .. } => continue,
            };
            match entry.row_number {
                Some(row) => out.push_str(&format!(
                    "  {} (行 {}): {}\n",
                    entry.source_path.display(),
                    row,
                    reason
                )),
                None => out.push_str(&format!("  {}: {}\n", entry.source_path.display(), reason)),
            }
        }
        if let Some(backup) = &self.stale_backup {
            out.push_str(&format!(
                "  警告: 发现上次中断批次遗留的备份 {}\n",
                backup.display()
            ));
        }
        for note in &self.notes {
            out.push_str(&format!("  注意: {}\n", note));
        }
        out
    }
}
