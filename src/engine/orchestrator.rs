// ==========================================
// 成绩登记系统 - 批次编排器
// ==========================================
// 流程: 发现文件 → 提取 → 姓名匹配 → 暂存写入 → 一次提交
// 范围: 单次作业目录（学生文档）/ 班级目录（汇总表）
// 红线: 单个文件的失败只记入报告,不中断批次;
//       登记表要么全部保存,要么逐字节回滚;
//       文档回写在登记表提交成功后才执行
// ==========================================

use crate::config::EngineConfig;
use crate::domain::audit::GradeAuditEntry;
use crate::domain::candidate::{CandidateRecord, DocumentExtraction, RowDiagnostic};
use crate::domain::report::{
    BatchReport, BatchScope, FailureReason, ReportEntry, SkipReason, WriteResult,
};
use crate::domain::roster::{RosterRow, RosterSource};
use crate::domain::types::{AssignmentIdentity, Grade};
use crate::engine::name_matcher::{MatchOutcome, NameMatcher};
use crate::error::{EngineError, EngineResult};
use crate::importer::assignment_resolver::AssignmentResolver;
use crate::importer::document_writer::{DocumentGradeWriter, DocumentWriteOutcome};
use crate::importer::grade_extractor::GradeExtractor;
use crate::registry::lock::RegistryLock;
use crate::registry::registry_manager::{CommitOutcome, RegistryManager, RegistryState};
use crate::registry::snapshot::RegistrySnapshot;
use crate::registry::workbook::{WorkbookCodec, XlsxCodec};
use crate::repository::audit_log_repo::GradeAuditRepository;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 登记表提交成功后才执行的文档回写
struct DeferredDocumentWrite {
    entry_index: usize,
    path: PathBuf,
    grade: Grade,
    comment: Option<String>,
}

/// 单个批次的运行上下文
struct BatchContext {
    manager: RegistryManager,
    matcher: NameMatcher,
    explicit_roster: bool,
    report: BatchReport,
    deferred: Vec<DeferredDocumentWrite>,
    started: Instant,
}

/// 汇总表中一行的处理对象（按行号合并成绩行与诊断行）
enum SummaryRow {
    Record(CandidateRecord),
    Diagnostic(RowDiagnostic),
}

impl SummaryRow {
    fn row_number(&self) -> usize {
        match self {
            SummaryRow::Record(record) => record.row_number.unwrap_or(0),
            SummaryRow::Diagnostic(diagnostic) => diagnostic.row_number,
        }
    }
}

// ==========================================
// BatchOrchestrator - 批次编排器
// ==========================================
pub struct BatchOrchestrator {
    config: EngineConfig,
    extractor: GradeExtractor,
    writer: DocumentGradeWriter,
    codec: Arc<dyn WorkbookCodec>,
}

impl BatchOrchestrator {
    /// 创建编排器
    ///
    /// # 返回
    /// - Err(Config): 配置不合法
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            extractor: GradeExtractor::new(&config)?,
            writer: DocumentGradeWriter::new(&config),
            codec: Arc::new(XlsxCodec),
            config,
        })
    }

    /// 替换登记表编解码器
    pub fn with_codec(mut self, codec: Arc<dyn WorkbookCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ==========================================
    // 单次作业目录
    // ==========================================

    /// 处理一个作业目录中的全部学生文档
    ///
    /// # 参数
    /// - assignment_dir: 作业目录（目录名确定作业编号）
    /// - registry_path: 登记表
    /// - roster: 花名册来源
    ///
    /// # 返回
    /// - Ok(BatchReport): 单个文件的问题均在报告中
    /// - Err: 登记表不可用 / 结构错误 / 被占用 / 保存失败（已回滚）
    #[instrument(skip(self, roster), fields(
        dir = %assignment_dir.display(),
        registry = %registry_path.display(),
        dry_run = self.config.dry_run
    ))]
    pub fn run_assignment_scope(
        &self,
        assignment_dir: &Path,
        registry_path: &Path,
        roster: &RosterSource,
    ) -> EngineResult<BatchReport> {
        let dir_name = dir_name(assignment_dir)?;
        let assignment = self.extractor.resolver().resolve(&dir_name);
        let documents = self.discover_documents(assignment_dir)?;
        info!(
            assignment = assignment.number,
            source = %assignment.source,
            documents = documents.len(),
            "作业目录扫描完成"
        );

        let mut ctx = self.begin(BatchScope::Assignment, registry_path, roster)?;
        ctx.report.assignment_number = Some(assignment.number);

        for path in documents {
            if let Err(e) = self.process_document(&mut ctx, &path) {
                return Err(self.abort(ctx, e));
            }
        }

        self.finish(ctx)
    }

    // ==========================================
    // 班级目录
    // ==========================================

    /// 处理一个班级目录中的全部汇总表（每张表对应一次作业）
    #[instrument(skip(self, roster), fields(
        dir = %class_dir.display(),
        registry = %registry_path.display(),
        dry_run = self.config.dry_run
    ))]
    pub fn run_class_scope(
        &self,
        class_dir: &Path,
        registry_path: &Path,
        roster: &RosterSource,
    ) -> EngineResult<BatchReport> {
        let (summaries, ignored) = self.discover_summaries(class_dir, registry_path)?;
        info!(summaries = summaries.len(), ignored = ignored.len(), "班级目录扫描完成");

        let mut ctx = self.begin(BatchScope::Class, registry_path, roster)?;
        for path in ignored {
            ctx.report
                .notes
                .push(format!("无法识别作业编号,已忽略: {}", path.display()));
        }

        for (path, assignment) in summaries {
            if let Err(e) = self.process_summary(&mut ctx, &path, assignment) {
                return Err(self.abort(ctx, e));
            }
        }

        self.finish(ctx)
    }

    // ==========================================
    // 中断恢复
    // ==========================================

    /// 用上次中断批次遗留的备份恢复登记表
    ///
    /// # 返回
    /// - Ok(true): 已恢复
    /// - Ok(false): 无遗留备份,登记表未改动
    #[instrument(skip(self), fields(registry = %registry_path.display()))]
    pub fn recover_registry(&self, registry_path: &Path) -> EngineResult<bool> {
        let _lock = RegistryLock::acquire(registry_path)?;
        let recovered = RegistrySnapshot::recover(registry_path)?;
        if recovered {
            info!("登记表已从遗留备份恢复");
        } else {
            info!("无遗留备份");
        }
        Ok(recovered)
    }

    /// 强制删除登记表锁文件（确认没有其他批次在运行时使用）
    ///
    /// 持有进程已退出的锁文件在 `recover_registry` 与批次开始时会自动清除;
    /// 此方法用于无法判断进程状态的平台
    #[instrument(skip(self), fields(registry = %registry_path.display()))]
    pub fn release_registry_lock(&self, registry_path: &Path) -> EngineResult<bool> {
        Ok(RegistryLock::force_release(registry_path)?)
    }

    // ==========================================
    // 文件发现
    // ==========================================

    /// 列出目录中的普通文件（不递归,排除隐藏文件与 Office 临时文件）
    fn list_files(&self, dir: &Path) -> EngineResult<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(EngineError::InvalidScope(format!(
                "目录不存在: {}",
                dir.display()
            )));
        }
        let entries = fs::read_dir(dir).map_err(|e| {
            EngineError::InvalidScope(format!("目录无法读取 {}: {}", dir.display(), e))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::InvalidScope(e.to_string()))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if !path.is_file() || name.starts_with('.') || name.starts_with("~$") {
                continue;
            }
            files.push(path);
        }
        files.sort();
        Ok(files)
    }

    fn has_extension(path: &Path, extensions: &[String]) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    fn discover_documents(&self, dir: &Path) -> EngineResult<Vec<PathBuf>> {
        Ok(self
            .list_files(dir)?
            .into_iter()
            .filter(|p| Self::has_extension(p, &self.config.rich_text_extensions))
            .collect())
    }

    /// 汇总表发现
    ///
    /// # 返回
    /// - (可处理的汇总表及作业编号, 无法识别作业编号的表格文件)
    fn discover_summaries(
        &self,
        dir: &Path,
        registry_path: &Path,
    ) -> EngineResult<(Vec<(PathBuf, AssignmentIdentity)>, Vec<PathBuf>)> {
        let registry_canonical = fs::canonicalize(registry_path).ok();

        let mut summaries = Vec::new();
        let mut ignored = Vec::new();
        for path in self.list_files(dir)? {
            if !Self::has_extension(&path, &self.config.tabular_extensions) {
                continue;
            }
            let is_registry = path == registry_path
                || (registry_canonical.is_some()
                    && fs::canonicalize(&path).ok() == registry_canonical);
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let named_like_registry = self
                .config
                .registry_name_keywords
                .iter()
                .any(|k| !k.is_empty() && stem.contains(k.as_str()));
            if is_registry || named_like_registry {
                debug!(path = %path.display(), "跳过登记表文件");
                continue;
            }

            match self.extractor.resolver().resolve_explicit(&stem) {
                Some(assignment) => summaries.push((path, assignment)),
                None => {
                    warn!(path = %path.display(), "汇总表文件名无法识别作业编号,已忽略");
                    ignored.push(path);
                }
            }
        }
        Ok((summaries, ignored))
    }

    // ==========================================
    // 批次生命周期
    // ==========================================

    /// 打开并校验登记表,建立花名册索引
    fn begin(
        &self,
        scope: BatchScope,
        registry_path: &Path,
        roster: &RosterSource,
    ) -> EngineResult<BatchContext> {
        let batch_id = Uuid::new_v4().to_string();
        debug!(
            batch_id = %batch_id,
            config = %serde_json::to_string(&self.config).unwrap_or_default(),
            "批次开始"
        );

        let resolver = AssignmentResolver::new(self.config.default_assignment_number)?;
        let mut manager = RegistryManager::new(registry_path, &self.config, resolver)
            .with_codec(self.codec.clone());
        manager.open()?;
        manager.validate()?;

        let (matcher, explicit_roster) = match roster {
            RosterSource::Registry => (NameMatcher::new(manager.roster()), false),
            RosterSource::Names(names) => {
                let rows: Vec<RosterRow> = names
                    .iter()
                    .enumerate()
                    .map(|(idx, name)| RosterRow {
                        row_index: idx,
                        name: name.clone(),
                    })
                    .collect();
                (NameMatcher::new(&rows), true)
            }
        };

        let mut report = BatchReport::new(batch_id, scope, registry_path.to_path_buf());
        report.dry_run = self.config.dry_run;
        report.stale_backup = manager.stale_backup().map(Path::to_path_buf);

        info!(
            batch_id = %report.batch_id,
            scope = %scope,
            roster = matcher.roster_len(),
            lock = ?manager.lock_path(),
            "登记表已就绪"
        );
        Ok(BatchContext {
            manager,
            matcher,
            explicit_roster,
            report,
            deferred: Vec::new(),
            started: Instant::now(),
        })
    }

    /// 处理过程中出现致命错误: 回滚已暂存的修改
    fn abort(&self, mut ctx: BatchContext, err: EngineError) -> EngineError {
        if ctx.manager.state() == RegistryState::Validated {
            if let Err(e) = ctx.manager.rollback() {
                warn!(error = %e, "中止批次时回滚失败");
            }
        }
        err
    }

    /// 提交登记表,执行延迟文档回写与审计日志
    fn finish(&self, mut ctx: BatchContext) -> EngineResult<BatchReport> {
        let outcome = match ctx.manager.commit() {
            Ok(outcome) => outcome,
            Err(e) => {
                let mut report = ctx.report;
                report.mark_not_persisted();
                report.elapsed_ms = ctx.started.elapsed().as_millis();
                warn!(
                    batch_id = %report.batch_id,
                    error = %e,
                    "登记表保存失败,本批次写入均未生效"
                );
                return Err(EngineError::CommitFailed {
                    path: ctx.manager.path().to_path_buf(),
                    cause: e.to_string(),
                    report: Box::new(report),
                });
            }
        };

        ctx.report.persisted = outcome != CommitOutcome::DryRun;

        if outcome != CommitOutcome::DryRun {
            self.apply_deferred_writes(&mut ctx);
        }
        if outcome == CommitOutcome::Saved {
            self.record_audit(&mut ctx.report);
        }

        let mut report = ctx.report;
        report.elapsed_ms = ctx.started.elapsed().as_millis();
        info!(
            batch_id = %report.batch_id,
            total = report.total,
            success = report.success,
            failed = report.failed,
            skipped = report.skipped,
            outcome = ?outcome,
            elapsed_ms = report.elapsed_ms as u64,
            "批次完成"
        );
        Ok(report)
    }

    fn apply_deferred_writes(&self, ctx: &mut BatchContext) {
        for write in std::mem::take(&mut ctx.deferred) {
            let note = match self.writer.write_grade(
                &write.path,
                &write.grade,
                write.comment.as_deref(),
                true,
            ) {
                Ok(DocumentWriteOutcome::Written) => "document_locked".to_string(),
                Ok(DocumentWriteOutcome::Vetoed) => "document_already_locked".to_string(),
                Err(e) => {
                    warn!(path = %write.path.display(), error = %e, "文档回写失败");
                    ctx.report
                        .notes
                        .push(format!("文档回写失败 {}: {}", write.path.display(), e));
                    format!("document_write_failed: {}", e)
                }
            };
            if let Some(entry) = ctx.report.entries.get_mut(write.entry_index) {
                entry.notes.push(note);
            }
        }
    }

    /// 审计日志失败只告警,不影响已提交的登记表
    fn record_audit(&self, report: &mut BatchReport) {
        let Some(db_path) = self.config.audit_db_path.as_ref() else {
            return;
        };

        let recorded_at = Utc::now().naive_utc();
        let entries: Vec<GradeAuditEntry> = report
            .entries
            .iter()
            .filter_map(|entry| match &entry.result {
                WriteResult::Success {
                    row,
                    column,
                    old_value,
                    new_value,
                } => Some(GradeAuditEntry {
                    audit_id: Uuid::new_v4().to_string(),
                    batch_id: report.batch_id.clone(),
                    registry_path: report.registry_path.display().to_string(),
                    student_name: row.name.clone(),
                    column_header: column.header.clone(),
                    old_value: old_value.clone(),
                    new_value: new_value.clone(),
                    source_path: entry.source_path.display().to_string(),
                    recorded_at,
                }),
                _ => None,
            })
            .collect();
        if entries.is_empty() {
            return;
        }

        let result = GradeAuditRepository::open(db_path)
            .and_then(|repo| repo.batch_insert(&entries));
        match result {
            Ok(count) => debug!(count = count, "审计日志已写入"),
            Err(e) => {
                warn!(db = %db_path.display(), error = %e, "审计日志写入失败");
                report.notes.push(format!("审计日志写入失败: {}", e));
            }
        }
    }

    // ==========================================
    // 单个文件处理
    // ==========================================

    fn process_document(&self, ctx: &mut BatchContext, path: &Path) -> EngineResult<()> {
        let extraction = match self.extractor.extract_document(path) {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "学生文档无法读取");
                let mut entry = ReportEntry::new(
                    path.to_path_buf(),
                    WriteResult::Failed {
                        reason: FailureReason::ArtifactUnreadable {
                            detail: e.to_string(),
                        },
                    },
                );
                entry.raw_identifier = Some(self.extractor.derive_identifier(path));
                entry.assignment_number = Some(self.extractor.assignment_for_document(path).number);
                ctx.report.push(entry);
                return Ok(());
            }
        };

        let raw_identifier = extraction.raw_identifier().to_string();
        let assignment = extraction.assignment();
        let mut notes = Vec::new();
        let mut fallback = None;

        let result = match extraction {
            DocumentExtraction::Graded(record) => self.apply(ctx, &record, &mut notes)?,
            DocumentExtraction::Ungraded { .. } => WriteResult::Skipped {
                reason: SkipReason::Ungraded,
            },
            DocumentExtraction::Locked { .. } => WriteResult::Skipped {
                reason: SkipReason::Locked,
            },
            DocumentExtraction::Unparseable { raw_grade, .. } => WriteResult::Failed {
                reason: FailureReason::UnparseableGrade { raw_grade },
            },
            DocumentExtraction::FormatError { detail, .. } => {
                let grade = self.config.fallback()?;
                let record = CandidateRecord {
                    raw_identifier: raw_identifier.clone(),
                    assignment,
                    grade,
                    comment: Some(self.config.fallback_comment.clone()),
                    source_path: path.to_path_buf(),
                    row_number: None,
                };
                notes.push(format!("format_error: {}", detail));
                let result = self.apply(ctx, &record, &mut notes)?;
                if !matches!(result, WriteResult::Failed { .. }) {
                    fallback = Some((grade, record.comment));
                }
                result
            }
        };

        debug!(
            path = %path.display(),
            raw_identifier = %raw_identifier,
            result = result.reason_code().unwrap_or("success"),
            "学生文档处理完成"
        );

        let mut entry = ReportEntry::new(path.to_path_buf(), result);
        entry.raw_identifier = Some(raw_identifier);
        entry.assignment_number = Some(assignment.number);
        entry.notes = notes;
        ctx.report.push(entry);

        if let Some((grade, comment)) = fallback {
            ctx.deferred.push(DeferredDocumentWrite {
                entry_index: ctx.report.entries.len() - 1,
                path: path.to_path_buf(),
                grade,
                comment,
            });
        }
        Ok(())
    }

    fn process_summary(
        &self,
        ctx: &mut BatchContext,
        path: &Path,
        assignment: AssignmentIdentity,
    ) -> EngineResult<()> {
        let extraction = match self.extractor.extract_summary(path, assignment) {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "汇总表无法读取");
                let mut entry = ReportEntry::new(
                    path.to_path_buf(),
                    WriteResult::Failed {
                        reason: FailureReason::ArtifactUnreadable {
                            detail: e.to_string(),
                        },
                    },
                );
                entry.assignment_number = Some(assignment.number);
                ctx.report.push(entry);
                return Ok(());
            }
        };

        let mut rows: Vec<SummaryRow> = extraction
            .records
            .into_iter()
            .map(SummaryRow::Record)
            .chain(extraction.diagnostics.into_iter().map(SummaryRow::Diagnostic))
            .collect();
        rows.sort_by_key(SummaryRow::row_number);

        for row in rows {
            let mut notes = Vec::new();
            let (row_number, raw_identifier, result) = match row {
                SummaryRow::Record(record) => {
                    let result = self.apply(ctx, &record, &mut notes)?;
                    (record.row_number, record.raw_identifier, result)
                }
                SummaryRow::Diagnostic(diagnostic) => (
                    Some(diagnostic.row_number),
                    diagnostic.raw_identifier,
                    WriteResult::Failed {
                        reason: FailureReason::UnparseableGrade {
                            raw_grade: diagnostic.raw_grade,
                        },
                    },
                ),
            };

            let mut entry = ReportEntry::new(path.to_path_buf(), result);
            entry.row_number = row_number;
            entry.raw_identifier = Some(raw_identifier);
            entry.assignment_number = Some(assignment.number);
            entry.notes = notes;
            ctx.report.push(entry);
        }
        Ok(())
    }

    /// 匹配姓名并暂存写入
    ///
    /// 登记表层错误（快照无法保存等）视为批次级错误
    fn apply(
        &self,
        ctx: &mut BatchContext,
        record: &CandidateRecord,
        notes: &mut Vec<String>,
    ) -> EngineResult<WriteResult> {
        let matched = match ctx.matcher.match_name(&record.raw_identifier) {
            MatchOutcome::Matched(row) => row,
            MatchOutcome::Ambiguous(candidates) => {
                return Ok(WriteResult::Failed {
                    reason: FailureReason::AmbiguousMatch { candidates },
                })
            }
            MatchOutcome::NoMatch => {
                return Ok(WriteResult::Failed {
                    reason: FailureReason::NoMatch,
                })
            }
        };

        let row = if ctx.explicit_roster {
            match ctx.manager.find_row(&matched.name) {
                Some(row) => row,
                None => {
                    return Ok(WriteResult::Failed {
                        reason: FailureReason::RowNotFound { name: matched.name },
                    })
                }
            }
        } else {
            matched
        };

        let column = ctx
            .manager
            .resolve_column(record.assignment.number)
            .map_err(EngineError::from)?;
        let previous = ctx.manager.staged_value(&row, &column).map(str::to_string);

        let result = ctx
            .manager
            .stage_write(&row, &column, &record.grade)
            .map_err(EngineError::from)?;

        if let (Some(previous), WriteResult::Success { new_value, .. }) = (previous, &result) {
            warn!(
                student = %row.name,
                column = %column.header,
                previous = %previous,
                new = %new_value,
                "同一批次内重复写入同一单元格,以后处理的文件为准"
            );
            notes.push(format!("overrides_batch_value: {}", previous));
        }
        Ok(result)
    }
}

fn dir_name(dir: &Path) -> EngineResult<String> {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| EngineError::InvalidScope(format!("无效目录: {}", dir.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_invalid_scope_directory() {
        let orchestrator = BatchOrchestrator::new(EngineConfig::default()).unwrap();
        let dir = TempDir::new().unwrap();
        let result = orchestrator.run_assignment_scope(
            &dir.path().join("第1次作业"),
            &dir.path().join("登记表.xlsx"),
            &RosterSource::Registry,
        );
        assert!(matches!(result, Err(EngineError::InvalidScope(_))));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig {
            fallback_grade: "Z".to_string(),
            ..EngineConfig::default()
        };
        assert!(matches!(
            BatchOrchestrator::new(config),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_summary_discovery_filters() {
        let dir = TempDir::new().unwrap();
        for name in [
            "第2次作业.csv",
            "第1次作业.xlsx",
            "班级成绩登记表.xlsx",
            "~$第1次作业.xlsx",
            ".hidden.csv",
            "说明.csv",
            "张三_作业1.docx",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let orchestrator = BatchOrchestrator::new(EngineConfig::default()).unwrap();
        let registry = dir.path().join("班级成绩登记表.xlsx");
        let (summaries, ignored) = orchestrator.discover_summaries(dir.path(), &registry).unwrap();

        let names: Vec<String> = summaries
            .iter()
            .map(|(p, _)| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["第1次作业.xlsx", "第2次作业.csv"]);
        assert_eq!(summaries[1].1.number, 2);
        assert_eq!(ignored.len(), 1);
    }
}
