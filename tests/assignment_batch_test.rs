// ==========================================
// 单次作业目录批次集成测试
// ==========================================
// 测试目标: 文档提取 → 姓名匹配 → 登记表写入 → 提交 / 回滚
// ==========================================

mod helpers;

use grade_registry::config::EngineConfig;
use grade_registry::domain::{FailureReason, RosterSource, SkipReason, WriteResult};
use grade_registry::importer::read_document;
use grade_registry::registry::{RegistryLock, RegistrySnapshot};
use grade_registry::repository::GradeAuditRepository;
use grade_registry::{logging, BatchOrchestrator, EngineError};
use helpers::docx_builder::DocxBuilder;
use helpers::registry_builder::{cell_text, headers, CorruptingCodec, RegistryBuilder, RejectingCodec};
use std::sync::Arc;
use test_helpers::{bytes_of, file_names, test_config, Workspace};

const SIGNATURE: &str = "教师（签字）";

fn orchestrator(config: EngineConfig) -> BatchOrchestrator {
    BatchOrchestrator::new(config).unwrap()
}

// ==========================================
// 写入与匹配
// ==========================================

#[test]
fn test_structured_document_exact_match() {
    logging::init_test();
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"])
        .students(&["张三", "李四"])
        .write(&ws.registry());
    let dir = ws.subdir("第1次实验");
    DocxBuilder::new()
        .paragraph("实验目的: 熟悉链表")
        .signature_table(SIGNATURE, &["A", "完成得很好"])
        .write(&dir.join("张三_作业1.docx"));

    let report = orchestrator(test_config())
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry)
        .unwrap();

    assert_eq!((report.success, report.failed, report.skipped), (1, 0, 0));
    assert_eq!(report.assignment_number, Some(1));
    assert!(report.persisted);
    assert_eq!(headers(&ws.registry()), vec!["姓名", "第1次作业"]);
    assert_eq!(cell_text(&ws.registry(), "张三", "第1次作业").as_deref(), Some("A"));
    assert_eq!(cell_text(&ws.registry(), "李四", "第1次作业").as_deref(), Some(""));

    let WriteResult::Success { old_value, new_value, row, .. } = &report.entries[0].result else {
        panic!("expected success");
    };
    assert_eq!(row.name, "张三");
    assert_eq!(old_value, "");
    assert_eq!(new_value, "A");

    // 批次结束后不残留锁与快照
    assert_eq!(file_names(ws.root()), vec!["班级成绩登记表.xlsx", "第1次实验"]);
}

#[test]
fn test_signature_cell_read_in_plain_assignment_directory() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名", "第1次作业"])
        .row(&["张三", ""])
        .write(&ws.registry());
    let dir = ws.subdir("第1次作业");
    DocxBuilder::new()
        .signature_table(SIGNATURE, &["A", "好"])
        .write(&dir.join("张三_作业1.docx"));

    let report = orchestrator(test_config())
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry)
        .unwrap();

    assert_eq!((report.success, report.failed, report.skipped), (1, 0, 0));
    assert_eq!(cell_text(&ws.registry(), "张三", "第1次作业").as_deref(), Some("A"));
}

#[test]
fn test_freeform_text_document_overwrites_existing_grade() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名", "第1次作业", "备注"])
        .row(&["张三", "B", "缺交一次"])
        .write(&ws.registry());
    let dir = ws.subdir("第1次作业");
    ws.write_text(&dir, "张三_作业1.txt", "正文\n老师评分：A\n教师评价：思路清晰\n");

    let report = orchestrator(test_config())
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry)
        .unwrap();

    assert_eq!(report.success, 1);
    let WriteResult::Success { old_value, new_value, .. } = &report.entries[0].result else {
        panic!("expected success");
    };
    assert_eq!((old_value.as_str(), new_value.as_str()), ("B", "A"));
    assert_eq!(headers(&ws.registry()), vec!["姓名", "第1次作业", "备注"]);
    assert_eq!(cell_text(&ws.registry(), "张三", "备注").as_deref(), Some("缺交一次"));
}

#[test]
fn test_new_assignment_column_is_appended() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名", "第1次作业", "备注"])
        .row(&["张三", "B", "缺交一次"])
        .row(&["李四", "A", ""])
        .write(&ws.registry());
    let dir = ws.subdir("第2次作业");
    ws.write_text(&dir, "作业2_李四.txt", "老师评分：C\n");

    let report = orchestrator(test_config())
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry)
        .unwrap();

    assert_eq!(report.success, 1);
    assert_eq!(
        headers(&ws.registry()),
        vec!["姓名", "第1次作业", "备注", "第2次作业"]
    );
    assert_eq!(cell_text(&ws.registry(), "张三", "第1次作业").as_deref(), Some("B"));
    assert_eq!(cell_text(&ws.registry(), "张三", "备注").as_deref(), Some("缺交一次"));
    assert_eq!(cell_text(&ws.registry(), "李四", "第1次作业").as_deref(), Some("A"));
    assert_eq!(cell_text(&ws.registry(), "李四", "第2次作业").as_deref(), Some("C"));
}

#[test]
fn test_second_run_is_idempotent() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"]).students(&["张三"]).write(&ws.registry());
    let dir = ws.subdir("第1次作业");
    ws.write_text(&dir, "张三_作业1.txt", "老师评分：A\n");

    let orchestrator = orchestrator(test_config());
    let first = orchestrator
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry)
        .unwrap();
    assert_eq!(first.success, 1);
    let after_first = bytes_of(&ws.registry());

    let second = orchestrator
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry)
        .unwrap();
    assert_eq!((second.success, second.failed, second.skipped), (0, 0, 1));
    assert_eq!(
        second.entries[0].result,
        WriteResult::Skipped {
            reason: SkipReason::Unchanged { value: "A".into() }
        }
    );
    // 无修改时不重写登记表
    assert_eq!(bytes_of(&ws.registry()), after_first);
}

#[test]
fn test_ambiguous_name_is_not_guessed() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"])
        .students(&["李雷", "李 雷"])
        .write(&ws.registry());
    let original = bytes_of(&ws.registry());
    let dir = ws.subdir("第1次作业");
    ws.write_text(&dir, "李\u{3000}雷_作业1.txt", "老师评分：B\n");

    let report = orchestrator(test_config())
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry)
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(
        report.entries[0].result,
        WriteResult::Failed {
            reason: FailureReason::AmbiguousMatch {
                candidates: vec!["李雷".into(), "李 雷".into()]
            }
        }
    );
    assert_eq!(bytes_of(&ws.registry()), original);
}

#[test]
fn test_per_file_issues_do_not_stop_batch() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"])
        .students(&["张三", "李四", "王五"])
        .write(&ws.registry());
    let dir = ws.subdir("第2次作业");
    ws.write_text(&dir, "张三_作业2.txt", "老师评分：C\n");
    ws.write_text(&dir, "李四_作业2.txt", "还没批改\n");
    ws.write_text(&dir, "王五_作业2.txt", "老师评分：优\n");
    ws.write_text(&dir, "赵六_作业2.txt", "老师评分：A\n");
    std::fs::write(dir.join("孙七_作业2.docx"), b"not a zip").unwrap();
    std::fs::write(dir.join("~$张三_作业2.docx"), b"owner").unwrap();
    std::fs::write(dir.join("说明.pdf"), b"%PDF").unwrap();

    let report = orchestrator(test_config())
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry)
        .unwrap();

    assert_eq!(report.total, 5);
    assert_eq!((report.success, report.failed, report.skipped), (1, 3, 1));

    let codes: Vec<(String, Option<&str>)> = report
        .entries
        .iter()
        .map(|e| {
            (
                e.source_path.file_name().unwrap().to_string_lossy().to_string(),
                e.result.reason_code(),
            )
        })
        .collect();
    assert!(codes.contains(&("孙七_作业2.docx".into(), Some("artifact_unreadable"))));
    assert!(codes.contains(&("李四_作业2.txt".into(), Some("ungraded"))));
    assert!(codes.contains(&("王五_作业2.txt".into(), Some("unparseable_grade"))));
    assert!(codes.contains(&("赵六_作业2.txt".into(), Some("no_match"))));
    assert!(codes.contains(&("张三_作业2.txt".into(), None)));

    assert_eq!(cell_text(&ws.registry(), "张三", "第2次作业").as_deref(), Some("C"));
    assert!(report.render().contains("[no_match]"));
}

// ==========================================
// 锁定与格式错误兜底
// ==========================================

#[test]
fn test_lock_marker_vetoes_write() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名", "第1次作业"])
        .row(&["张三", "D"])
        .write(&ws.registry());
    let original = bytes_of(&ws.registry());
    let dir = ws.subdir("第1次作业");
    let doc = ws.write_text(
        &dir,
        "张三_作业1.txt",
        "老师评分：A\n教师评价：【格式错误-已锁定】请重交\n",
    );
    let doc_bytes = bytes_of(&doc);

    let report = orchestrator(test_config())
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry)
        .unwrap();

    assert_eq!(
        report.entries[0].result,
        WriteResult::Skipped {
            reason: SkipReason::Locked
        }
    );
    assert_eq!(bytes_of(&ws.registry()), original);
    assert_eq!(bytes_of(&doc), doc_bytes);
}

#[test]
fn test_format_error_fallback_locks_document() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"]).students(&["王五"]).write(&ws.registry());
    let dir = ws.subdir("第1次实验");
    let doc = dir.join("王五_作业1.docx");
    DocxBuilder::new()
        .paragraph("实验内容")
        .paragraph("没有使用模板")
        .write(&doc);

    let orchestrator = orchestrator(test_config());
    let report = orchestrator
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry)
        .unwrap();

    assert_eq!(report.success, 1);
    assert_eq!(cell_text(&ws.registry(), "王五", "第1次作业").as_deref(), Some("D"));
    let notes = &report.entries[0].notes;
    assert!(notes.iter().any(|n| n.starts_with("format_error")));
    assert!(notes.iter().any(|n| n == "document_locked"));

    let text = read_document(&doc)
        .unwrap()
        .paragraphs
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    assert!(text.contains("老师评分：D"));
    assert!(text.contains("【格式错误-已锁定】"));
    assert!(text.contains("实验内容"));

    // 再次运行: 文档已锁定,不再改动任何文件
    let registry_bytes = bytes_of(&ws.registry());
    let doc_bytes = bytes_of(&doc);
    let second = orchestrator
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry)
        .unwrap();
    assert_eq!(
        second.entries[0].result,
        WriteResult::Skipped {
            reason: SkipReason::Locked
        }
    );
    assert_eq!(bytes_of(&ws.registry()), registry_bytes);
    assert_eq!(bytes_of(&doc), doc_bytes);
}

#[test]
fn test_format_error_without_roster_match_leaves_document() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"]).students(&["张三"]).write(&ws.registry());
    let dir = ws.subdir("第1次实验");
    let doc = dir.join("查无此人_作业1.docx");
    DocxBuilder::new().paragraph("实验内容").write(&doc);
    let doc_bytes = bytes_of(&doc);

    let report = orchestrator(test_config())
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry)
        .unwrap();

    assert_eq!(report.entries[0].result.reason_code(), Some("no_match"));
    assert_eq!(bytes_of(&doc), doc_bytes);
}

// ==========================================
// 原子性
// ==========================================

#[test]
fn test_failed_save_rolls_back_byte_exact() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"])
        .students(&["张三", "李四"])
        .write(&ws.registry());
    let original = bytes_of(&ws.registry());
    let dir = ws.subdir("第1次作业");
    ws.write_text(&dir, "张三_作业1.txt", "老师评分：A\n");
    ws.write_text(&dir, "李四_作业1.txt", "老师评分：B\n");

    let codec = Arc::new(CorruptingCodec::new());
    let result = orchestrator(test_config())
        .with_codec(codec.clone())
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry);

    let Err(EngineError::CommitFailed { report, .. }) = result else {
        panic!("expected commit failure");
    };
    assert!(!report.persisted);
    assert_eq!(report.success, 2);
    assert!(report
        .entries
        .iter()
        .all(|e| e.notes.iter().any(|n| n == "not_persisted")));

    assert_eq!(bytes_of(&ws.registry()), original);
    assert!(!RegistrySnapshot::backup_path(&ws.registry()).exists());
    assert!(!RegistryLock::sentinel_path(&ws.registry()).exists());
    assert_eq!(codec.encode_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn test_encode_error_keeps_registry_untouched() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"]).students(&["张三"]).write(&ws.registry());
    let original = bytes_of(&ws.registry());
    let dir = ws.subdir("第1次实验");
    let doc = dir.join("张三_作业1.docx");
    DocxBuilder::new().paragraph("没有签字表").write(&doc);
    let doc_bytes = bytes_of(&doc);

    let result = orchestrator(test_config())
        .with_codec(Arc::new(RejectingCodec))
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry);

    assert!(matches!(result, Err(EngineError::CommitFailed { .. })));
    assert_eq!(bytes_of(&ws.registry()), original);
    // 登记表未保存时不回写文档
    assert_eq!(bytes_of(&doc), doc_bytes);
}

// ==========================================
// 批次级错误
// ==========================================

#[test]
fn test_registry_held_by_another_writer() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"]).students(&["张三"]).write(&ws.registry());
    let dir = ws.subdir("第1次作业");
    ws.write_text(&dir, "张三_作业1.txt", "老师评分：A\n");

    let _held = RegistryLock::acquire(&ws.registry()).unwrap();
    let result = orchestrator(test_config()).run_assignment_scope(
        &dir,
        &ws.registry(),
        &RosterSource::Registry,
    );
    assert!(matches!(result, Err(EngineError::ArtifactLocked { .. })));
}

#[test]
fn test_registry_without_name_column() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["学号", "班级"])
        .row(&["2024001", "一班"])
        .write(&ws.registry());
    let dir = ws.subdir("第1次作业");

    let result = orchestrator(test_config()).run_assignment_scope(
        &dir,
        &ws.registry(),
        &RosterSource::Registry,
    );
    assert!(matches!(result, Err(EngineError::MalformedRegistry { .. })));
    assert!(!RegistryLock::sentinel_path(&ws.registry()).exists());
}

#[test]
fn test_unreadable_registry() {
    let ws = Workspace::new();
    std::fs::write(ws.registry(), b"this is not a workbook").unwrap();
    let dir = ws.subdir("第1次作业");

    let result = orchestrator(test_config()).run_assignment_scope(
        &dir,
        &ws.registry(),
        &RosterSource::Registry,
    );
    assert!(matches!(result, Err(EngineError::ArtifactUnreadable { .. })));

    let missing = orchestrator(test_config()).run_assignment_scope(
        &dir,
        &ws.root().join("不存在.xlsx"),
        &RosterSource::Registry,
    );
    assert!(matches!(missing, Err(EngineError::ArtifactUnreadable { .. })));
}

// ==========================================
// 试运行 / 外部花名册 / 审计 / 恢复
// ==========================================

#[test]
fn test_dry_run_touches_nothing() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"])
        .students(&["张三", "王五"])
        .write(&ws.registry());
    let original = bytes_of(&ws.registry());
    let dir = ws.subdir("第1次实验");
    DocxBuilder::new()
        .signature_table(SIGNATURE, &["B"])
        .write(&dir.join("张三_作业1.docx"));
    let fallback_doc = dir.join("王五_作业1.docx");
    DocxBuilder::new().paragraph("无模板").write(&fallback_doc);
    let doc_bytes = bytes_of(&fallback_doc);

    let config = EngineConfig {
        dry_run: true,
        ..test_config()
    };
    let report = orchestrator(config)
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry)
        .unwrap();

    assert!(report.dry_run);
    assert!(!report.persisted);
    assert_eq!(report.success, 2);
    assert_eq!(bytes_of(&ws.registry()), original);
    assert_eq!(bytes_of(&fallback_doc), doc_bytes);
    assert_eq!(file_names(ws.root()), vec!["班级成绩登记表.xlsx", "第1次实验"]);
}

#[test]
fn test_explicit_roster_requires_registry_row() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"]).students(&["张三"]).write(&ws.registry());
    let dir = ws.subdir("第1次作业");
    ws.write_text(&dir, "李四_作业1.txt", "老师评分：A\n");
    ws.write_text(&dir, "张 三_作业1.txt", "老师评分：B\n");

    let roster = RosterSource::Names(vec!["张三".into(), "李四".into()]);
    let report = orchestrator(test_config())
        .run_assignment_scope(&dir, &ws.registry(), &roster)
        .unwrap();

    let by_name = |name: &str| {
        report
            .entries
            .iter()
            .find(|e| e.raw_identifier.as_deref() == Some(name))
            .map(|e| e.result.clone())
            .unwrap()
    };
    assert_eq!(
        by_name("李四"),
        WriteResult::Failed {
            reason: FailureReason::RowNotFound {
                name: "李四".into()
            }
        }
    );
    assert!(by_name("张 三").is_success());
    assert_eq!(cell_text(&ws.registry(), "张三", "第1次作业").as_deref(), Some("B"));
}

#[test]
fn test_audit_journal_records_successful_writes() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"])
        .students(&["张三", "李四"])
        .write(&ws.registry());
    let dir = ws.subdir("第1次作业");
    ws.write_text(&dir, "张三_作业1.txt", "老师评分：A\n");
    ws.write_text(&dir, "李四_作业1.txt", "未批改\n");

    let audit_db = ws.root().join("audit.db");
    let config = EngineConfig {
        audit_db_path: Some(audit_db.clone()),
        ..test_config()
    };
    let report = orchestrator(config)
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry)
        .unwrap();

    let repo = GradeAuditRepository::open(&audit_db).unwrap();
    let entries = repo.find_by_batch(&report.batch_id).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].student_name, "张三");
    assert_eq!(entries[0].column_header, "第1次作业");
    assert_eq!(entries[0].new_value, "A");
}

#[test]
fn test_stale_backup_is_reported_and_recoverable() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"]).students(&["张三"]).write(&ws.registry());
    let original = bytes_of(&ws.registry());

    // 模拟上次批次在保存途中中断
    std::fs::write(RegistrySnapshot::backup_path(&ws.registry()), &original).unwrap();
    std::fs::write(ws.registry(), b"half written").unwrap();

    let orchestrator = orchestrator(test_config());
    assert!(orchestrator.recover_registry(&ws.registry()).unwrap());
    assert_eq!(bytes_of(&ws.registry()), original);
    assert!(!orchestrator.recover_registry(&ws.registry()).unwrap());

    // 未恢复的遗留备份: 改名保留并在报告中提示
    std::fs::write(RegistrySnapshot::backup_path(&ws.registry()), b"old").unwrap();
    let dir = ws.subdir("第1次作业");
    let report = orchestrator
        .run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry)
        .unwrap();
    let rotated = report.stale_backup.clone().unwrap();
    assert!(rotated.exists());
    assert!(!RegistrySnapshot::backup_path(&ws.registry()).exists());
    assert!(report.render().contains("遗留的备份"));
}

#[test]
fn test_unreadable_registry_keeps_backup_for_recover() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"]).students(&["张三"]).write(&ws.registry());
    let original = bytes_of(&ws.registry());
    let backup = RegistrySnapshot::backup_path(&ws.registry());
    std::fs::write(&backup, &original).unwrap();
    std::fs::write(ws.registry(), b"half written").unwrap();

    let dir = ws.subdir("第1次作业");
    ws.write_text(&dir, "张三_作业1.txt", "老师评分：A\n");
    let orchestrator = orchestrator(test_config());
    let result = orchestrator.run_assignment_scope(&dir, &ws.registry(), &RosterSource::Registry);

    assert!(matches!(result, Err(EngineError::ArtifactUnreadable { .. })));
    assert_eq!(bytes_of(&backup), original);
    assert_eq!(bytes_of(&ws.registry()), b"half written");

    assert!(orchestrator.recover_registry(&ws.registry()).unwrap());
    assert_eq!(bytes_of(&ws.registry()), original);
    assert!(!backup.exists());
}

#[cfg(target_os = "linux")]
#[test]
fn test_lock_left_by_exited_batch_does_not_block_recover() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"]).students(&["张三"]).write(&ws.registry());
    let original = bytes_of(&ws.registry());
    std::fs::write(RegistrySnapshot::backup_path(&ws.registry()), &original).unwrap();
    std::fs::write(ws.registry(), b"half written").unwrap();
    std::fs::write(
        RegistryLock::sentinel_path(&ws.registry()),
        r#"{"pid":4294967295,"acquired_at":"2026-01-01T08:00:00Z"}"#,
    )
    .unwrap();

    assert!(orchestrator(test_config()).recover_registry(&ws.registry()).unwrap());
    assert_eq!(bytes_of(&ws.registry()), original);
    assert_eq!(file_names(ws.root()), vec!["班级成绩登记表.xlsx"]);
}

#[test]
fn test_released_lock_allows_recover() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"]).students(&["张三"]).write(&ws.registry());
    let original = bytes_of(&ws.registry());
    std::fs::write(RegistrySnapshot::backup_path(&ws.registry()), &original).unwrap();
    std::fs::write(ws.registry(), b"half written").unwrap();
    // 持有者未释放便消失（Drop 未执行）
    std::mem::forget(RegistryLock::acquire(&ws.registry()).unwrap());

    let orchestrator = orchestrator(test_config());
    assert!(matches!(
        orchestrator.recover_registry(&ws.registry()),
        Err(EngineError::ArtifactLocked { .. })
    ));

    assert!(orchestrator.release_registry_lock(&ws.registry()).unwrap());
    assert!(orchestrator.recover_registry(&ws.registry()).unwrap());
    assert_eq!(bytes_of(&ws.registry()), original);
}

#[test]
fn test_missing_assignment_directory() {
    let ws = Workspace::new();
    RegistryBuilder::new(&["姓名"]).students(&["张三"]).write(&ws.registry());
    let result = orchestrator(test_config()).run_assignment_scope(
        &ws.root().join("第9次作业"),
        &ws.registry(),
        &RosterSource::Registry,
    );
    assert!(matches!(result, Err(EngineError::InvalidScope(_))));
}
