// ==========================================
// 成绩登记系统 - 学生文档回写
// ==========================================
// 职责: 将成绩/评语写回学生文档（格式错误兜底时使用）
// 红线: 文档已含锁定标记时不做任何修改
// ==========================================

use crate::config::EngineConfig;
use crate::domain::types::Grade;
use crate::importer::document::{DocumentBody, Paragraph};
use crate::importer::docx::{paragraph_xml, read_docx, save_docx};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::grade_marker::{contains_lock_marker, locate_signature_cell, marked_paragraphs};
use std::path::Path;
use tracing::{info, warn};

/// 回写结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentWriteOutcome {
    Written,
    Vetoed, // 已锁定,未修改
}

pub struct DocumentGradeWriter {
    config: EngineConfig,
}

impl DocumentGradeWriter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// 写入成绩与评语
    ///
    /// # 参数
    /// - grade: 成绩
    /// - comment: 评语（可选）
    /// - lock: 是否同时写入锁定标记
    ///
    /// # 规则
    /// - 有签字单元格: 替换单元格中标签之前的段落,标签段落及之后原样保留
    /// - 否则: 删除表格外旧的评分/评语行,在正文末尾追加
    pub fn write_grade(
        &self,
        path: &Path,
        grade: &Grade,
        comment: Option<&str>,
        lock: bool,
    ) -> ImportResult<DocumentWriteOutcome> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let outcome = match ext.as_str() {
            "docx" => self.write_docx(path, grade, comment, lock)?,
            "txt" => self.write_text(path, grade, comment, lock)?,
            other => return Err(ImportError::UnsupportedFormat(other.to_string())),
        };

        match outcome {
            DocumentWriteOutcome::Written => {
                info!(path = %path.display(), grade = %grade, lock = lock, "文档成绩已回写")
            }
            DocumentWriteOutcome::Vetoed => {
                warn!(path = %path.display(), "文档已锁定,拒绝回写")
            }
        }
        Ok(outcome)
    }

    /// 锁定时评语末尾补上锁定标记
    fn lock_line(&self, comment: Option<&str>, lock: bool) -> Option<String> {
        let marker = &self.config.lock_marker;
        match comment {
            _ if !lock => None,
            Some(c) if c.contains(marker.as_str()) => None,
            _ => Some(marker.clone()),
        }
    }

    fn freeform_lines(&self, grade: &Grade, comment: Option<&str>, lock: bool) -> Vec<String> {
        let mut lines = vec![format!("{}{}", self.config.freeform_grade_marker, grade)];
        if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
            lines.push(format!("{}{}", self.config.freeform_comment_marker, comment));
        }
        lines.extend(self.lock_line(comment, lock));
        lines
    }

    fn write_docx(
        &self,
        path: &Path,
        grade: &Grade,
        comment: Option<&str>,
        lock: bool,
    ) -> ImportResult<DocumentWriteOutcome> {
        let part = read_docx(path)?;
        let body = DocumentBody {
            paragraphs: part
                .paragraphs
                .iter()
                .map(|p| Paragraph {
                    text: p.text.clone(),
                    cell: p.cell,
                })
                .collect(),
        };

        if contains_lock_marker(&body, &self.config.lock_marker) {
            return Ok(DocumentWriteOutcome::Vetoed);
        }

        let mut edits = Vec::new();
        if let Some(cell) = locate_signature_cell(&body, &self.config.structured_cell_label) {
            let mut content = paragraph_xml(&grade.to_string());
            if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
                content.push_str(&paragraph_xml(comment));
            }
            if let Some(line) = self.lock_line(comment, lock) {
                content.push_str(&paragraph_xml(&line));
            }

            match cell.before.split_first() {
                Some((first, rest)) => {
                    edits.push((part.paragraphs[*first].range.clone(), content));
                    for idx in rest {
                        edits.push((part.paragraphs[*idx].range.clone(), String::new()));
                    }
                }
                None => {
                    let at = part.paragraphs[cell.label_paragraph].range.start;
                    edits.push((at..at, content));
                }
            }
        } else {
            let mut stale = marked_paragraphs(&body.paragraphs, &self.config.freeform_grade_marker);
            stale.extend(marked_paragraphs(
                &body.paragraphs,
                &self.config.freeform_comment_marker,
            ));
            stale.sort_unstable();
            stale.dedup();
            for idx in stale {
                edits.push((part.paragraphs[idx].range.clone(), String::new()));
            }

            let at = part.body_append_position()?;
            let content: String = self
                .freeform_lines(grade, comment, lock)
                .iter()
                .map(|line| paragraph_xml(line))
                .collect();
            edits.push((at..at, content));
        }

        let xml = part.apply_edits(edits);
        save_docx(path, &xml)?;
        Ok(DocumentWriteOutcome::Written)
    }

    fn write_text(
        &self,
        path: &Path,
        grade: &Grade,
        comment: Option<&str>,
        lock: bool,
    ) -> ImportResult<DocumentWriteOutcome> {
        let raw = std::fs::read_to_string(path)?;
        if raw.contains(self.config.lock_marker.as_str()) {
            return Ok(DocumentWriteOutcome::Vetoed);
        }

        let paragraphs: Vec<Paragraph> = raw
            .lines()
            .map(|line| Paragraph {
                text: line.to_string(),
                cell: None,
            })
            .collect();
        let mut stale = marked_paragraphs(&paragraphs, &self.config.freeform_grade_marker);
        stale.extend(marked_paragraphs(&paragraphs, &self.config.freeform_comment_marker));

        let mut lines: Vec<String> = paragraphs
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| !stale.contains(idx))
            .map(|(_, p)| p.text)
            .collect();
        lines.extend(self.freeform_lines(grade, comment, lock));

        let mut output = lines.join("\n");
        output.push('\n');
        std::fs::write(path, output).map_err(|e| ImportError::FileWriteError(e.to_string()))?;
        Ok(DocumentWriteOutcome::Written)
    }
}
