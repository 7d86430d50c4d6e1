// ==========================================
// 成绩登记系统 - 成绩提取器
// ==========================================
// 职责: 学生文档 / 班级汇总表 → 候选成绩
// 红线: 只读,不修改任何来源文件;
//       锁定标记先于其他一切判断
// ==========================================

use crate::config::EngineConfig;
use crate::domain::candidate::{
    CandidateRecord, DocumentExtraction, DocumentKind, RowDiagnostic, TabularExtraction,
};
use crate::domain::types::{AssignmentIdentity, Grade};
use crate::importer::assignment_resolver::AssignmentResolver;
use crate::importer::document::{read_document, DocumentBody};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::filename::{derive_identifier, file_stem};
use crate::importer::grade_marker::{
    contains_lock_marker, grade_token, last_marked_paragraph, locate_signature_cell,
    split_signature_text,
};
use std::path::Path;
use tracing::{debug, instrument, warn};

pub struct GradeExtractor {
    config: EngineConfig,
    resolver: AssignmentResolver,
    parser: UniversalFileParser,
}

impl GradeExtractor {
    pub fn new(config: &EngineConfig) -> ImportResult<Self> {
        Ok(Self {
            config: config.clone(),
            resolver: AssignmentResolver::new(config.default_assignment_number)?,
            parser: UniversalFileParser,
        })
    }

    pub fn resolver(&self) -> &AssignmentResolver {
        &self.resolver
    }

    /// 文件名或所在目录名含结构化关键字: 此类文档必须带签字单元格
    pub fn is_structured(&self, path: &Path) -> bool {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let dir_name = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("");
        self.config
            .structured_keywords
            .iter()
            .filter(|k| !k.is_empty())
            .any(|k| file_name.contains(k.as_str()) || dir_name.contains(k.as_str()))
    }

    pub fn derive_identifier(&self, path: &Path) -> String {
        derive_identifier(
            &file_stem(path),
            &self.config.filename_separators,
            self.config.identifier_position,
            &self.resolver,
        )
    }

    /// 作业编号: 所在目录名 > 文件名 > 默认编号
    pub fn assignment_for_document(&self, path: &Path) -> AssignmentIdentity {
        let dir_name = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("");
        self.resolver
            .resolve_explicit(dir_name)
            .or_else(|| self.resolver.resolve_explicit(&file_stem(path)))
            .unwrap_or_else(|| self.resolver.resolve(dir_name))
    }

    // ==========================================
    // 学生文档模式
    // ==========================================

    /// 读取并解析一份学生文档
    ///
    /// # 返回
    /// - Ok(DocumentExtraction): 含未批改 / 锁定 / 格式错误等可恢复状态
    /// - Err: 文件不可读或损坏（由调用方记为 artifact_unreadable）
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn extract_document(&self, path: &Path) -> ImportResult<DocumentExtraction> {
        let body = read_document(path)?;
        Ok(self.inspect_body(path, &body))
    }

    /// 对已读取的正文做标记判定（不做 I/O）
    pub fn inspect_body(&self, path: &Path, body: &DocumentBody) -> DocumentExtraction {
        let raw_identifier = self.derive_identifier(path);
        let assignment = self.assignment_for_document(path);

        // 1. 锁定标记: 绝对否决
        if contains_lock_marker(body, &self.config.lock_marker) {
            debug!(raw_identifier = %raw_identifier, "文档含锁定标记");
            return DocumentExtraction::Locked {
                raw_identifier,
                assignment,
            };
        }

        // 2. 结构化 / 自由格式: 有签字单元格即按结构化读取,与路径无关;
        //    路径声明为结构化却找不到单元格时记为格式错误
        let signature_cell = locate_signature_cell(body, &self.config.structured_cell_label);
        if signature_cell.is_none() && self.is_structured(path) {
            warn!(raw_identifier = %raw_identifier, "结构化文档缺少教师签字单元格");
            return DocumentExtraction::FormatError {
                raw_identifier,
                assignment,
                detail: format!("未找到以「{}」开头的单元格", self.config.structured_cell_label),
            };
        }

        let (kind, token, comment) = if let Some(cell) = signature_cell {
            let (grade_line, comment) = split_signature_text(body, &cell);
            (
                DocumentKind::Structured,
                grade_line.as_deref().and_then(grade_token),
                comment,
            )
        } else {
            let token = last_marked_paragraph(&body.paragraphs, &self.config.freeform_grade_marker, false)
                .and_then(|(_, rest)| grade_token(&rest));
            let comment = last_marked_paragraph(
                &body.paragraphs,
                &self.config.freeform_comment_marker,
                false,
            )
            .map(|(_, rest)| rest)
            .filter(|rest| !rest.is_empty());
            (DocumentKind::Freeform, token, comment)
        };

        let Some(token) = token else {
            return DocumentExtraction::Ungraded {
                raw_identifier,
                assignment,
                kind,
            };
        };

        // 3. 词表校验
        match Grade::parse(&token, self.config.grading_scheme) {
            Some(grade) => DocumentExtraction::Graded(CandidateRecord {
                raw_identifier,
                assignment,
                grade,
                comment,
                source_path: path.to_path_buf(),
                row_number: None,
            }),
            None => DocumentExtraction::Unparseable {
                raw_identifier,
                assignment,
                raw_grade: token,
            },
        }
    }

    // ==========================================
    // 班级汇总表模式
    // ==========================================

    /// 读取一张汇总表（每行一名学生）
    ///
    /// # 参数
    /// - path: 汇总表路径（xlsx / xls / csv）
    /// - assignment: 该汇总表对应的作业
    ///
    /// # 返回
    /// - Ok(TabularExtraction): 成绩不可识别的行记入 diagnostics
    /// - Err: 文件不可读或缺少姓名列 / 成绩列
    #[instrument(skip(self), fields(path = %path.display(), assignment = assignment.number))]
    pub fn extract_summary(
        &self,
        path: &Path,
        assignment: AssignmentIdentity,
    ) -> ImportResult<TabularExtraction> {
        let (headers, rows) = self.parser.parse(path)?;

        let name_header = headers
            .iter()
            .find(|h| self.config.name_column_labels.iter().any(|l| l == *h))
            .cloned()
            .ok_or_else(|| ImportError::MissingColumn {
                path: path.display().to_string(),
                labels: self.config.name_column_labels.clone(),
            })?;

        let grade_header = self.summary_grade_header(&headers, assignment.number).ok_or_else(|| {
            let mut labels = self.config.summary_grade_labels.clone();
            labels.push(self.config.grade_column_header(assignment.number));
            ImportError::MissingColumn {
                path: path.display().to_string(),
                labels,
            }
        })?;

        let mut extraction = TabularExtraction::default();
        for row in rows {
            let name = row.values.get(&name_header).cloned().unwrap_or_default();
            let raw_grade = row.values.get(&grade_header).cloned().unwrap_or_default();
            if name.is_empty() || raw_grade.is_empty() {
                continue;
            }

            match Grade::parse(&raw_grade, self.config.grading_scheme) {
                Some(grade) => extraction.records.push(CandidateRecord {
                    raw_identifier: name,
                    assignment,
                    grade,
                    comment: None,
                    source_path: path.to_path_buf(),
                    row_number: Some(row.row_number),
                }),
                None => extraction.diagnostics.push(RowDiagnostic {
                    row_number: row.row_number,
                    raw_identifier: name,
                    raw_grade,
                }),
            }
        }

        debug!(
            records = extraction.records.len(),
            diagnostics = extraction.diagnostics.len(),
            "汇总表提取完成"
        );
        Ok(extraction)
    }

    /// 成绩列: 通用成绩表头 > 作业列名 > 能解析出同一作业编号的表头
    fn summary_grade_header(&self, headers: &[String], number: u32) -> Option<String> {
        let by_label = self
            .config
            .summary_grade_labels
            .iter()
            .find(|label| headers.iter().any(|h| h == *label))
            .cloned();
        if by_label.is_some() {
            return by_label;
        }

        let pattern = self.config.grade_column_header(number);
        headers
            .iter()
            .find(|h| **h == pattern)
            .or_else(|| {
                headers.iter().find(|h| {
                    self.resolver
                        .resolve_explicit(h)
                        .is_some_and(|id| id.number == number)
                })
            })
            .cloned()
    }
}
