// ==========================================
// 成绩登记系统 - 学生文档读取
// ==========================================
// 支持: .docx / .txt
// 输出: 格式无关的段落序列（段落可归属某个表格单元格）
// ==========================================

use crate::importer::docx::read_docx;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::DocumentReader;
use std::path::Path;

/// 段落
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub text: String,
    pub cell: Option<usize>, // 所属表格单元格序号（不在表格内为 None）
}

/// 文档正文
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentBody {
    pub paragraphs: Vec<Paragraph>,
}

// ==========================================
// DocxReader
// ==========================================
pub struct DocxReader;

impl DocumentReader for DocxReader {
    fn read_body(&self, file_path: &Path) -> ImportResult<DocumentBody> {
        let part = read_docx(file_path)?;
        Ok(DocumentBody {
            paragraphs: part
                .paragraphs
                .into_iter()
                .map(|p| Paragraph {
                    text: p.text,
                    cell: p.cell,
                })
                .collect(),
        })
    }
}

// ==========================================
// PlainTextReader - 每行一个段落
// ==========================================
pub struct PlainTextReader;

impl DocumentReader for PlainTextReader {
    fn read_body(&self, file_path: &Path) -> ImportResult<DocumentBody> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }
        let bytes = std::fs::read(file_path)?;
        let text = String::from_utf8_lossy(&bytes);
        let text = text.trim_start_matches('\u{feff}');

        Ok(DocumentBody {
            paragraphs: text
                .lines()
                .map(|line| Paragraph {
                    text: line.to_string(),
                    cell: None,
                })
                .collect(),
        })
    }
}

/// 根据扩展名选择读取器
pub fn read_document(path: &Path) -> ImportResult<DocumentBody> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "docx" => DocxReader.read_body(path),
        "txt" => PlainTextReader.read_body(path),
        other => Err(ImportError::UnsupportedFormat(other.to_string())),
    }
}
