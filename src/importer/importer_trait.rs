// ==========================================
// 成绩登记系统 - 提取层 Trait
// ==========================================
// 职责: 定义文件解析接口（不包含实现）
// ==========================================

use crate::importer::document::DocumentBody;
use crate::importer::error::ImportResult;
use std::collections::HashMap;
use std::path::Path;

// ==========================================
// RawRow - 表格原始行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub row_number: usize,                 // 源文件行号（1 起,表头为第 1 行）
    pub values: HashMap<String, String>,   // 表头 → 单元格文本（已 TRIM）
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 汇总表 / 花名册等表格文件解析
// 实现者: CsvParser, ExcelParser
pub trait FileParser {
    /// 解析文件为原始行（跳过全空行）
    ///
    /// # 返回
    /// - Ok((表头, 行列表))
    /// - Err: 文件不存在、格式不支持、解析失败
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<(Vec<String>, Vec<RawRow>)>;
}

// ==========================================
// DocumentReader Trait
// ==========================================
// 用途: 学生提交文档解析为格式无关的段落序列
// 实现者: DocxReader, PlainTextReader
pub trait DocumentReader {
    fn read_body(&self, file_path: &Path) -> ImportResult<DocumentBody>;
}
