// ==========================================
// 成绩登记系统 - 提取层
// ==========================================
// 职责: 学生文档 / 班级汇总表 → 候选成绩;格式错误兜底时回写文档
// 支持: docx, txt, xlsx, xls, csv
// ==========================================

// 模块声明
pub mod assignment_resolver;
pub mod document;
pub mod document_writer;
pub mod docx;
pub mod error;
pub mod file_parser;
pub mod filename;
pub mod grade_extractor;
pub mod grade_marker;
pub mod importer_trait;
pub mod roster_list;

// 重导出核心类型
pub use assignment_resolver::AssignmentResolver;
pub use document::{read_document, DocumentBody, DocxReader, Paragraph, PlainTextReader};
pub use document_writer::{DocumentGradeWriter, DocumentWriteOutcome};
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use grade_extractor::GradeExtractor;
pub use roster_list::load_roster_names;

// 重导出 Trait 接口
pub use importer_trait::{DocumentReader, FileParser, RawRow};
