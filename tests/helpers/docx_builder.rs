// ==========================================
// docx 测试文档构建器
// ==========================================
// 只生成读取所需的最小容器: [Content_Types].xml + word/document.xml
// ==========================================

use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

enum Block {
    Paragraph(String),
    Table(Vec<Vec<Vec<String>>>), // 行 → 单元格 → 段落
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn paragraph(text: &str) -> String {
    format!(
        r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        escape(text)
    )
}

pub struct DocxBuilder {
    blocks: Vec<Block>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    pub fn paragraph(mut self, text: &str) -> Self {
        self.blocks.push(Block::Paragraph(text.to_string()));
        self
    }

    /// 单行表格,每个单元格由若干段落组成
    pub fn table_row(mut self, cells: &[&[&str]]) -> Self {
        let row = cells
            .iter()
            .map(|cell| cell.iter().map(|p| p.to_string()).collect())
            .collect();
        self.blocks.push(Block::Table(vec![row]));
        self
    }

    /// 带教师签字单元格的实验报告
    ///
    /// # 参数
    /// - grade_lines: 签字标签之前的段落（首行为成绩,其余为评语）
    pub fn signature_table(mut self, label: &str, grade_lines: &[&str]) -> Self {
        let mut cell: Vec<String> = grade_lines.iter().map(|s| s.to_string()).collect();
        cell.push(format!("{}：", label));
        self.blocks.push(Block::Table(vec![vec![
            vec!["成绩评定".to_string()],
            cell,
        ]]));
        self
    }

    pub fn document_xml(&self) -> String {
        let mut body = String::new();
        for block in &self.blocks {
            match block {
                Block::Paragraph(text) => body.push_str(&paragraph(text)),
                Block::Table(rows) => {
                    body.push_str("<w:tbl>");
                    for row in rows {
                        body.push_str("<w:tr>");
                        for cell in row {
                            body.push_str("<w:tc>");
                            for text in cell {
                                body.push_str(&paragraph(text));
                            }
                            body.push_str("</w:tc>");
                        }
                        body.push_str("</w:tr>");
                    }
                    body.push_str("</w:tbl>");
                }
            }
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr/></w:body></w:document>"#,
            body
        )
    }

    pub fn write(&self, path: &Path) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(CONTENT_TYPES.as_bytes()).unwrap();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(self.document_xml().as_bytes()).unwrap();
        zip.finish().unwrap();
    }
}
