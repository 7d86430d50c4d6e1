// ==========================================
// 成绩登记系统 - docx 正文读写
// ==========================================
// 职责: 读取 word/document.xml,定位段落与表格单元格的字节区间;
//       按区间改写正文并重新打包
// 红线: 除 word/document.xml 外,容器内其他条目原样拷贝
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::ops::Range;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const DOCUMENT_PART: &str = "word/document.xml";

/// 段落（含在正文 XML 中的字节区间）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphSpan {
    pub text: String,
    pub range: Range<usize>,
    pub cell: Option<usize>,
}

/// 表格单元格 `<w:tc>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSpan {
    pub range: Range<usize>,
    pub paragraphs: Vec<usize>,
}

/// 解析后的 document.xml
#[derive(Debug, Clone)]
pub struct DocxPart {
    pub xml: String,
    pub paragraphs: Vec<ParagraphSpan>,
    pub cells: Vec<CellSpan>,
}

/// Read a file from a ZIP archive.
fn read_zip_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> ImportResult<String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| ImportError::DocxParseError(format!("缺少 {}: {}", path, e)))?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

/// 读取并解析 docx 正文
pub fn read_docx(path: &Path) -> ImportResult<DocxPart> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;
    let xml = read_zip_file(&mut archive, DOCUMENT_PART)?;
    parse_document_xml(xml)
}

fn resolve_entity(name: &[u8]) -> Option<char> {
    match name {
        b"amp" => Some('&'),
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        _ => {
            let name = std::str::from_utf8(name).ok()?;
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

/// 解析 document.xml,记录段落文本与区间
///
/// 段落文本由 `<w:t>` 拼接,`<w:tab/>` 记为制表符,`<w:br/>` / `<w:cr/>` 记为换行
pub fn parse_document_xml(xml: String) -> ImportResult<DocxPart> {
    let mut paragraphs: Vec<ParagraphSpan> = Vec::new();
    let mut cells: Vec<CellSpan> = Vec::new();

    {
        let mut reader = Reader::from_str(&xml);
        let mut cell_stack: Vec<usize> = Vec::new();
        let mut para_stack: Vec<(usize, String)> = Vec::new();
        let mut in_text = false;

        loop {
            let start = reader.buffer_position() as usize;
            match reader.read_event() {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"w:p" => para_stack.push((start, String::new())),
                    b"w:tc" => {
                        cells.push(CellSpan {
                            range: start..start,
                            paragraphs: Vec::new(),
                        });
                        cell_stack.push(cells.len() - 1);
                    }
                    b"w:t" => in_text = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"w:p" => {
                        let end = reader.buffer_position() as usize;
                        let cell = cell_stack.last().copied();
                        if let Some(c) = cell {
                            cells[c].paragraphs.push(paragraphs.len());
                        }
                        paragraphs.push(ParagraphSpan {
                            text: String::new(),
                            range: start..end,
                            cell,
                        });
                    }
                    b"w:tab" => {
                        if let Some((_, text)) = para_stack.last_mut() {
                            text.push('\t');
                        }
                    }
                    b"w:br" | b"w:cr" => {
                        if let Some((_, text)) = para_stack.last_mut() {
                            text.push('\n');
                        }
                    }
                    _ => {}
                },
                Ok(Event::Text(e)) if in_text => {
                    if let Some((_, text)) = para_stack.last_mut() {
                        text.push_str(&unescape_xml(&String::from_utf8_lossy(e.as_ref())));
                    }
                }
                Ok(Event::GeneralRef(e)) if in_text => {
                    if let (Some((_, text)), Some(c)) = (para_stack.last_mut(), resolve_entity(&e)) {
                        text.push(c);
                    }
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"w:t" => in_text = false,
                    b"w:p" => {
                        if let Some((para_start, text)) = para_stack.pop() {
                            let end = reader.buffer_position() as usize;
                            let cell = cell_stack.last().copied();
                            if let Some(c) = cell {
                                cells[c].paragraphs.push(paragraphs.len());
                            }
                            paragraphs.push(ParagraphSpan {
                                text,
                                range: para_start..end,
                                cell,
                            });
                        }
                    }
                    b"w:tc" => {
                        if let Some(c) = cell_stack.pop() {
                            cells[c].range.end = reader.buffer_position() as usize;
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ImportError::DocxParseError(format!(
                        "document.xml 第 {} 字节处解析失败: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
        }
    }

    // 嵌套段落（文本框）以结束顺序入列,这里恢复文档顺序
    let mut order: Vec<usize> = (0..paragraphs.len()).collect();
    order.sort_by_key(|&i| paragraphs[i].range.start);
    if order.iter().enumerate().any(|(pos, &i)| pos != i) {
        let mut remap = vec![0usize; paragraphs.len()];
        for (pos, &i) in order.iter().enumerate() {
            remap[i] = pos;
        }
        let mut sorted: Vec<ParagraphSpan> = order.iter().map(|&i| paragraphs[i].clone()).collect();
        std::mem::swap(&mut paragraphs, &mut sorted);
        for cell in &mut cells {
            for p in &mut cell.paragraphs {
                *p = remap[*p];
            }
            cell.paragraphs.sort_unstable();
        }
    }

    Ok(DocxPart {
        xml,
        paragraphs,
        cells,
    })
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// 生成一个纯文本段落;文本中的换行写为 `<w:br/>`
pub fn paragraph_xml(text: &str) -> String {
    let mut runs = String::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            runs.push_str("<w:br/>");
        }
        runs.push_str(&format!(
            "<w:t xml:space=\"preserve\">{}</w:t>",
            escape_xml(line)
        ));
    }
    format!("<w:p><w:r>{}</w:r></w:p>", runs)
}

impl DocxPart {
    /// 正文末尾可追加段落的位置（body 级 `<w:sectPr>` 之前）
    pub fn body_append_position(&self) -> ImportResult<usize> {
        let body_end = self
            .xml
            .rfind("</w:body>")
            .ok_or_else(|| ImportError::DocxParseError("缺少 </w:body>".to_string()))?;

        let last_block_end = self
            .paragraphs
            .iter()
            .map(|p| p.range.end)
            .chain(self.xml[..body_end].rfind("</w:tbl>").map(|i| i + "</w:tbl>".len()))
            .max()
            .unwrap_or(0);

        match self.xml[..body_end].rfind("<w:sectPr") {
            Some(sect) if sect >= last_block_end => Ok(sect),
            _ => Ok(body_end),
        }
    }

    /// 按区间批量改写正文,返回新 XML
    ///
    /// # 参数
    /// - edits: (区间, 替换内容),区间之间不得重叠
    pub fn apply_edits(&self, mut edits: Vec<(Range<usize>, String)>) -> String {
        edits.sort_by_key(|(range, _)| std::cmp::Reverse(range.start));
        let mut xml = self.xml.clone();
        for (range, replacement) in edits {
            xml.replace_range(range, &replacement);
        }
        xml
    }
}

/// 用新的 document.xml 重新打包 docx,其余条目原样拷贝
pub fn save_docx(path: &Path, document_xml: &str) -> ImportResult<()> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        if entry.name() == DOCUMENT_PART {
            drop(entry);
            writer.start_file(DOCUMENT_PART, options)?;
            writer
                .write_all(document_xml.as_bytes())
                .map_err(|e| ImportError::FileWriteError(e.to_string()))?;
        } else {
            writer.raw_copy_file(entry)?;
        }
    }

    let bytes = writer.finish()?.into_inner();
    std::fs::write(path, bytes).map_err(|e| ImportError::FileWriteError(e.to_string()))?;
    Ok(())
}
