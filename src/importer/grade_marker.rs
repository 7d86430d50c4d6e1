// ==========================================
// 成绩登记系统 - 文档评分标记定位
// ==========================================
// 职责: 在段落序列中定位签字单元格、评分行、评语行与锁定标记
// 说明: 读路径（GradeExtractor）与写路径（DocumentGradeWriter）共用,
//       两者的段落序号一一对应
// ==========================================

use crate::domain::types::to_half_width;
use crate::importer::document::{DocumentBody, Paragraph};

/// 段落以标记开头时返回标记之后的文本
///
/// 比较前两侧都做全角转半角,`老师评分:A` 与 `老师评分：A` 等价
pub fn strip_marker(text: &str, marker: &str) -> Option<String> {
    let text = text.trim_start();
    let normalized_text = to_half_width(text);
    let normalized_marker = to_half_width(marker.trim());
    if normalized_marker.is_empty() || !normalized_text.starts_with(&normalized_marker) {
        return None;
    }
    // to_half_width 逐字符映射,字符数不变
    let skip = normalized_marker.chars().count();
    Some(text.chars().skip(skip).collect::<String>().trim().to_string())
}

pub fn contains_lock_marker(body: &DocumentBody, lock_marker: &str) -> bool {
    !lock_marker.is_empty() && body.paragraphs.iter().any(|p| p.text.contains(lock_marker))
}

/// 成绩标记取第一个空白分隔的词
pub fn grade_token(rest: &str) -> Option<String> {
    rest.split_whitespace().next().map(str::to_string)
}

// ==========================================
// 结构化文档: 教师签字单元格
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureCell {
    pub cell: usize,
    pub label_paragraph: usize,  // 标签所在段落序号
    pub before: Vec<usize>,      // 标签之前的段落序号（成绩 + 评语）
}

/// 定位第一个含标签段落的表格单元格
pub fn locate_signature_cell(body: &DocumentBody, label: &str) -> Option<SignatureCell> {
    let (label_paragraph, cell) = body
        .paragraphs
        .iter()
        .enumerate()
        .find_map(|(idx, p)| match p.cell {
            Some(cell) if strip_marker(&p.text, label).is_some() => Some((idx, cell)),
            _ => None,
        })?;

    let before = body
        .paragraphs
        .iter()
        .enumerate()
        .take(label_paragraph)
        .filter(|(_, p)| p.cell == Some(cell))
        .map(|(idx, _)| idx)
        .collect();

    Some(SignatureCell {
        cell,
        label_paragraph,
        before,
    })
}

/// 签字单元格中标签之前的内容: (成绩行, 评语)
///
/// 空行忽略;第 1 行为成绩,其余各行合并为评语
pub fn split_signature_text(
    body: &DocumentBody,
    cell: &SignatureCell,
) -> (Option<String>, Option<String>) {
    let lines: Vec<String> = cell
        .before
        .iter()
        .filter_map(|idx| body.paragraphs.get(*idx))
        .flat_map(|p| p.text.split('\n').map(|l| l.trim().to_string()).collect::<Vec<_>>())
        .filter(|l| !l.is_empty())
        .collect();

    let mut iter = lines.into_iter();
    let grade = iter.next();
    let rest: Vec<String> = iter.collect();
    let comment = if rest.is_empty() {
        None
    } else {
        Some(rest.join("\n"))
    };
    (grade, comment)
}

// ==========================================
// 自由格式文档: 末尾评分行 / 评语行
// ==========================================

/// 最后一个以标记开头的段落
///
/// # 参数
/// - outside_tables: 只看表格外的段落（写路径清理旧标记时使用）
pub fn last_marked_paragraph(
    paragraphs: &[Paragraph],
    marker: &str,
    outside_tables: bool,
) -> Option<(usize, String)> {
    paragraphs
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, p)| !outside_tables || p.cell.is_none())
        .find_map(|(idx, p)| strip_marker(&p.text, marker).map(|rest| (idx, rest)))
}

/// 所有以标记开头的表格外段落
pub fn marked_paragraphs(paragraphs: &[Paragraph], marker: &str) -> Vec<usize> {
    paragraphs
        .iter()
        .enumerate()
        .filter(|(_, p)| p.cell.is_none() && strip_marker(&p.text, marker).is_some())
        .map(|(idx, _)| idx)
        .collect()
}
