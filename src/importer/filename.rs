// ==========================================
// 成绩登记系统 - 文件名姓名提取
// ==========================================
// 约定: "<姓名><分隔符><作业标签>.<ext>" 或反序
// 说明: 姓名只取自文件名,不读取正文
// ==========================================

use crate::domain::types::IdentifierPosition;
use crate::importer::assignment_resolver::AssignmentResolver;
use std::path::Path;

/// 作业标签段中常见的关键字
const LABEL_KEYWORDS: [&str; 7] = ["作业", "实验", "报告", "练习", "homework", "hw", "lab"];

/// 文件名主干（不含扩展名）
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// 段内一个或多个关键字之后允许出现的编号字符
fn is_label_number(c: char) -> bool {
    c.is_ascii_digit() || "一二三四五六七八九十零〇".contains(c)
}

/// 整段由关键字组成,或关键字后仅跟编号（`hw1`、`实验报告`、`作业三`）
fn is_keyword_label(part: &str) -> bool {
    let lower = part.to_lowercase();
    let mut rest = lower.as_str();
    let mut matched = false;
    while let Some(keyword) = LABEL_KEYWORDS.iter().find(|k| rest.starts_with(*k)) {
        rest = &rest[keyword.len()..];
        matched = true;
    }
    matched
        && rest
            .trim_start_matches([' ', '#', '.', '-'])
            .chars()
            .all(is_label_number)
}

fn looks_like_label(part: &str, resolver: &AssignmentResolver) -> bool {
    resolver.resolve_explicit(part).is_some() || is_keyword_label(part)
}

/// 从文件名主干中提取学生标识
///
/// # 参数
/// - stem: 文件名主干
/// - separators: 分隔符集合
/// - position: 姓名所在位置
/// - resolver: 用于识别作业标签段
///
/// # 规则
/// - 无分隔符: 整个主干即为标识
/// - Prefix / Suffix: 取首段 / 末段
/// - Auto: 跳过作业标签段与纯数字段（学号）后的首段;若全部被跳过则取首段
pub fn derive_identifier(
    stem: &str,
    separators: &[char],
    position: IdentifierPosition,
    resolver: &AssignmentResolver,
) -> String {
    let parts: Vec<&str> = stem
        .split(|c: char| separators.contains(&c))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if parts.len() <= 1 {
        return stem.trim().to_string();
    }

    let chosen = match position {
        IdentifierPosition::Prefix => parts[0],
        IdentifierPosition::Suffix => parts[parts.len() - 1],
        IdentifierPosition::Auto => parts
            .iter()
            .copied()
            .find(|p| !looks_like_label(p, resolver) && !p.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(parts[0]),
    };
    chosen.to_string()
}
