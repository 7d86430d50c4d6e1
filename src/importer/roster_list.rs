// ==========================================
// 成绩登记系统 - 外部花名册读取
// ==========================================
// 支持: .txt（每行一个姓名）/ 表格文件（按姓名列读取）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::UniversalFileParser;
use std::path::Path;
use tracing::debug;

/// 读取外部花名册
///
/// # 参数
/// - path: 花名册文件
/// - name_labels: 表格文件的姓名列表头候选
///
/// # 返回
/// - Ok(names): 去除空行与首尾空白,保留原顺序
pub fn load_roster_names(path: &Path, name_labels: &[String]) -> ImportResult<Vec<String>> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }

    let is_text = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("txt"));

    let names: Vec<String> = if is_text {
        let bytes = std::fs::read(path)?;
        String::from_utf8_lossy(&bytes)
            .trim_start_matches('\u{feff}')
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        let (headers, rows) = UniversalFileParser.parse(path)?;
        let header = name_labels
            .iter()
            .find(|label| headers.iter().any(|h| h == *label))
            .ok_or_else(|| ImportError::MissingColumn {
                path: path.display().to_string(),
                labels: name_labels.to_vec(),
            })?;
        rows.iter()
            .filter_map(|row| row.values.get(header))
            .filter(|name| !name.is_empty())
            .cloned()
            .collect()
    };

    debug!(path = %path.display(), count = names.len(), "外部花名册读取完成");
    Ok(names)
}
