// ==========================================
// 成绩登记系统 - 姓名匹配引擎
// ==========================================
// 规则: 精确匹配（逐字节）唯一命中 > 规范化匹配唯一命中 > 歧义 / 无匹配
// 红线: 纯函数,无副作用;批次内花名册冻结,索引只建一次;
//       歧义与无匹配都不猜测
// ==========================================

use crate::domain::roster::RosterRow;
use crate::domain::types::to_half_width;
use std::collections::HashMap;

/// 规范化时去除的标点
const STRIPPED_PUNCTUATION: &[char] = &[
    '·', '•', '・', '.', '。', ',', '，', '、', '-', '_', '—', '(', ')', '（', '）', '[', ']', '【',
    '】', '\'', '"', '“', '”', '‘', '’',
];

/// 姓名规范化: 全角转半角,去空白（含全角空格）与标点,转小写
pub fn normalize_name(name: &str) -> String {
    to_half_width(name)
        .chars()
        .filter(|c| !c.is_whitespace() && !STRIPPED_PUNCTUATION.contains(c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// 匹配结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched(RosterRow),
    Ambiguous(Vec<String>), // 候选姓名（花名册顺序）
    NoMatch,
}

// ==========================================
// NameMatcher - 批次内花名册索引
// ==========================================
pub struct NameMatcher {
    rows: Vec<RosterRow>,
    exact: HashMap<String, Vec<usize>>,
    normalized: HashMap<String, Vec<usize>>,
}

impl NameMatcher {
    /// 建立索引（批次开始时调用一次）
    pub fn new(roster: &[RosterRow]) -> Self {
        let mut exact: HashMap<String, Vec<usize>> = HashMap::new();
        let mut normalized: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, row) in roster.iter().enumerate() {
            exact.entry(row.name.clone()).or_default().push(idx);
            let key = normalize_name(&row.name);
            if !key.is_empty() {
                normalized.entry(key).or_default().push(idx);
            }
        }
        Self {
            rows: roster.to_vec(),
            exact,
            normalized,
        }
    }

    pub fn roster_len(&self) -> usize {
        self.rows.len()
    }

    /// 将原始标识解析为唯一的花名册行
    pub fn match_name(&self, raw_identifier: &str) -> MatchOutcome {
        if let Some([idx]) = self.exact.get(raw_identifier).map(Vec::as_slice) {
            return MatchOutcome::Matched(self.rows[*idx].clone());
        }

        let key = normalize_name(raw_identifier);
        if key.is_empty() {
            return MatchOutcome::NoMatch;
        }
        match self.normalized.get(&key).map(Vec::as_slice) {
            None | Some([]) => MatchOutcome::NoMatch,
            Some([idx]) => MatchOutcome::Matched(self.rows[*idx].clone()),
            Some(indices) => {
                let mut candidates: Vec<String> = Vec::new();
                for idx in indices {
                    let name = &self.rows[*idx].name;
                    if !candidates.contains(name) {
                        candidates.push(name.clone());
                    }
                }
                MatchOutcome::Ambiguous(candidates)
            }
        }
    }
}
