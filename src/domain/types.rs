// ==========================================
// 成绩登记系统 - 领域类型定义
// ==========================================
// 职责: 评分制、成绩、作业身份等封闭类型
// 红线: 成绩在提取边界即完成校验,内部不传递裸字符串
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 评分制 (Grading Scheme)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GradeScheme {
    Letter,      // 等级制 A/B/C/D/E
    Qualitative, // 五级制 优秀/良好/中等/及格/不及格
    Numeric,     // 百分制 0-100
}

impl fmt::Display for GradeScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeScheme::Letter => write!(f, "LETTER"),
            GradeScheme::Qualitative => write!(f, "QUALITATIVE"),
            GradeScheme::Numeric => write!(f, "NUMERIC"),
        }
    }
}

// ==========================================
// 字母等级
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    E,
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LetterGrade::A => write!(f, "A"),
            LetterGrade::B => write!(f, "B"),
            LetterGrade::C => write!(f, "C"),
            LetterGrade::D => write!(f, "D"),
            LetterGrade::E => write!(f, "E"),
        }
    }
}

// ==========================================
// 五级制等级
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualitativeGrade {
    Excellent, // 优秀
    Good,      // 良好
    Medium,    // 中等
    Pass,      // 及格
    Fail,      // 不及格
}

impl QualitativeGrade {
    /// 按匹配优先级排列（"不及格" 必须先于 "及格"）
    const LABELS: [(&'static str, QualitativeGrade); 5] = [
        ("不及格", QualitativeGrade::Fail),
        ("优秀", QualitativeGrade::Excellent),
        ("良好", QualitativeGrade::Good),
        ("中等", QualitativeGrade::Medium),
        ("及格", QualitativeGrade::Pass),
    ];
}

impl fmt::Display for QualitativeGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualitativeGrade::Excellent => write!(f, "优秀"),
            QualitativeGrade::Good => write!(f, "良好"),
            QualitativeGrade::Medium => write!(f, "中等"),
            QualitativeGrade::Pass => write!(f, "及格"),
            QualitativeGrade::Fail => write!(f, "不及格"),
        }
    }
}

// ==========================================
// Grade - 已校验成绩
// ==========================================
// Numeric 限定 [0, 100]，展示时整数不带小数点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grade {
    Letter(LetterGrade),
    Qualitative(QualitativeGrade),
    Numeric(f64),
}

impl Grade {
    /// 按评分制解析成绩标记
    ///
    /// # 参数
    /// - token: 原始成绩文本（允许全角字符、首尾空白）
    /// - scheme: 当前配置的评分制
    ///
    /// # 返回
    /// - Some(Grade): 落在词表内
    /// - None: 无法识别
    pub fn parse(token: &str, scheme: GradeScheme) -> Option<Grade> {
        let normalized = to_half_width(token.trim());
        let normalized = normalized.trim();
        if normalized.is_empty() {
            return None;
        }

        match scheme {
            GradeScheme::Letter => {
                let letter = match normalized.to_uppercase().as_str() {
                    "A" => LetterGrade::A,
                    "B" => LetterGrade::B,
                    "C" => LetterGrade::C,
                    "D" => LetterGrade::D,
                    "E" => LetterGrade::E,
                    _ => return None,
                };
                Some(Grade::Letter(letter))
            }
            GradeScheme::Qualitative => QualitativeGrade::LABELS
                .iter()
                .find(|(label, _)| normalized == *label)
                .map(|(_, grade)| Grade::Qualitative(*grade)),
            GradeScheme::Numeric => {
                let value: f64 = normalized.trim_end_matches('分').parse().ok()?;
                if value.is_finite() && (0.0..=100.0).contains(&value) {
                    Some(Grade::Numeric(value))
                } else {
                    None
                }
            }
        }
    }

    pub fn scheme(&self) -> GradeScheme {
        match self {
            Grade::Letter(_) => GradeScheme::Letter,
            Grade::Qualitative(_) => GradeScheme::Qualitative,
            Grade::Numeric(_) => GradeScheme::Numeric,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::Letter(letter) => write!(f, "{}", letter),
            Grade::Qualitative(tier) => write!(f, "{}", tier),
            Grade::Numeric(value) => write!(f, "{}", format_number(*value)),
        }
    }
}

/// 数值展示：整数不带小数部分，与登记表单元格显示保持一致
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// 全角 ASCII（字母/数字/标点）转半角，全角空格转普通空格
pub fn to_half_width(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}

// ==========================================
// 作业身份 (Assignment Identity)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolverStrategy {
    ChineseOrdinal, // 第N次
    EnglishLabel,   // homework_N / hw_N
    TrailingLabel,  // 作业N
    Default,        // 兜底默认值
}

impl fmt::Display for ResolverStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverStrategy::ChineseOrdinal => write!(f, "CHINESE_ORDINAL"),
            ResolverStrategy::EnglishLabel => write!(f, "ENGLISH_LABEL"),
            ResolverStrategy::TrailingLabel => write!(f, "TRAILING_LABEL"),
            ResolverStrategy::Default => write!(f, "DEFAULT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentIdentity {
    pub number: u32,
    pub source: ResolverStrategy,
}

// ==========================================
// 文件名中姓名所在位置
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierPosition {
    Auto,   // 自动识别（排除作业标签段）
    Prefix, // 姓名_作业N
    Suffix, // 作业N_姓名
}
