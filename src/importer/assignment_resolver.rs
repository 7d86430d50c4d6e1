// ==========================================
// 成绩登记系统 - 作业编号识别
// ==========================================
// 职责: 从目录名/文件名识别作业编号
// 规则: 按固定顺序尝试各识别策略,首个命中即返回;
//       resolve() 最终兜底为配置的默认编号,resolve_explicit() 不兜底
// ==========================================

use crate::domain::types::{to_half_width, AssignmentIdentity, ResolverStrategy};
use crate::importer::error::ImportResult;
use regex::Regex;
use tracing::warn;

const CHINESE_DIGITS: &str = "零〇一二两三四五六七八九十百";

/// 识别策略: 输入文本 → 作业编号
pub trait ResolveStrategy: Send + Sync {
    fn kind(&self) -> ResolverStrategy;
    fn resolve(&self, text: &str) -> Option<u32>;
}

/// 解析阿拉伯数字或中文数字（支持到 999）
pub fn parse_number(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.parse().ok();
    }

    let mut total = 0u32;
    let mut current = 0u32;
    for c in raw.chars() {
        let digit = match c {
            '零' | '〇' => Some(0),
            '一' => Some(1),
            '二' | '两' => Some(2),
            '三' => Some(3),
            '四' => Some(4),
            '五' => Some(5),
            '六' => Some(6),
            '七' => Some(7),
            '八' => Some(8),
            '九' => Some(9),
            _ => None,
        };
        match (digit, c) {
            (Some(d), _) => current = d,
            (None, '十') => {
                total += current.max(1) * 10;
                current = 0;
            }
            (None, '百') => {
                total += current.max(1) * 100;
                current = 0;
            }
            _ => return None,
        }
    }
    Some(total + current)
}

// ==========================================
// 策略 1: 第N次
// ==========================================
struct ChineseOrdinal {
    pattern: Regex,
}

impl ChineseOrdinal {
    fn new() -> ImportResult<Self> {
        Ok(Self {
            pattern: Regex::new(&format!(r"第\s*([0-9]+|[{}]+)\s*次", CHINESE_DIGITS))?,
        })
    }
}

impl ResolveStrategy for ChineseOrdinal {
    fn kind(&self) -> ResolverStrategy {
        ResolverStrategy::ChineseOrdinal
    }

    fn resolve(&self, text: &str) -> Option<u32> {
        let caps = self.pattern.captures(text)?;
        parse_number(caps.get(1)?.as_str())
    }
}

// ==========================================
// 策略 2: homework_N / hw_N / assignmentN / labN
// ==========================================
struct EnglishLabel {
    pattern: Regex,
}

impl EnglishLabel {
    fn new() -> ImportResult<Self> {
        Ok(Self {
            pattern: Regex::new(r"(?i)(?:homework|assignment|hw|lab)[\s_\-]*([0-9]+)")?,
        })
    }
}

impl ResolveStrategy for EnglishLabel {
    fn kind(&self) -> ResolverStrategy {
        ResolverStrategy::EnglishLabel
    }

    fn resolve(&self, text: &str) -> Option<u32> {
        let caps = self.pattern.captures(text)?;
        parse_number(caps.get(1)?.as_str())
    }
}

// ==========================================
// 策略 3: 作业N / 实验N / 练习N
// ==========================================
struct TrailingLabel {
    pattern: Regex,
}

impl TrailingLabel {
    fn new() -> ImportResult<Self> {
        Ok(Self {
            pattern: Regex::new(&format!(
                r"(?:作业|实验|练习)\s*([0-9]+|[{}]+)",
                CHINESE_DIGITS
            ))?,
        })
    }
}

impl ResolveStrategy for TrailingLabel {
    fn kind(&self) -> ResolverStrategy {
        ResolverStrategy::TrailingLabel
    }

    fn resolve(&self, text: &str) -> Option<u32> {
        let caps = self.pattern.captures(text)?;
        parse_number(caps.get(1)?.as_str())
    }
}

// ==========================================
// AssignmentResolver - 有序策略链
// ==========================================
pub struct AssignmentResolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
    default_number: u32,
}

impl AssignmentResolver {
    /// 创建识别器
    ///
    /// # 参数
    /// - default_number: 所有策略均未命中时的兜底编号
    pub fn new(default_number: u32) -> ImportResult<Self> {
        Ok(Self {
            strategies: vec![
                Box::new(ChineseOrdinal::new()?),
                Box::new(EnglishLabel::new()?),
                Box::new(TrailingLabel::new()?),
            ],
            default_number,
        })
    }

    /// 仅尝试显式策略（不兜底）
    pub fn resolve_explicit(&self, text: &str) -> Option<AssignmentIdentity> {
        let normalized = to_half_width(text);
        self.strategies.iter().find_map(|strategy| {
            strategy
                .resolve(&normalized)
                .filter(|n| *n > 0)
                .map(|number| AssignmentIdentity {
                    number,
                    source: strategy.kind(),
                })
        })
    }

    /// 识别作业编号,全部未命中时返回默认编号
    pub fn resolve(&self, text: &str) -> AssignmentIdentity {
        self.resolve_explicit(text).unwrap_or_else(|| {
            warn!(
                text = text,
                default = self.default_number,
                "无法识别作业编号,使用默认编号"
            );
            AssignmentIdentity {
                number: self.default_number,
                source: ResolverStrategy::Default,
            }
        })
    }
}
