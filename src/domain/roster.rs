// ==========================================
// 成绩登记系统 - 花名册
// ==========================================
// 职责: 登记表中的学生行、花名册来源
// 红线: 批次运行期间花名册只读
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// RosterRow - 登记表中的一行学生
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RosterRow {
    pub row_index: usize, // 工作表绝对行号（0 起）
    pub name: String,     // 姓名列原文
}

// ==========================================
// GradeColumn - 作业成绩列
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GradeColumn {
    pub col_index: usize,       // 工作表绝对列号（0 起）
    pub assignment_number: u32, // 对应作业编号
    pub header: String,         // 表头文本
}

// ==========================================
// RosterSource - 花名册来源
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RosterSource {
    /// 直接使用登记表姓名列
    #[default]
    Registry,

    /// 调用方提供的权威姓名列表;匹配到的姓名仍需在登记表中找到对应行
    Names(Vec<String>),
}
