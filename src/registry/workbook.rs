// ==========================================
// 成绩登记系统 - 登记表工作簿模型
// ==========================================
// 读取: calamine（公式取缓存值）
// 写出: rust_xlsxwriter（保留全部工作表的单元格值）
// 坐标: 绝对行列号,0 起
// ==========================================

use crate::domain::types::format_number;
use crate::registry::error::{RegistryError, RegistryResult};
use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

// ==========================================
// CellValue - 单元格值
// ==========================================
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(f64), // Excel 序列值
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// 展示文本（与报告中的 old_value / new_value 一致）
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) | CellValue::DateTime(n) => format_number(*n),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        }
    }

    /// 往返比较: 空字符串与空单元格视为相同
    pub fn same_content(&self, other: &CellValue) -> bool {
        match (self, other) {
            (CellValue::Text(a), CellValue::Empty) | (CellValue::Empty, CellValue::Text(a)) => {
                a.is_empty()
            }
            (a, b) => a == b,
        }
    }

    fn from_calamine(data: &Data) -> CellValue {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Text(e.to_string()),
        }
    }
}

// ==========================================
// SheetGrid - 单个工作表（稀疏存储）
// ==========================================
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetGrid {
    pub name: String,
    cells: BTreeMap<(u32, u16), CellValue>,
}

impl SheetGrid {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    pub fn get(&self, row: u32, col: u16) -> &CellValue {
        self.cells.get(&(row, col)).unwrap_or(&EMPTY_CELL)
    }

    /// 写入单元格;空值即删除
    pub fn set(&mut self, row: u32, col: u16, value: CellValue) {
        if matches!(value, CellValue::Empty) {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), value);
        }
    }

    /// 一行中的非空单元格（按列序）
    pub fn row_cells(&self, row: u32) -> impl Iterator<Item = (u16, &CellValue)> {
        self.cells
            .range((row, 0)..=(row, u16::MAX))
            .filter(|(_, v)| !v.is_empty())
            .map(|((_, col), v)| (*col, v))
    }

    /// 第一条含内容的行
    pub fn first_non_empty_row(&self) -> Option<u32> {
        self.cells
            .iter()
            .find(|(_, v)| !v.is_empty())
            .map(|((row, _), _)| *row)
    }

    pub fn max_row(&self) -> Option<u32> {
        self.cells.keys().map(|(row, _)| *row).max()
    }

    pub fn cells(&self) -> impl Iterator<Item = ((u32, u16), &CellValue)> {
        self.cells.iter().map(|(pos, v)| (*pos, v))
    }

    /// 逐格比较,返回第一个不一致的位置
    pub fn first_difference(&self, other: &SheetGrid) -> Option<(u32, u16)> {
        self.cells
            .keys()
            .chain(other.cells.keys())
            .find(|(row, col)| !self.get(*row, *col).same_content(other.get(*row, *col)))
            .copied()
    }
}

// ==========================================
// RegistryWorkbook - 登记表工作簿
// ==========================================
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegistryWorkbook {
    pub sheets: Vec<SheetGrid>,
}

impl RegistryWorkbook {
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name == name)
    }
}

// ==========================================
// WorkbookCodec Trait
// ==========================================
// 用途: 登记表字节 ⇄ 内存工作簿
// 实现者: XlsxCodec
pub trait WorkbookCodec: Send + Sync {
    fn decode(&self, bytes: &[u8], path: &Path) -> RegistryResult<RegistryWorkbook>;
    fn encode(&self, workbook: &RegistryWorkbook, path: &Path) -> RegistryResult<Vec<u8>>;
}

// ==========================================
// XlsxCodec
// ==========================================
pub struct XlsxCodec;

impl WorkbookCodec for XlsxCodec {
    fn decode(&self, bytes: &[u8], path: &Path) -> RegistryResult<RegistryWorkbook> {
        let unreadable = |message: String| RegistryError::Unreadable {
            path: path.to_path_buf(),
            message,
        };

        let mut xlsx: Xlsx<_> =
            Xlsx::new(Cursor::new(bytes.to_vec())).map_err(|e| unreadable(e.to_string()))?;

        let mut workbook = RegistryWorkbook::default();
        for name in xlsx.sheet_names() {
            let range = xlsx
                .worksheet_range(&name)
                .map_err(|e| unreadable(format!("工作表 {}: {}", name, e)))?;

            // 区域起点可能不在 A1
            let (start_row, start_col) = range.start().unwrap_or((0, 0));
            let mut grid = SheetGrid::new(name.clone());
            for (row, col, data) in range.cells() {
                let value = CellValue::from_calamine(data);
                if matches!(value, CellValue::Empty) {
                    continue;
                }
                let row = start_row + row as u32;
                let col = u16::try_from(start_col as usize + col)
                    .map_err(|_| unreadable(format!("工作表 {} 列数超出范围", name)))?;
                grid.set(row, col, value);
            }
            workbook.sheets.push(grid);
        }

        if workbook.sheets.is_empty() {
            return Err(unreadable("工作簿无工作表".to_string()));
        }
        Ok(workbook)
    }

    fn encode(&self, workbook: &RegistryWorkbook, path: &Path) -> RegistryResult<Vec<u8>> {
        let save_failed = |message: String| RegistryError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };

        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let mut xlsx = Workbook::new();

        for sheet in &workbook.sheets {
            let worksheet = xlsx
                .add_worksheet()
                .set_name(&sheet.name)
                .map_err(|e| save_failed(format!("工作表 {}: {}", sheet.name, e)))?;

            for ((row, col), value) in sheet.cells() {
                let written = match value {
                    CellValue::Empty => continue,
                    CellValue::Text(s) => worksheet.write_string(row, col, s),
                    CellValue::Number(n) => worksheet.write_number(row, col, *n),
                    CellValue::Bool(b) => worksheet.write_boolean(row, col, *b),
                    CellValue::DateTime(n) => {
                        worksheet.write_number_with_format(row, col, *n, &date_format)
                    }
                };
                written.map_err(|e| save_failed(format!("单元格 ({}, {}): {}", row, col, e)))?;
            }
        }

        xlsx.save_to_buffer()
            .map_err(|e| save_failed(e.to_string()))
    }
}
