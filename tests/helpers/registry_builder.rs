// ==========================================
// 登记表测试构建器
// ==========================================

use grade_registry::registry::{
    CellValue, RegistryError, RegistryResult, RegistryWorkbook, SheetGrid, WorkbookCodec,
    XlsxCodec,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 单工作表登记表: 首行表头,其后每行一名学生
pub struct RegistryBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl RegistryBuilder {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// 花名册: 只填姓名列（第 1 列）
    pub fn students(mut self, names: &[&str]) -> Self {
        for name in names {
            self.rows.push(vec![CellValue::Text(name.to_string())]);
        }
        self
    }

    pub fn row(mut self, cells: &[&str]) -> Self {
        self.rows.push(
            cells
                .iter()
                .map(|c| {
                    if c.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(c.to_string())
                    }
                })
                .collect(),
        );
        self
    }

    pub fn workbook(&self) -> RegistryWorkbook {
        let mut grid = SheetGrid::new("学生名单");
        for (col, header) in self.headers.iter().enumerate() {
            grid.set(0, col as u16, CellValue::Text(header.clone()));
        }
        for (r, row) in self.rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                grid.set(r as u32 + 1, col as u16, value.clone());
            }
        }
        RegistryWorkbook { sheets: vec![grid] }
    }

    pub fn write(&self, path: &Path) {
        let bytes = XlsxCodec.encode(&self.workbook(), path).unwrap();
        std::fs::write(path, bytes).unwrap();
    }
}

/// 读回登记表
pub fn read_registry(path: &Path) -> RegistryWorkbook {
    let bytes = std::fs::read(path).unwrap();
    XlsxCodec.decode(&bytes, path).unwrap()
}

/// 按 (姓名, 表头) 取单元格展示值;找不到行或列时为 None
pub fn cell_text(path: &Path, name: &str, header: &str) -> Option<String> {
    let workbook = read_registry(path);
    let sheet = &workbook.sheets[0];
    let header_row = sheet.first_non_empty_row()?;
    let col = sheet
        .row_cells(header_row)
        .find(|(_, v)| v.display() == header)
        .map(|(c, _)| c)?;
    let name_col = sheet
        .row_cells(header_row)
        .find(|(_, v)| v.display() == "姓名")
        .map(|(c, _)| c)?;
    let last = sheet.max_row()?;
    ((header_row + 1)..=last)
        .find(|r| sheet.get(*r, name_col).display() == name)
        .map(|r| sheet.get(r, col).display())
}

/// 表头文本（按列顺序）
pub fn headers(path: &Path) -> Vec<String> {
    let workbook = read_registry(path);
    let sheet = &workbook.sheets[0];
    sheet.row_cells(0).map(|(_, v)| v.display()).collect()
}

// ==========================================
// CorruptingCodec - 保存时产出损坏字节
// ==========================================
// 读取正常,写出的字节无法再解析,用于验证回滚
pub struct CorruptingCodec {
    pub encode_calls: AtomicUsize,
}

impl CorruptingCodec {
    pub fn new() -> Self {
        Self {
            encode_calls: AtomicUsize::new(0),
        }
    }
}

impl WorkbookCodec for CorruptingCodec {
    fn decode(&self, bytes: &[u8], path: &Path) -> RegistryResult<RegistryWorkbook> {
        XlsxCodec.decode(bytes, path)
    }

    fn encode(&self, workbook: &RegistryWorkbook, path: &Path) -> RegistryResult<Vec<u8>> {
        self.encode_calls.fetch_add(1, Ordering::SeqCst);
        let mut bytes = XlsxCodec.encode(workbook, path)?;
        bytes.truncate(bytes.len() / 2);
        Ok(bytes)
    }
}

/// 保存阶段直接报错的编解码器
pub struct RejectingCodec;

impl WorkbookCodec for RejectingCodec {
    fn decode(&self, bytes: &[u8], path: &Path) -> RegistryResult<RegistryWorkbook> {
        XlsxCodec.decode(bytes, path)
    }

    fn encode(&self, _workbook: &RegistryWorkbook, path: &Path) -> RegistryResult<Vec<u8>> {
        Err(RegistryError::SaveFailed {
            path: path.to_path_buf(),
            message: "磁盘已满".to_string(),
        })
    }
}
