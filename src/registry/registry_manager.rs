// ==========================================
// 成绩登记系统 - 登记表管理器
// ==========================================
// 职责: 登记表唯一读写入口
// 状态机: Unopened → Loaded → Validated → {Committed | RolledBack}
// 红线: 首次修改前必须已有快照;保存或往返校验失败必须逐字节恢复
// ==========================================

use crate::config::EngineConfig;
use crate::domain::roster::{GradeColumn, RosterRow};
use crate::domain::types::Grade;
use crate::domain::report::{SkipReason, WriteResult};
use crate::importer::assignment_resolver::AssignmentResolver;
use crate::registry::error::{RegistryError, RegistryResult};
use crate::registry::lock::RegistryLock;
use crate::registry::snapshot::RegistrySnapshot;
use crate::registry::workbook::{CellValue, RegistryWorkbook, WorkbookCodec, XlsxCodec};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

// ==========================================
// RegistryState - 登记表状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Unopened,
    Loaded,
    Validated,
    Committed,
    RolledBack,
}

impl fmt::Display for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryState::Unopened => write!(f, "UNOPENED"),
            RegistryState::Loaded => write!(f, "LOADED"),
            RegistryState::Validated => write!(f, "VALIDATED"),
            RegistryState::Committed => write!(f, "COMMITTED"),
            RegistryState::RolledBack => write!(f, "ROLLED_BACK"),
        }
    }
}

/// 提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Saved,     // 已保存并通过往返校验
    Unchanged, // 无修改,未保存
    DryRun,    // 试运行,未保存
}

/// 登记表版式（校验阶段确定）
#[derive(Debug, Clone)]
struct RegistryLayout {
    sheet: usize,
    header_row: u32,
    name_col: u16,
    last_header_col: u16,
    grade_columns: HashMap<u32, GradeColumn>,
}

// ==========================================
// RegistryManager
// ==========================================
pub struct RegistryManager {
    path: PathBuf,
    name_labels: Vec<String>,
    column_pattern: String,
    sheet_name: Option<String>,
    resolver: AssignmentResolver,
    codec: Arc<dyn WorkbookCodec>,
    dry_run: bool,

    state: RegistryState,
    lock: Option<RegistryLock>,
    original: Vec<u8>,
    workbook: RegistryWorkbook,
    layout: Option<RegistryLayout>,
    roster: Vec<RosterRow>,
    row_index: HashMap<String, RosterRow>,
    snapshot: Option<RegistrySnapshot>,
    staged: HashMap<(u32, u16), String>,
    dirty: bool,
    stale_backup: Option<PathBuf>,
}

impl RegistryManager {
    /// 创建管理器（Unopened）
    pub fn new(path: &Path, config: &EngineConfig, resolver: AssignmentResolver) -> Self {
        Self {
            path: path.to_path_buf(),
            name_labels: config.name_column_labels.clone(),
            column_pattern: config.grade_column_pattern.clone(),
            sheet_name: config.registry_sheet.clone(),
            resolver,
            codec: Arc::new(XlsxCodec),
            dry_run: config.dry_run,
            state: RegistryState::Unopened,
            lock: None,
            original: Vec::new(),
            workbook: RegistryWorkbook::default(),
            layout: None,
            roster: Vec::new(),
            row_index: HashMap::new(),
            snapshot: None,
            staged: HashMap::new(),
            dirty: false,
            stale_backup: None,
        }
    }

    /// 替换工作簿编解码器
    pub fn with_codec(mut self, codec: Arc<dyn WorkbookCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> RegistryState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn stale_backup(&self) -> Option<&Path> {
        self.stale_backup.as_deref()
    }

    pub fn roster(&self) -> &[RosterRow] {
        &self.roster
    }

    /// 持有的哨兵锁文件（打开之后才有）
    pub fn lock_path(&self) -> Option<&Path> {
        self.lock.as_ref().map(RegistryLock::path)
    }

    fn transition(&mut self, expected: RegistryState, next: RegistryState) -> RegistryResult<()> {
        if self.state != expected {
            return Err(RegistryError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    fn require(&self, expected: RegistryState, operation: &str) -> RegistryResult<()> {
        if self.state != expected {
            return Err(RegistryError::InvalidStateTransition {
                from: self.state.to_string(),
                to: operation.to_string(),
            });
        }
        Ok(())
    }

    fn malformed(&self, message: impl Into<String>) -> RegistryError {
        RegistryError::Malformed {
            path: self.path.clone(),
            message: message.into(),
        }
    }

    // ==========================================
    // Unopened → Loaded
    // ==========================================

    /// 打开并解析登记表
    ///
    /// # 返回
    /// - Err(NotFound / UnsupportedFormat / Unreadable): 文件不可用
    /// - Err(Locked): 登记表已被其他写入者占用
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn open(&mut self) -> RegistryResult<()> {
        self.require(RegistryState::Unopened, "LOADED")?;

        let is_xlsx = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
        if !is_xlsx {
            return Err(RegistryError::UnsupportedFormat(self.path.clone()));
        }
        if !self.path.is_file() {
            return Err(RegistryError::NotFound(self.path.clone()));
        }

        let lock = RegistryLock::acquire(&self.path)?;

        // 先解析再处理遗留备份: 登记表读不出时 `.bak` 原样保留,供 recover 使用
        let backup = RegistrySnapshot::backup_path(&self.path);
        let decoded = fs::read(&self.path)
            .map_err(|e| RegistryError::Unreadable {
                path: self.path.clone(),
                message: e.to_string(),
            })
            .and_then(|bytes| Ok((self.codec.decode(&bytes, &self.path)?, bytes)));
        let (workbook, bytes) = match decoded {
            Ok(loaded) => loaded,
            Err(e) => {
                if backup.exists() {
                    warn!(
                        backup = %backup.display(),
                        "登记表无法解析且存在上次批次遗留的备份,请先执行 recover"
                    );
                }
                return Err(e);
            }
        };

        self.stale_backup = if self.dry_run {
            Some(backup).filter(|p| p.exists())
        } else {
            RegistrySnapshot::rotate_stale(&self.path)?
        };
        self.workbook = workbook;
        self.original = bytes;
        self.lock = Some(lock);

        self.transition(RegistryState::Unopened, RegistryState::Loaded)?;
        info!(sheets = self.workbook.sheets.len(), "登记表已打开");
        Ok(())
    }

    // ==========================================
    // Loaded → Validated
    // ==========================================

    /// 识别表头与姓名列,建立花名册索引
    pub fn validate(&mut self) -> RegistryResult<()> {
        self.require(RegistryState::Loaded, "VALIDATED")?;

        let sheet_index = match &self.sheet_name {
            Some(name) => self
                .workbook
                .sheet_index(name)
                .ok_or_else(|| self.malformed(format!("找不到工作表 {}", name)))?,
            None => 0,
        };
        let sheet = self
            .workbook
            .sheets
            .get(sheet_index)
            .ok_or_else(|| self.malformed("工作簿无工作表"))?;

        let header_row = sheet
            .first_non_empty_row()
            .ok_or_else(|| self.malformed(format!("工作表 {} 为空", sheet.name)))?;

        let headers: Vec<(u16, String)> = sheet
            .row_cells(header_row)
            .map(|(col, value)| (col, value.display().trim().to_string()))
            .collect();
        let last_header_col = headers.iter().map(|(col, _)| *col).max().unwrap_or(0);

        let name_col = headers
            .iter()
            .find(|(_, text)| self.name_labels.iter().any(|label| label == text))
            .map(|(col, _)| *col)
            .ok_or_else(|| {
                self.malformed(format!("表头缺少姓名列（期望之一: {:?}）", self.name_labels))
            })?;

        let last_row = sheet.max_row().unwrap_or(header_row);
        let mut roster = Vec::new();
        let mut row_index = HashMap::new();
        for row in (header_row + 1)..=last_row {
            let name = sheet.get(row, name_col).display();
            if name.trim().is_empty() {
                continue;
            }
            let roster_row = RosterRow {
                row_index: row as usize,
                name: name.clone(),
            };
            row_index.entry(name).or_insert_with(|| roster_row.clone());
            roster.push(roster_row);
        }

        debug!(
            sheet = %sheet.name,
            header_row = header_row,
            name_col = name_col,
            students = roster.len(),
            "登记表版式识别完成"
        );

        self.layout = Some(RegistryLayout {
            sheet: sheet_index,
            header_row,
            name_col,
            last_header_col,
            grade_columns: HashMap::new(),
        });
        self.roster = roster;
        self.row_index = row_index;
        self.transition(RegistryState::Loaded, RegistryState::Validated)
    }

    fn layout(&self) -> RegistryResult<&RegistryLayout> {
        self.layout
            .as_ref()
            .ok_or_else(|| self.malformed("登记表尚未完成校验"))
    }

    // ==========================================
    // Validated 状态下的操作
    // ==========================================

    /// 按姓名查找学生行（批次内索引,不重复扫描）
    pub fn find_row(&self, name: &str) -> Option<RosterRow> {
        self.row_index
            .get(name)
            .or_else(|| self.row_index.get(name.trim()))
            .cloned()
    }

    /// 当前单元格值
    pub fn cell_value(&self, row: &RosterRow, column: &GradeColumn) -> CellValue {
        let Ok(layout) = self.layout() else {
            return CellValue::Empty;
        };
        match (u32::try_from(row.row_index), u16::try_from(column.col_index)) {
            (Ok(r), Ok(c)) => self.workbook.sheets[layout.sheet].get(r, c).clone(),
            _ => CellValue::Empty,
        }
    }

    /// 本批次此前在同一单元格写入的值
    pub fn staged_value(&self, row: &RosterRow, column: &GradeColumn) -> Option<&str> {
        let key = (u32::try_from(row.row_index).ok()?, u16::try_from(column.col_index).ok()?);
        self.staged.get(&key).map(String::as_str)
    }

    /// 首次修改前保存快照
    fn ensure_snapshot(&mut self) -> RegistryResult<()> {
        if self.snapshot.is_some() || self.dry_run {
            return Ok(());
        }
        let bytes = std::mem::take(&mut self.original);
        self.snapshot = Some(RegistrySnapshot::take(&self.path, bytes)?);
        Ok(())
    }

    /// 定位作业列,不存在时在表头末尾追加
    ///
    /// 查找顺序: 完全等于命名约定的表头 > 能解析出同一作业编号的表头
    pub fn resolve_column(&mut self, assignment_number: u32) -> RegistryResult<GradeColumn> {
        self.require(RegistryState::Validated, "resolve_column")?;
        if let Some(column) = self.layout()?.grade_columns.get(&assignment_number) {
            return Ok(column.clone());
        }

        let layout = self.layout()?.clone();
        let sheet = &self.workbook.sheets[layout.sheet];
        let expected = self.column_pattern.replace("{n}", &assignment_number.to_string());
        let headers: Vec<(u16, String)> = sheet
            .row_cells(layout.header_row)
            .filter(|(col, _)| *col != layout.name_col)
            .map(|(col, value)| (col, value.display().trim().to_string()))
            .collect();

        let existing = headers
            .iter()
            .find(|(_, text)| *text == expected)
            .or_else(|| {
                headers.iter().find(|(_, text)| {
                    self.resolver
                        .resolve_explicit(text)
                        .is_some_and(|id| id.number == assignment_number)
                })
            })
            .cloned();

        let column = match existing {
            Some((col, header)) => GradeColumn {
                col_index: col as usize,
                assignment_number,
                header,
            },
            None => {
                let col = layout
                    .last_header_col
                    .checked_add(1)
                    .ok_or(RegistryError::CellOutOfRange {
                        row: layout.header_row,
                        col: layout.last_header_col,
                    })?;
                self.ensure_snapshot()?;
                self.workbook.sheets[layout.sheet].set(
                    layout.header_row,
                    col,
                    CellValue::Text(expected.clone()),
                );
                self.dirty = true;
                if let Some(layout) = self.layout.as_mut() {
                    layout.last_header_col = col;
                }
                info!(header = %expected, col = col, "登记表追加作业列");
                GradeColumn {
                    col_index: col as usize,
                    assignment_number,
                    header: expected,
                }
            }
        };

        if let Some(layout) = self.layout.as_mut() {
            layout.grade_columns.insert(assignment_number, column.clone());
        }
        Ok(column)
    }

    /// 暂存一次写入（只改内存,提交时统一保存）
    ///
    /// # 返回
    /// - Skipped(unchanged): 单元格已是该成绩
    /// - Success: 记录旧值与新值
    pub fn stage_write(
        &mut self,
        row: &RosterRow,
        column: &GradeColumn,
        grade: &Grade,
    ) -> RegistryResult<WriteResult> {
        self.require(RegistryState::Validated, "stage_write")?;
        let sheet = self.layout()?.sheet;
        let r = u32::try_from(row.row_index).map_err(|_| RegistryError::CellOutOfRange {
            row: u32::MAX,
            col: 0,
        })?;
        let c = u16::try_from(column.col_index).map_err(|_| RegistryError::CellOutOfRange {
            row: r,
            col: u16::MAX,
        })?;

        let current = self.workbook.sheets[sheet].get(r, c).clone();
        let new_value = match grade {
            Grade::Numeric(value) => CellValue::Number(*value),
            other => CellValue::Text(other.to_string()),
        };
        let old_display = current.display().trim().to_string();
        let new_display = new_value.display();

        if current.same_content(&new_value) || old_display == new_display {
            return Ok(WriteResult::Skipped {
                reason: SkipReason::Unchanged { value: old_display },
            });
        }

        self.ensure_snapshot()?;
        self.workbook.sheets[sheet].set(r, c, new_value);
        self.staged.insert((r, c), new_display.clone());
        self.dirty = true;

        debug!(
            student = %row.name,
            column = %column.header,
            old = %old_display,
            new = %new_display,
            "暂存成绩写入"
        );
        Ok(WriteResult::Success {
            row: row.clone(),
            column: column.clone(),
            old_value: old_display,
            new_value: new_display,
        })
    }

    // ==========================================
    // Validated → Committed / RolledBack
    // ==========================================

    /// 一次性保存全部暂存写入并做往返校验
    ///
    /// 失败时自动逐字节恢复并进入 RolledBack,返回原始错误
    #[instrument(skip(self), fields(path = %self.path.display(), dirty = self.dirty))]
    pub fn commit(&mut self) -> RegistryResult<CommitOutcome> {
        self.require(RegistryState::Validated, "COMMITTED")?;

        if self.dry_run {
            self.state = RegistryState::Committed;
            info!("试运行,登记表未保存");
            return Ok(CommitOutcome::DryRun);
        }
        if !self.dirty {
            self.state = RegistryState::Committed;
            debug!("无修改,跳过保存");
            return Ok(CommitOutcome::Unchanged);
        }

        match self.save_and_verify() {
            Ok(()) => {
                if let Some(snapshot) = self.snapshot.take() {
                    if let Err(e) = snapshot.discard() {
                        warn!(error = %e, "快照文件删除失败");
                    }
                }
                self.state = RegistryState::Committed;
                info!(writes = self.staged.len(), "登记表已保存");
                Ok(CommitOutcome::Saved)
            }
            Err(cause) => {
                error!(error = %cause, "登记表保存失败,开始回滚");
                self.rollback().map_err(|restore| RegistryError::RestoreFailed {
                    path: self.path.clone(),
                    message: format!("{}（保存失败原因: {}）", restore, cause),
                })?;
                Err(cause)
            }
        }
    }

    fn save_and_verify(&mut self) -> RegistryResult<()> {
        let bytes = self.codec.encode(&self.workbook, &self.path)?;
        fs::write(&self.path, &bytes).map_err(|e| RegistryError::SaveFailed {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let written = fs::read(&self.path).map_err(|e| RegistryError::VerificationFailed {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        let reloaded = self
            .codec
            .decode(&written, &self.path)
            .map_err(|e| RegistryError::VerificationFailed {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        if reloaded.sheets.len() != self.workbook.sheets.len() {
            return Err(RegistryError::VerificationFailed {
                path: self.path.clone(),
                message: format!(
                    "工作表数量不一致: 期望 {}, 实际 {}",
                    self.workbook.sheets.len(),
                    reloaded.sheets.len()
                ),
            });
        }
        for (expected, actual) in self.workbook.sheets.iter().zip(&reloaded.sheets) {
            if let Some((row, col)) = expected.first_difference(actual) {
                return Err(RegistryError::VerificationFailed {
                    path: self.path.clone(),
                    message: format!("工作表 {} 单元格 ({}, {}) 不一致", expected.name, row, col),
                });
            }
        }
        Ok(())
    }

    /// 放弃本批次修改,登记表恢复为快照字节
    pub fn rollback(&mut self) -> RegistryResult<()> {
        self.require(RegistryState::Validated, "ROLLED_BACK")?;
        if let Some(snapshot) = self.snapshot.take() {
            snapshot.restore()?;
        }
        self.state = RegistryState::RolledBack;
        warn!(path = %self.path.display(), "登记表已回滚");
        Ok(())
    }
}
