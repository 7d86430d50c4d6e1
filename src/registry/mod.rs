// ==========================================
// 成绩登记系统 - 登记表层
// ==========================================
// 职责: 登记表独占访问、读取、暂存写入、快照、提交与回滚
// 红线: 登记表只允许经由 RegistryManager 读写
// ==========================================

pub mod error;
pub mod lock;
pub mod registry_manager;
pub mod snapshot;
pub mod workbook;

pub use error::{RegistryError, RegistryResult};
pub use lock::{LockPayload, RegistryLock};
pub use registry_manager::{CommitOutcome, RegistryManager, RegistryState};
pub use snapshot::RegistrySnapshot;
pub use workbook::{CellValue, RegistryWorkbook, SheetGrid, WorkbookCodec, XlsxCodec};
