// ==========================================
// 成绩登记系统 - 登记表独占锁
// ==========================================
// 机制: 同目录哨兵文件 `<登记表>.lock`（create_new 原子创建）
//       + Office 占用文件 `~$<文件名>` 检测
// 红线: 同一登记表同一时刻至多一个写入者（跨进程）
// ==========================================

use crate::registry::error::{RegistryError, RegistryResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// 哨兵内容无法解析时,超过此时长才视为遗留
const UNREADABLE_SENTINEL_GRACE: Duration = Duration::from_secs(60);

/// 哨兵文件内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockPayload {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

impl LockPayload {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }
}

pub struct RegistryLock {
    path: PathBuf,
}

impl RegistryLock {
    /// 哨兵文件路径
    pub fn sentinel_path(registry: &Path) -> PathBuf {
        let mut name = registry.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Office 打开文件时在同目录创建的占用文件
    ///
    /// Excel 的命名为 `~$` + 文件名,较长文件名时会去掉前两个字符
    pub fn office_owner_file(registry: &Path) -> Option<PathBuf> {
        let dir = registry.parent()?;
        let name = registry.file_name()?.to_str()?;

        let mut candidates = vec![dir.join(format!("~${}", name))];
        if name.chars().count() > 2 {
            let trimmed: String = name.chars().skip(2).collect();
            candidates.push(dir.join(format!("~${}", trimmed)));
        }
        candidates.into_iter().find(|p| p.exists())
    }

    /// 获取独占锁
    ///
    /// 持有进程已退出的遗留哨兵会被清除后重试一次
    ///
    /// # 返回
    /// - Ok(RegistryLock): 释放于 Drop
    /// - Err(Locked): 登记表已被 Office 打开,或另一批次持有哨兵
    pub fn acquire(registry: &Path) -> RegistryResult<Self> {
        if let Some(owner) = Self::office_owner_file(registry) {
            return Err(RegistryError::Locked {
                path: registry.to_path_buf(),
                holder: format!("已被其他程序打开 ({})", owner.display()),
            });
        }

        let path = Self::sentinel_path(registry);
        if let Some(lock) = Self::try_create(&path)? {
            return Ok(lock);
        }

        let holder = fs::read_to_string(&path).unwrap_or_default();
        if Self::is_stale(&path, &holder) {
            warn!(path = %path.display(), holder = %holder.trim(), "清除已退出进程遗留的锁文件");
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            if let Some(lock) = Self::try_create(&path)? {
                return Ok(lock);
            }
        }

        Err(RegistryError::Locked {
            path: registry.to_path_buf(),
            holder: format!("另一批次正在写入 ({}) {}", path.display(), holder.trim()),
        })
    }

    /// 强制删除哨兵（人工确认持有者已不存在时使用）
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): 无哨兵
    pub fn force_release(registry: &Path) -> RegistryResult<bool> {
        let path = Self::sentinel_path(registry);
        match fs::remove_file(&path) {
            Ok(()) => {
                warn!(path = %path.display(), "锁文件已被强制删除");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 原子创建哨兵;已存在时返回 None
    fn try_create(path: &Path) -> RegistryResult<Option<Self>> {
        match fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let payload = serde_json::to_string(&LockPayload::current())
                    .map_err(|e| RegistryError::Io(e.to_string()))?;
                if let Err(e) = writeln!(file, "{}", payload) {
                    warn!(path = %path.display(), error = %e, "锁文件写入失败");
                }
                debug!(path = %path.display(), "登记表锁已获取");
                Ok(Some(Self {
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn is_stale(path: &Path, holder: &str) -> bool {
        match serde_json::from_str::<LockPayload>(holder.trim()) {
            Ok(payload) => !process_alive(payload.pid),
            // 持有者可能刚创建哨兵尚未写入内容
            Err(_) => fs::metadata(path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.elapsed().ok())
                .is_some_and(|age| age > UNREADABLE_SENTINEL_GRACE),
        }
    }
}

/// 进程是否仍在运行;无法判断时按存活处理
fn process_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    let proc_root = Path::new("/proc");
    if cfg!(target_os = "linux") && proc_root.is_dir() {
        return proc_root.join(pid.to_string()).exists();
    }
    true
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "锁文件删除失败");
        } else {
            debug!(path = %self.path.display(), "登记表锁已释放");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_is_refused_until_drop() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("登记表.xlsx");

        let lock = RegistryLock::acquire(&registry).unwrap();
        assert!(lock.path().exists());
        assert!(matches!(
            RegistryLock::acquire(&registry),
            Err(RegistryError::Locked { .. })
        ));

        let sentinel = lock.path().to_path_buf();
        drop(lock);
        assert!(!sentinel.exists());
        assert!(RegistryLock::acquire(&registry).is_ok());
    }

    #[test]
    fn test_office_owner_file_blocks() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("grades.xlsx");
        std::fs::write(dir.path().join("~$grades.xlsx"), b"owner").unwrap();

        assert!(matches!(
            RegistryLock::acquire(&registry),
            Err(RegistryError::Locked { .. })
        ));
        assert!(!RegistryLock::sentinel_path(&registry).exists());
    }

    #[test]
    fn test_sentinel_records_holder_pid() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("登记表.xlsx");

        let lock = RegistryLock::acquire(&registry).unwrap();
        let text = std::fs::read_to_string(lock.path()).unwrap();
        let payload: LockPayload = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(payload.pid, std::process::id());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_sentinel_of_exited_process_is_cleared() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("登记表.xlsx");
        let sentinel = RegistryLock::sentinel_path(&registry);
        std::fs::write(
            &sentinel,
            r#"{"pid":4294967295,"acquired_at":"2026-01-01T08:00:00Z"}"#,
        )
        .unwrap();

        let lock = RegistryLock::acquire(&registry).unwrap();
        let text = std::fs::read_to_string(lock.path()).unwrap();
        assert!(text.contains(&format!("\"pid\":{}", std::process::id())));
    }

    #[test]
    fn test_fresh_unreadable_sentinel_still_blocks() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("登记表.xlsx");
        std::fs::write(RegistryLock::sentinel_path(&registry), b"").unwrap();

        assert!(matches!(
            RegistryLock::acquire(&registry),
            Err(RegistryError::Locked { .. })
        ));
        assert!(RegistryLock::force_release(&registry).unwrap());
        assert!(!RegistryLock::force_release(&registry).unwrap());
        assert!(RegistryLock::acquire(&registry).is_ok());
    }
}
