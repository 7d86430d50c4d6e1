// ==========================================
// 成绩登记系统 - 登记表快照
// ==========================================
// 职责: 批次首次写入前保存登记表原始字节,失败时逐字节恢复
// 落盘: `<登记表>.bak` 与内存副本一致,进程中断后可由 recover 恢复
// 生命周期: take → (discard | restore)
// ==========================================

use crate::registry::error::{RegistryError, RegistryResult};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug)]
pub struct RegistrySnapshot {
    registry: PathBuf,
    backup: PathBuf,
    bytes: Vec<u8>,
    taken_at: DateTime<Utc>,
}

impl RegistrySnapshot {
    pub fn backup_path(registry: &Path) -> PathBuf {
        let mut name = registry.as_os_str().to_os_string();
        name.push(".bak");
        PathBuf::from(name)
    }

    /// 保存快照
    ///
    /// # 参数
    /// - registry: 登记表路径
    /// - bytes: 打开登记表时读取的原始字节
    pub fn take(registry: &Path, bytes: Vec<u8>) -> RegistryResult<Self> {
        let backup = Self::backup_path(registry);
        fs::write(&backup, &bytes).map_err(|e| RegistryError::SaveFailed {
            path: backup.clone(),
            message: format!("快照写入失败: {}", e),
        })?;

        info!(backup = %backup.display(), size = bytes.len(), "登记表快照已保存");
        Ok(Self {
            registry: registry.to_path_buf(),
            backup,
            bytes,
            taken_at: Utc::now(),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// 将快照字节写回登记表并删除备份
    pub fn restore(self) -> RegistryResult<()> {
        let restore_failed = |message: String| RegistryError::RestoreFailed {
            path: self.registry.clone(),
            message,
        };

        fs::write(&self.registry, &self.bytes).map_err(|e| restore_failed(e.to_string()))?;
        let written = fs::read(&self.registry).map_err(|e| restore_failed(e.to_string()))?;
        if written != self.bytes {
            // 保留 .bak,留待 recover
            return Err(restore_failed("恢复后字节与快照不一致".to_string()));
        }

        if let Err(e) = fs::remove_file(&self.backup) {
            warn!(backup = %self.backup.display(), error = %e, "快照文件删除失败");
        }
        info!(registry = %self.registry.display(), "登记表已从快照恢复");
        Ok(())
    }

    /// 提交成功,丢弃快照
    pub fn discard(self) -> RegistryResult<()> {
        fs::remove_file(&self.backup)?;
        Ok(())
    }

    /// 上次批次遗留的备份改名为 `<登记表>.bak.<时间戳>`
    ///
    /// # 返回
    /// - Ok(Some(path)): 改名后的遗留备份
    /// - Ok(None): 无遗留备份
    pub fn rotate_stale(registry: &Path) -> RegistryResult<Option<PathBuf>> {
        let backup = Self::backup_path(registry);
        if !backup.exists() {
            return Ok(None);
        }

        let mut rotated = backup.as_os_str().to_os_string();
        rotated.push(format!(".{}", Utc::now().format("%Y%m%d%H%M%S%3f")));
        let rotated = PathBuf::from(rotated);
        fs::rename(&backup, &rotated)?;

        warn!(
            registry = %registry.display(),
            rotated = %rotated.display(),
            "发现上次批次遗留的登记表备份,已改名保留"
        );
        Ok(Some(rotated))
    }

    /// 用遗留的 `.bak` 恢复登记表
    ///
    /// # 返回
    /// - Ok(true): 已恢复并删除 `.bak`
    /// - Ok(false): 无遗留备份
    pub fn recover(registry: &Path) -> RegistryResult<bool> {
        let backup = Self::backup_path(registry);
        if !backup.exists() {
            return Ok(false);
        }

        let bytes = fs::read(&backup)?;
        Self {
            registry: registry.to_path_buf(),
            backup,
            bytes,
            taken_at: Utc::now(),
        }
        .restore()?;
        Ok(true)
    }
}
