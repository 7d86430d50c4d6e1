// ==========================================
// 成绩登记系统 - 配置层
// ==========================================
// 职责: 引擎配置管理,支持文件加载与键值覆写
// 存储: JSON 配置文件
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigError, ConfigManager, EngineConfig};
