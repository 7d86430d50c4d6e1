// ==========================================
// 集成测试辅助模块
// ==========================================

#![allow(dead_code)]

pub mod docx_builder;
pub mod registry_builder;
