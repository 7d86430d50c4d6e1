// ==========================================
// 成绩登记系统 - 成绩审计日志仓储
// ==========================================
// 对齐: grade_audit_log 表
// 红线: Repository 不做业务逻辑,只做数据映射;
//       只记录已提交到登记表的写入
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::audit::GradeAuditEntry;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// GradeAuditRepository - 成绩审计日志仓储
// ==========================================
pub struct GradeAuditRepository {
    conn: Arc<Mutex<Connection>>,
}

impl GradeAuditRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 打开（或创建）审计库并建表
    pub fn open(db_path: &Path) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(&db_path.to_string_lossy())
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        let repo = Self::new(Arc::new(Mutex::new(conn)));
        repo.ensure_schema()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn ensure_schema(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS grade_audit_log (
                audit_id TEXT PRIMARY KEY,
                batch_id TEXT NOT NULL,
                registry_path TEXT NOT NULL,
                student_name TEXT NOT NULL,
                column_header TEXT NOT NULL,
                old_value TEXT NOT NULL,
                new_value TEXT NOT NULL,
                source_path TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_grade_audit_batch ON grade_audit_log(batch_id);
            "#,
        )?;
        Ok(())
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 批量插入（单事务）
    ///
    /// # 返回
    /// - Ok(count): 插入条数
    /// - Err: 任一条失败则整体回滚
    pub fn batch_insert(&self, entries: &[GradeAuditEntry]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut count = 0;
        for entry in entries {
            tx.execute(
                r#"
                INSERT INTO grade_audit_log (
                    audit_id, batch_id, registry_path, student_name, column_header,
                    old_value, new_value, source_path, recorded_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    entry.audit_id,
                    entry.batch_id,
                    entry.registry_path,
                    entry.student_name,
                    entry.column_header,
                    entry.old_value,
                    entry.new_value,
                    entry.source_path,
                    entry.recorded_at.format(TS_FORMAT).to_string(),
                ],
            )?;
            count += 1;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(count)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 查询某批次的全部记录
    pub fn find_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<GradeAuditEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT audit_id, batch_id, registry_path, student_name, column_header,
                   old_value, new_value, source_path, recorded_at
            FROM grade_audit_log
            WHERE batch_id = ?
            ORDER BY recorded_at, rowid
            "#,
        )?;

        let entries = stmt
            .query_map(params![batch_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }

    /// 查询某学生在某登记表上的写入历史
    pub fn find_by_student(
        &self,
        registry_path: &str,
        student_name: &str,
    ) -> RepositoryResult<Vec<GradeAuditEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT audit_id, batch_id, registry_path, student_name, column_header,
                   old_value, new_value, source_path, recorded_at
            FROM grade_audit_log
            WHERE registry_path = ? AND student_name = ?
            ORDER BY recorded_at DESC, rowid DESC
            "#,
        )?;

        let entries = stmt
            .query_map(params![registry_path, student_name], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }
}

fn map_row(row: &Row) -> SqliteResult<GradeAuditEntry> {
    let recorded_at_str: String = row.get(8)?;
    let recorded_at = NaiveDateTime::parse_from_str(&recorded_at_str, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(GradeAuditEntry {
        audit_id: row.get(0)?,
        batch_id: row.get(1)?,
        registry_path: row.get(2)?,
        student_name: row.get(3)?,
        column_header: row.get(4)?,
        old_value: row.get(5)?,
        new_value: row.get(6)?,
        source_path: row.get(7)?,
        recorded_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn setup_repo() -> GradeAuditRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        let repo = GradeAuditRepository::new(Arc::new(Mutex::new(conn)));
        repo.ensure_schema().unwrap();
        repo
    }

    fn make_entry(audit_id: &str, batch_id: &str, student: &str) -> GradeAuditEntry {
        GradeAuditEntry {
            audit_id: audit_id.to_string(),
            batch_id: batch_id.to_string(),
            registry_path: "/data/登记表.xlsx".to_string(),
            student_name: student.to_string(),
            column_header: "第1次作业".to_string(),
            old_value: String::new(),
            new_value: "A".to_string(),
            source_path: format!("/data/第1次作业/{}_作业1.docx", student),
            recorded_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_batch_insert_and_find_by_batch() {
        let repo = setup_repo();
        let count = repo
            .batch_insert(&[make_entry("a1", "b1", "张三"), make_entry("a2", "b1", "李四")])
            .unwrap();
        assert_eq!(count, 2);
        repo.batch_insert(&[make_entry("a3", "b2", "张三")]).unwrap();

        let entries = repo.find_by_batch("b1").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].student_name, "张三");
        assert_eq!(entries[1].new_value, "A");

        assert_eq!(repo.find_by_student("/data/登记表.xlsx", "张三").unwrap().len(), 2);
    }

    #[test]
    fn test_batch_insert_is_atomic() {
        let repo = setup_repo();
        let result = repo.batch_insert(&[make_entry("dup", "b1", "张三"), make_entry("dup", "b1", "李四")]);
        assert!(matches!(result, Err(RepositoryError::UniqueConstraintViolation(_))));
        assert!(repo.find_by_batch("b1").unwrap().is_empty());
    }
}
