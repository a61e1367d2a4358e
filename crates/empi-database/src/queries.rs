//! 数据库查询操作

use crate::models::*;
use empi_core::{
    EmpiError, LinkRecord, MasterRecord, PatientSnapshot, Person, PidXref, Result, WorkItem,
};
use sqlx::{PgPool, Postgres, Row, Transaction};

/// 身份图库查询操作接口
pub struct IndexQueries<'a> {
    pool: &'a PgPool,
}

impl<'a> IndexQueries<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// 创建身份图库表
    pub async fn create_tables(&self) -> Result<()> {
        // 创建主索引记录表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS master_records (
                id BIGSERIAL PRIMARY KEY,
                nationalid VARCHAR(64) NOT NULL,
                nationalid_type VARCHAR(16) NOT NULL,
                status INTEGER NOT NULL DEFAULT 0,
                effective_date TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                last_updated TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(self.pool).await.map_err(|e| EmpiError::Database(e.to_string()))?;

        // 创建Person表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS people (
                id BIGSERIAL PRIMARY KEY,
                localid VARCHAR(64) NOT NULL
            )
        "#).execute(self.pool).await.map_err(|e| EmpiError::Database(e.to_string()))?;

        // 创建交叉引用表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS pid_xrefs (
                id BIGSERIAL PRIMARY KEY,
                person_id BIGINT NOT NULL REFERENCES people(id),
                sending_facility VARCHAR(16) NOT NULL,
                sending_extract VARCHAR(16) NOT NULL,
                localid VARCHAR(64) NOT NULL
            )
        "#).execute(self.pool).await.map_err(|e| EmpiError::Database(e.to_string()))?;

        // 创建链接边表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS link_records (
                id BIGSERIAL PRIMARY KEY,
                person_id BIGINT NOT NULL REFERENCES people(id),
                master_id BIGINT NOT NULL REFERENCES master_records(id),
                link_type INTEGER NOT NULL DEFAULT 0,
                last_updated TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(self.pool).await.map_err(|e| EmpiError::Database(e.to_string()))?;

        // 创建工作项表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS work_items (
                id BIGSERIAL PRIMARY KEY,
                person_id BIGINT NOT NULL REFERENCES people(id),
                master_id BIGINT REFERENCES master_records(id),
                item_type INTEGER NOT NULL DEFAULT 0,
                description TEXT NOT NULL DEFAULT '',
                status INTEGER NOT NULL DEFAULT 1,
                last_updated TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(self.pool).await.map_err(|e| EmpiError::Database(e.to_string()))?;

        // 创建索引以优化查询性能
        self.create_indexes().await?;

        tracing::info!("Index store tables created successfully");
        Ok(())
    }

    /// 创建身份图库索引
    async fn create_indexes(&self) -> Result<()> {
        let indexes = vec![
            "CREATE INDEX IF NOT EXISTS idx_people_localid ON people(localid)",
            "CREATE INDEX IF NOT EXISTS idx_pid_xrefs_person_id ON pid_xrefs(person_id)",
            "CREATE INDEX IF NOT EXISTS idx_pid_xrefs_sending_facility ON pid_xrefs(sending_facility)",
            "CREATE INDEX IF NOT EXISTS idx_link_records_person_id ON link_records(person_id)",
            "CREATE INDEX IF NOT EXISTS idx_link_records_master_id ON link_records(master_id)",
            "CREATE INDEX IF NOT EXISTS idx_work_items_person_id ON work_items(person_id)",
            "CREATE INDEX IF NOT EXISTS idx_work_items_master_id ON work_items(master_id)",
            "CREATE INDEX IF NOT EXISTS idx_work_items_status ON work_items(status)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(self.pool)
                .await
                .map_err(|e| EmpiError::Database(e.to_string()))?;
        }

        Ok(())
    }

    // ========== 插入操作 ==========

    /// 创建新主索引记录
    pub async fn create_master_record(&self, record: &NewMasterRecord) -> Result<i64> {
        sqlx::query(r#"
            INSERT INTO master_records (nationalid, nationalid_type, status, effective_date)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        "#)
        .bind(&record.nationalid)
        .bind(&record.nationalid_type)
        .bind(record.status)
        .bind(record.effective_date)
        .fetch_one(self.pool)
        .await
        .map(|row| row.get("id"))
        .map_err(|e| EmpiError::Database(e.to_string()))
    }

    /// 创建新Person
    pub async fn create_person(&self, person: &NewPerson) -> Result<i64> {
        sqlx::query("INSERT INTO people (localid) VALUES ($1) RETURNING id")
            .bind(&person.localid)
            .fetch_one(self.pool)
            .await
            .map(|row| row.get("id"))
            .map_err(|e| EmpiError::Database(e.to_string()))
    }

    /// 创建新交叉引用
    pub async fn create_pid_xref(&self, xref: &NewPidXref) -> Result<i64> {
        sqlx::query(r#"
            INSERT INTO pid_xrefs (person_id, sending_facility, sending_extract, localid)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        "#)
        .bind(xref.person_id)
        .bind(&xref.sending_facility)
        .bind(&xref.sending_extract)
        .bind(&xref.localid)
        .fetch_one(self.pool)
        .await
        .map(|row| row.get("id"))
        .map_err(|e| EmpiError::Database(e.to_string()))
    }

    /// 创建新链接边
    pub async fn create_link_record(&self, link: &NewLinkRecord) -> Result<i64> {
        sqlx::query(r#"
            INSERT INTO link_records (person_id, master_id, link_type)
            VALUES ($1, $2, $3)
            RETURNING id
        "#)
        .bind(link.person_id)
        .bind(link.master_id)
        .bind(link.link_type)
        .fetch_one(self.pool)
        .await
        .map(|row| row.get("id"))
        .map_err(|e| EmpiError::Database(e.to_string()))
    }

    /// 创建新工作项
    pub async fn create_work_item(&self, item: &NewWorkItem) -> Result<i64> {
        sqlx::query(r#"
            INSERT INTO work_items (person_id, master_id, item_type, description, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        "#)
        .bind(item.person_id)
        .bind(item.master_id)
        .bind(item.item_type)
        .bind(&item.description)
        .bind(item.status)
        .fetch_one(self.pool)
        .await
        .map(|row| row.get("id"))
        .map_err(|e| EmpiError::Database(e.to_string()))
    }

    // ========== 主索引记录查询 ==========

    /// 根据ID查找主索引记录
    pub async fn get_master_record(&self, id: i64) -> Result<Option<MasterRecord>> {
        let result = sqlx::query_as::<_, DbMasterRecord>(
            "SELECT * FROM master_records WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;

        Ok(result.map(MasterRecord::from))
    }

    /// 根据ID集合批量查找主索引记录
    pub async fn get_master_records_by_ids(&self, ids: &[i64]) -> Result<Vec<MasterRecord>> {
        let results = sqlx::query_as::<_, DbMasterRecord>(
            "SELECT * FROM master_records WHERE id = ANY($1) ORDER BY id"
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;

        Ok(results.into_iter().map(MasterRecord::from).collect())
    }

    /// 分页列出主索引记录
    pub async fn list_master_records(&self, limit: i64, offset: i64) -> Result<Vec<MasterRecord>> {
        let results = sqlx::query_as::<_, DbMasterRecord>(
            "SELECT * FROM master_records ORDER BY id LIMIT $1 OFFSET $2"
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;

        Ok(results.into_iter().map(MasterRecord::from).collect())
    }

    // ========== 连通分量与级联删除查询 ==========

    /// 获取触及当前前沿集合的全部链接边
    ///
    /// 每轮迭代必须覆盖完整前沿而非仅新增ID，以保证重复或交叠边不会漏检定点。
    pub async fn get_links_touching(
        &self,
        master_ids: &[i64],
        person_ids: &[i64],
    ) -> Result<Vec<LinkRecord>> {
        let results = sqlx::query_as::<_, DbLinkRecord>(
            "SELECT * FROM link_records WHERE master_id = ANY($1) OR person_id = ANY($2)"
        )
        .bind(master_ids)
        .bind(person_ids)
        .fetch_all(self.pool)
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;

        Ok(results.into_iter().map(LinkRecord::from).collect())
    }

    /// 根据本地ID查找Person记录
    pub async fn get_persons_by_localid(&self, localid: &str) -> Result<Vec<Person>> {
        let results = sqlx::query_as::<_, DbPerson>(
            "SELECT * FROM people WHERE localid = $1 ORDER BY id"
        )
        .bind(localid)
        .fetch_all(self.pool)
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;

        Ok(results.into_iter().map(Person::from).collect())
    }

    /// 获取一组Person的全部交叉引用
    pub async fn get_xrefs_by_person_ids(&self, person_ids: &[i64]) -> Result<Vec<PidXref>> {
        let results = sqlx::query_as::<_, DbPidXref>(
            "SELECT * FROM pid_xrefs WHERE person_id = ANY($1) ORDER BY id"
        )
        .bind(person_ids)
        .fetch_all(self.pool)
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;

        Ok(results.into_iter().map(PidXref::from).collect())
    }

    /// 获取一组Person的全部链接边
    pub async fn get_links_by_person_ids(&self, person_ids: &[i64]) -> Result<Vec<LinkRecord>> {
        let results = sqlx::query_as::<_, DbLinkRecord>(
            "SELECT * FROM link_records WHERE person_id = ANY($1) ORDER BY id"
        )
        .bind(person_ids)
        .fetch_all(self.pool)
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;

        Ok(results.into_iter().map(LinkRecord::from).collect())
    }

    /// 获取指向某主索引记录的全部链接边
    pub async fn get_links_to_master(&self, master_id: i64) -> Result<Vec<LinkRecord>> {
        let results = sqlx::query_as::<_, DbLinkRecord>(
            "SELECT * FROM link_records WHERE master_id = $1 ORDER BY id"
        )
        .bind(master_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;

        Ok(results.into_iter().map(LinkRecord::from).collect())
    }

    /// 获取一组Person挂接的全部工作项
    pub async fn get_work_items_by_person_ids(&self, person_ids: &[i64]) -> Result<Vec<WorkItem>> {
        let results = sqlx::query_as::<_, DbWorkItem>(
            "SELECT * FROM work_items WHERE person_id = ANY($1) ORDER BY id"
        )
        .bind(person_ids)
        .fetch_all(self.pool)
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;

        Ok(results.into_iter().map(WorkItem::from).collect())
    }

    /// 获取一组主索引记录挂接的全部工作项
    pub async fn get_work_items_by_master_ids(&self, master_ids: &[i64]) -> Result<Vec<WorkItem>> {
        let results = sqlx::query_as::<_, DbWorkItem>(
            "SELECT * FROM work_items WHERE master_id = ANY($1) ORDER BY id"
        )
        .bind(master_ids)
        .fetch_all(self.pool)
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;

        Ok(results.into_iter().map(WorkItem::from).collect())
    }

    // ========== 设施权限查询 ==========

    /// 获取直接挂接到某主索引记录的Person所携带的发送设施集合
    pub async fn get_directly_attached_facilities(&self, master_id: i64) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(r#"
            SELECT DISTINCT x.sending_facility
            FROM link_records l
            JOIN pid_xrefs x ON x.person_id = l.person_id
            WHERE l.master_id = $1
        "#)
        .bind(master_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))
    }

    /// 批量过滤：返回与授权设施存在交叉引用的主索引记录ID
    ///
    /// 列表过滤使用单条join查询，而不是逐行做连通分量解析。
    pub async fn get_master_ids_with_facility(
        &self,
        master_ids: &[i64],
        facilities: &[String],
    ) -> Result<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(r#"
            SELECT DISTINCT l.master_id
            FROM link_records l
            JOIN pid_xrefs x ON x.person_id = l.person_id
            WHERE l.master_id = ANY($1) AND x.sending_facility = ANY($2)
        "#)
        .bind(master_ids)
        .bind(facilities)
        .fetch_all(self.pool)
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))
    }

    // ========== 删除操作（在调用方事务内执行） ==========

    /// 删除指定工作项
    pub async fn delete_work_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ids: &[i64],
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM work_items WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut **tx)
            .await
            .map_err(|e| EmpiError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// 删除指定链接边
    pub async fn delete_link_records(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ids: &[i64],
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM link_records WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut **tx)
            .await
            .map_err(|e| EmpiError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// 删除指定交叉引用
    pub async fn delete_pid_xrefs(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ids: &[i64],
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM pid_xrefs WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut **tx)
            .await
            .map_err(|e| EmpiError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// 删除指定Person记录
    pub async fn delete_people(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ids: &[i64],
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM people WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut **tx)
            .await
            .map_err(|e| EmpiError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// 删除指定主索引记录
    pub async fn delete_master_records(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ids: &[i64],
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM master_records WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut **tx)
            .await
            .map_err(|e| EmpiError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

/// 临床数据库查询操作接口
pub struct ClinicalQueries<'a> {
    pool: &'a PgPool,
}

impl<'a> ClinicalQueries<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// 创建临床数据库表
    pub async fn create_tables(&self) -> Result<()> {
        // 创建患者记录表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS patient_records (
                pid VARCHAR(64) PRIMARY KEY,
                surname VARCHAR(255),
                given_name VARCHAR(255),
                gender VARCHAR(16),
                birth_time DATE,
                death_time DATE,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(self.pool).await.map_err(|e| EmpiError::Database(e.to_string()))?;

        // 创建观察结果表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS observations (
                id BIGSERIAL PRIMARY KEY,
                pid VARCHAR(64) NOT NULL REFERENCES patient_records(pid),
                code VARCHAR(64) NOT NULL,
                value VARCHAR(255),
                observed_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(self.pool).await.map_err(|e| EmpiError::Database(e.to_string()))?;

        // 创建检验医嘱表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS lab_orders (
                id BIGSERIAL PRIMARY KEY,
                pid VARCHAR(64) NOT NULL REFERENCES patient_records(pid),
                placer_id VARCHAR(64) NOT NULL,
                ordered_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(self.pool).await.map_err(|e| EmpiError::Database(e.to_string()))?;

        // 创建文档表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS documents (
                id BIGSERIAL PRIMARY KEY,
                pid VARCHAR(64) NOT NULL REFERENCES patient_records(pid),
                title VARCHAR(255) NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(self.pool).await.map_err(|e| EmpiError::Database(e.to_string()))?;

        let indexes = vec![
            "CREATE INDEX IF NOT EXISTS idx_observations_pid ON observations(pid)",
            "CREATE INDEX IF NOT EXISTS idx_lab_orders_pid ON lab_orders(pid)",
            "CREATE INDEX IF NOT EXISTS idx_documents_pid ON documents(pid)",
        ];
        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(self.pool)
                .await
                .map_err(|e| EmpiError::Database(e.to_string()))?;
        }

        tracing::info!("Clinical store tables created successfully");
        Ok(())
    }

    /// 创建新患者记录
    pub async fn create_patient_record(&self, record: &NewPatientRecord) -> Result<()> {
        sqlx::query(r#"
            INSERT INTO patient_records (pid, surname, given_name, gender, birth_time, death_time)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#)
        .bind(&record.pid)
        .bind(&record.surname)
        .bind(&record.given_name)
        .bind(&record.gender)
        .bind(record.birth_time)
        .bind(record.death_time)
        .execute(self.pool)
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;
        Ok(())
    }

    /// 创建新观察结果
    pub async fn create_observation(&self, pid: &str, code: &str, value: Option<&str>) -> Result<i64> {
        sqlx::query("INSERT INTO observations (pid, code, value) VALUES ($1, $2, $3) RETURNING id")
            .bind(pid)
            .bind(code)
            .bind(value)
            .fetch_one(self.pool)
            .await
            .map(|row| row.get("id"))
            .map_err(|e| EmpiError::Database(e.to_string()))
    }

    /// 创建新检验医嘱
    pub async fn create_lab_order(&self, pid: &str, placer_id: &str) -> Result<i64> {
        sqlx::query("INSERT INTO lab_orders (pid, placer_id) VALUES ($1, $2) RETURNING id")
            .bind(pid)
            .bind(placer_id)
            .fetch_one(self.pool)
            .await
            .map(|row| row.get("id"))
            .map_err(|e| EmpiError::Database(e.to_string()))
    }

    /// 创建新文档
    pub async fn create_document(&self, pid: &str, title: &str) -> Result<i64> {
        sqlx::query("INSERT INTO documents (pid, title) VALUES ($1, $2) RETURNING id")
            .bind(pid)
            .bind(title)
            .fetch_one(self.pool)
            .await
            .map(|row| row.get("id"))
            .map_err(|e| EmpiError::Database(e.to_string()))
    }

    /// 获取患者的可导出字段快照（含子记录计数）
    pub async fn get_patient_snapshot(&self, pid: &str) -> Result<Option<PatientSnapshot>> {
        let result = sqlx::query_as::<_, DbPatientSnapshot>(r#"
            SELECT p.*,
                (SELECT COUNT(*) FROM observations o WHERE o.pid = p.pid) AS observation_count,
                (SELECT COUNT(*) FROM lab_orders l WHERE l.pid = p.pid) AS lab_order_count,
                (SELECT COUNT(*) FROM documents d WHERE d.pid = p.pid) AS document_count
            FROM patient_records p
            WHERE p.pid = $1
        "#)
        .bind(pid)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;

        Ok(result.map(PatientSnapshot::from))
    }

    /// 在事务内删除患者及其全部子记录
    pub async fn delete_patient_data(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        pid: &str,
    ) -> Result<u64> {
        // 子记录先删，患者主行最后删
        for table in ["observations", "lab_orders", "documents"] {
            sqlx::query(&format!("DELETE FROM {} WHERE pid = $1", table))
                .bind(pid)
                .execute(&mut **tx)
                .await
                .map_err(|e| EmpiError::Database(e.to_string()))?;
        }

        let result = sqlx::query("DELETE FROM patient_records WHERE pid = $1")
            .bind(pid)
            .execute(&mut **tx)
            .await
            .map_err(|e| EmpiError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
