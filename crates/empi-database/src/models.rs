//! 数据库模型

use chrono::{DateTime, NaiveDate, Utc};
use empi_core::models::*;
use sqlx::FromRow;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 身份图库主索引记录表
#[derive(Debug, FromRow)]
pub struct DbMasterRecord {
    pub id: i64,
    pub nationalid: String,
    pub nationalid_type: String,
    pub status: i32,
    pub effective_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl From<DbMasterRecord> for MasterRecord {
    fn from(row: DbMasterRecord) -> Self {
        MasterRecord {
            id: row.id,
            nationalid: row.nationalid,
            nationalid_type: row.nationalid_type,
            status: row.status,
            effective_date: row.effective_date,
            last_updated: row.last_updated,
        }
    }
}

/// 身份图库Person表
#[derive(Debug, FromRow)]
pub struct DbPerson {
    pub id: i64,
    pub localid: String,
}

impl From<DbPerson> for Person {
    fn from(row: DbPerson) -> Self {
        Person {
            id: row.id,
            localid: row.localid,
        }
    }
}

/// 身份图库交叉引用表
#[derive(Debug, FromRow)]
pub struct DbPidXref {
    pub id: i64,
    pub person_id: i64,
    pub sending_facility: String,
    pub sending_extract: String,
    pub localid: String,
}

impl From<DbPidXref> for PidXref {
    fn from(row: DbPidXref) -> Self {
        PidXref {
            id: row.id,
            person_id: row.person_id,
            sending_facility: row.sending_facility,
            sending_extract: row.sending_extract,
            localid: row.localid,
        }
    }
}

/// 身份图库链接边表
#[derive(Debug, FromRow)]
pub struct DbLinkRecord {
    pub id: i64,
    pub person_id: i64,
    pub master_id: i64,
    pub link_type: i32,
    pub last_updated: DateTime<Utc>,
}

impl From<DbLinkRecord> for LinkRecord {
    fn from(row: DbLinkRecord) -> Self {
        LinkRecord {
            id: row.id,
            person_id: row.person_id,
            master_id: row.master_id,
            link_type: row.link_type,
            last_updated: row.last_updated,
        }
    }
}

/// 身份图库工作项表
#[derive(Debug, FromRow)]
pub struct DbWorkItem {
    pub id: i64,
    pub person_id: i64,
    pub master_id: Option<i64>,
    pub item_type: i32,
    pub description: String,
    pub status: i32,
    pub last_updated: DateTime<Utc>,
}

impl From<DbWorkItem> for WorkItem {
    fn from(row: DbWorkItem) -> Self {
        WorkItem {
            id: row.id,
            person_id: row.person_id,
            master_id: row.master_id,
            item_type: row.item_type,
            description: row.description,
            status: row.status,
            last_updated: row.last_updated,
        }
    }
}

/// 临床库患者快照查询结果（含子记录计数列）
#[derive(Debug, FromRow)]
pub struct DbPatientSnapshot {
    pub pid: String,
    pub surname: Option<String>,
    pub given_name: Option<String>,
    pub gender: Option<String>,
    pub birth_time: Option<NaiveDate>,
    pub death_time: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub observation_count: i64,
    pub lab_order_count: i64,
    pub document_count: i64,
}

impl From<DbPatientSnapshot> for PatientSnapshot {
    fn from(row: DbPatientSnapshot) -> Self {
        PatientSnapshot {
            pid: row.pid,
            surname: row.surname,
            given_name: row.given_name,
            gender: row.gender,
            birth_time: row.birth_time,
            death_time: row.death_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
            observation_count: row.observation_count,
            lab_order_count: row.lab_order_count,
            document_count: row.document_count,
        }
    }
}

// 插入模型 - 用于创建新记录

/// 新主索引记录插入模型
#[derive(Debug)]
pub struct NewMasterRecord {
    pub nationalid: String,
    pub nationalid_type: String,
    pub status: i32,
    pub effective_date: DateTime<Utc>,
}

/// 新Person插入模型
#[derive(Debug)]
pub struct NewPerson {
    pub localid: String,
}

/// 新交叉引用插入模型
#[derive(Debug)]
pub struct NewPidXref {
    pub person_id: i64,
    pub sending_facility: String,
    pub sending_extract: String,
    pub localid: String,
}

/// 新链接边插入模型
#[derive(Debug)]
pub struct NewLinkRecord {
    pub person_id: i64,
    pub master_id: i64,
    pub link_type: i32,
}

/// 新工作项插入模型
#[derive(Debug)]
pub struct NewWorkItem {
    pub person_id: i64,
    pub master_id: Option<i64>,
    pub item_type: i32,
    pub description: String,
    pub status: i32,
}

/// 新临床患者记录插入模型
#[derive(Debug)]
pub struct NewPatientRecord {
    pub pid: String,
    pub surname: Option<String>,
    pub given_name: Option<String>,
    pub gender: Option<String>,
    pub birth_time: Option<NaiveDate>,
    pub death_time: Option<NaiveDate>,
}
