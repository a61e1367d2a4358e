//! 核心数据模型定义

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 通配符设施代码，表示授权访问全部发送设施
pub const FACILITY_WILDCARD: &str = "*";

/// 工作项"未关闭"状态码，删除守卫以该值为准
pub const WORK_ITEM_STATUS_OPEN: i32 = 1;

/// 主索引记录（跨源系统归并后的患者身份）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterRecord {
    pub id: i64,
    pub nationalid: String,
    pub nationalid_type: String, // 标识符方案 (NHS, UKRR等)
    pub status: i32,
    pub effective_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// 单个源系统中的患者身份
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub localid: String, // 等于临床记录的主键
}

/// 源系统交叉引用，设施属性的唯一载体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidXref {
    pub id: i64,
    pub person_id: i64,
    pub sending_facility: String,
    pub sending_extract: String,
    pub localid: String, // 源系统自身的患者ID
}

/// 身份图链接边，只连接Person与MasterRecord
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: i64,
    pub person_id: i64,
    pub master_id: i64,
    pub link_type: i32,
    pub last_updated: DateTime<Utc>,
}

/// 待人工处理的身份冲突工作项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: i64,
    pub person_id: i64,
    pub master_id: Option<i64>,
    pub item_type: i32,
    pub description: String,
    pub status: i32,
    pub last_updated: DateTime<Utc>,
}

impl WorkItem {
    /// 工作项是否仍未关闭
    pub fn is_open(&self) -> bool {
        self.status == WORK_ITEM_STATUS_OPEN
    }
}

/// 临床记录的可导出字段快照，子记录只以计数形式参与摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSnapshot {
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

/// 授权设施集合，由外部鉴权组件解码后传入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilitySet {
    codes: BTreeSet<String>,
}

impl FacilitySet {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    /// 构造授权访问全部设施的集合
    pub fn all() -> Self {
        Self::new([FACILITY_WILDCARD])
    }

    /// 是否包含通配符设施
    pub fn allows_all(&self) -> bool {
        self.codes.contains(FACILITY_WILDCARD)
    }

    pub fn contains(&self, facility: &str) -> bool {
        self.codes.contains(facility)
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// 以确定顺序导出设施代码，用于SQL绑定
    pub fn to_vec(&self) -> Vec<String> {
        self.codes.iter().cloned().collect()
    }
}

/// 级联删除计划摘要
///
/// 序列化形状是契约的一部分：确认摘要基于该形状计算，
/// 字段的增删或重排都会改变摘要算法，需要版本化处理。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionSummary {
    pub patient: PatientSnapshot,
    pub persons: Vec<Person>,
    pub master_records: Vec<MasterRecord>,
    pub pid_xrefs: Vec<PidXref>,
    pub work_items: Vec<WorkItem>,
    pub link_records: Vec<LinkRecord>,
    pub digest: String,
    pub committed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facility_set_wildcard() {
        let set = FacilitySet::all();
        assert!(set.allows_all());
        assert!(set.contains(FACILITY_WILDCARD));

        let set = FacilitySet::new(["RFA01", "RFA02"]);
        assert!(!set.allows_all());
        assert!(set.contains("RFA01"));
        assert!(!set.contains("RFA03"));
    }

    #[test]
    fn test_facility_set_to_vec_is_sorted() {
        let set = FacilitySet::new(["ZZZ", "AAA", "MMM"]);
        assert_eq!(set.to_vec(), vec!["AAA", "MMM", "ZZZ"]);
    }

    #[test]
    fn test_work_item_open_status() {
        let item = WorkItem {
            id: 1,
            person_id: 1,
            master_id: None,
            item_type: 3,
            description: "demographic mismatch".to_string(),
            status: WORK_ITEM_STATUS_OPEN,
            last_updated: Utc::now(),
        };
        assert!(item.is_open());

        let closed = WorkItem { status: 3, ..item };
        assert!(!closed.is_open());
    }
}
