//! 级联删除计划
//!
//! 枚举删除一条临床记录时必须一并删除的全部身份图实体，
//! 应用未关闭工作项守卫，并产出可哈希的确定性删除摘要。

use crate::digest::compute_digest;
use empi_core::{
    DeletionSummary, EmpiError, LinkRecord, MasterRecord, PatientSnapshot, Person, PidXref,
    Result, WorkItem,
};
use empi_database::{ClinicalQueries, DatabasePools, IndexQueries};
use std::collections::BTreeSet;
use tracing::debug;

/// 判定主索引记录是否被待删除的Person集合独占
///
/// 仅当指向该主记录的每一条链接边都来自待删除集合时才可安全删除；
/// 任何其他Person仍在引用时主记录必须保留。
fn exclusively_owned(links_to_master: &[LinkRecord], deleted_person_ids: &BTreeSet<i64>) -> bool {
    links_to_master
        .iter()
        .all(|l| deleted_person_ids.contains(&l.person_id))
}

/// 收集未关闭工作项的ID（升序）
fn open_work_item_ids(work_items: &[WorkItem]) -> Vec<i64> {
    let mut ids: Vec<i64> = work_items
        .iter()
        .filter(|w| w.is_open())
        .map(|w| w.id)
        .collect();
    ids.sort_unstable();
    ids
}

/// 按ID去重合并工作项列表
fn merge_work_items(base: &mut Vec<WorkItem>, extra: Vec<WorkItem>) {
    let seen: BTreeSet<i64> = base.iter().map(|w| w.id).collect();
    for item in extra {
        if !seen.contains(&item.id) {
            base.push(item);
        }
    }
}

/// 生成一条临床记录的级联删除计划
///
/// 只读操作：存在未关闭工作项时返回`OpenWorkItems`错误并列出其ID，
/// 否则返回含确认摘要的`DeletionSummary`（`committed = false`）。
pub async fn plan_delete(pools: &DatabasePools, pid: &str) -> Result<DeletionSummary> {
    let clinical = ClinicalQueries::new(pools.clinical());
    let index = IndexQueries::new(pools.index());

    let patient = clinical
        .get_patient_snapshot(pid)
        .await?
        .ok_or_else(|| EmpiError::NotFound(format!("临床患者记录 {} 不存在", pid)))?;

    // 按本地ID收集Person与交叉引用
    let persons: Vec<Person> = index.get_persons_by_localid(pid).await?;
    let person_ids: Vec<i64> = persons.iter().map(|p| p.id).collect();
    let person_id_set: BTreeSet<i64> = person_ids.iter().copied().collect();
    let pid_xrefs: Vec<PidXref> = index.get_xrefs_by_person_ids(&person_ids).await?;

    // 收集直接挂接的工作项与链接边
    let mut work_items: Vec<WorkItem> = index.get_work_items_by_person_ids(&person_ids).await?;
    let link_records: Vec<LinkRecord> = index.get_links_by_person_ids(&person_ids).await?;

    // 独占判定：其他Person仍链接的主记录必须保留
    let candidate_master_ids: BTreeSet<i64> =
        link_records.iter().map(|l| l.master_id).collect();
    let mut owned_master_ids: Vec<i64> = Vec::new();
    for master_id in candidate_master_ids {
        let links_to_master = index.get_links_to_master(master_id).await?;
        if exclusively_owned(&links_to_master, &person_id_set) {
            owned_master_ids.push(master_id);
        }
    }

    let master_records: Vec<MasterRecord> =
        index.get_master_records_by_ids(&owned_master_ids).await?;

    // 独占主记录自身挂接的工作项也进入删除集合
    let master_work_items = index.get_work_items_by_master_ids(&owned_master_ids).await?;
    merge_work_items(&mut work_items, master_work_items);

    // 未关闭工作项守卫：阻止删除并列出待处理项
    let open_ids = open_work_item_ids(&work_items);
    if !open_ids.is_empty() {
        return Err(EmpiError::OpenWorkItems {
            work_item_ids: open_ids,
        });
    }

    debug!(
        pid,
        persons = persons.len(),
        masters = master_records.len(),
        links = link_records.len(),
        "deletion plan computed"
    );

    build_summary(
        patient,
        persons,
        master_records,
        pid_xrefs,
        work_items,
        link_records,
    )
}

/// 排序实体列表、计算摘要并组装删除摘要
fn build_summary(
    patient: PatientSnapshot,
    mut persons: Vec<Person>,
    mut master_records: Vec<MasterRecord>,
    mut pid_xrefs: Vec<PidXref>,
    mut work_items: Vec<WorkItem>,
    mut link_records: Vec<LinkRecord>,
) -> Result<DeletionSummary> {
    persons.sort_by_key(|p| p.id);
    master_records.sort_by_key(|m| m.id);
    pid_xrefs.sort_by_key(|x| x.id);
    work_items.sort_by_key(|w| w.id);
    link_records.sort_by_key(|l| l.id);

    let digest = compute_digest(
        &patient,
        &persons,
        &master_records,
        &pid_xrefs,
        &work_items,
        &link_records,
    )?;

    Ok(DeletionSummary {
        patient,
        persons,
        master_records,
        pid_xrefs,
        work_items,
        link_records,
        digest,
        committed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use empi_core::WORK_ITEM_STATUS_OPEN;

    fn link(id: i64, person_id: i64, master_id: i64) -> LinkRecord {
        LinkRecord {
            id,
            person_id,
            master_id,
            link_type: 0,
            last_updated: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    fn work_item(id: i64, status: i32) -> WorkItem {
        WorkItem {
            id,
            person_id: 1,
            master_id: None,
            item_type: 3,
            description: "possible duplicate".to_string(),
            status,
            last_updated: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_master_owned_when_all_links_are_deleted() {
        // 主记录10只被Person 1和2链接，两者都在删除集合内
        let links = [link(1, 1, 10), link(2, 2, 10)];
        let deleting = BTreeSet::from([1, 2]);
        assert!(exclusively_owned(&links, &deleting));
    }

    #[test]
    fn test_shared_master_is_not_owned() {
        // Person 3仍链接主记录10，删除Person 1不得移除主记录
        let links = [link(1, 1, 10), link(2, 3, 10)];
        let deleting = BTreeSet::from([1]);
        assert!(!exclusively_owned(&links, &deleting));
    }

    #[test]
    fn test_master_without_links_is_owned() {
        // 没有任何链接边时视为独占（不存在其他引用者）
        assert!(exclusively_owned(&[], &BTreeSet::from([1])));
    }

    #[test]
    fn test_open_work_item_ids_sorted() {
        let items = [
            work_item(7, WORK_ITEM_STATUS_OPEN),
            work_item(2, 3),
            work_item(3, WORK_ITEM_STATUS_OPEN),
        ];
        assert_eq!(open_work_item_ids(&items), vec![3, 7]);
    }

    #[test]
    fn test_open_work_item_ids_empty_when_all_closed() {
        let items = [work_item(1, 3), work_item(2, 3)];
        assert!(open_work_item_ids(&items).is_empty());
    }

    #[test]
    fn test_merge_work_items_dedups_by_id() {
        let mut base = vec![work_item(1, 3), work_item(2, 3)];
        merge_work_items(&mut base, vec![work_item(2, 3), work_item(5, 3)]);

        let ids: Vec<i64> = base.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![1, 2, 5]);
    }

    #[test]
    fn test_build_summary_sorts_and_digests() {
        let patient = PatientSnapshot {
            pid: "100001".to_string(),
            surname: None,
            given_name: None,
            gender: None,
            birth_time: None,
            death_time: None,
            created_at: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            observation_count: 0,
            lab_order_count: 0,
            document_count: 0,
        };
        let persons = vec![
            Person {
                id: 2,
                localid: "100001".to_string(),
            },
            Person {
                id: 1,
                localid: "100001".to_string(),
            },
        ];

        let summary =
            build_summary(patient, persons, vec![], vec![], vec![], vec![]).unwrap();
        assert!(!summary.committed);
        assert_eq!(summary.persons[0].id, 1);
        assert_eq!(summary.digest.len(), 64); // SHA-256十六进制
    }
}
