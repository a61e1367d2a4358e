//! 删除计划内容摘要
//!
//! 摘要作为两阶段删除的确认令牌：预览时计算一次，提交时以当前数据
//! 重新计算并比对，不一致即拒绝提交。

use empi_core::{LinkRecord, MasterRecord, PatientSnapshot, Person, PidXref, Result, WorkItem};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// 摘要载荷，字段顺序是摘要契约的一部分
#[derive(Serialize)]
struct DigestPayload<'a> {
    patient: &'a PatientSnapshot,
    persons: &'a [Person],
    master_records: &'a [MasterRecord],
    pid_xrefs: &'a [PidXref],
    work_items: &'a [WorkItem],
    link_records: &'a [LinkRecord],
}

/// 计算删除计划的确定性内容摘要
///
/// 各实体列表先按ID排序再序列化，摘要与集合的遍历顺序无关；
/// 相同的输入集合必然产生逐字节相同的摘要。
pub fn compute_digest(
    patient: &PatientSnapshot,
    persons: &[Person],
    master_records: &[MasterRecord],
    pid_xrefs: &[PidXref],
    work_items: &[WorkItem],
    link_records: &[LinkRecord],
) -> Result<String> {
    let mut persons = persons.to_vec();
    persons.sort_by_key(|p| p.id);
    let mut master_records = master_records.to_vec();
    master_records.sort_by_key(|m| m.id);
    let mut pid_xrefs = pid_xrefs.to_vec();
    pid_xrefs.sort_by_key(|x| x.id);
    let mut work_items = work_items.to_vec();
    work_items.sort_by_key(|w| w.id);
    let mut link_records = link_records.to_vec();
    link_records.sort_by_key(|l| l.id);

    let payload = DigestPayload {
        patient,
        persons: &persons,
        master_records: &master_records,
        pid_xrefs: &pid_xrefs,
        work_items: &work_items,
        link_records: &link_records,
    };

    let bytes = serde_json::to_vec(&payload)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn patient() -> PatientSnapshot {
        PatientSnapshot {
            pid: "100001".to_string(),
            surname: Some("SMITH".to_string()),
            given_name: Some("JOHN".to_string()),
            gender: Some("1".to_string()),
            birth_time: None,
            death_time: None,
            created_at: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            observation_count: 12,
            lab_order_count: 3,
            document_count: 1,
        }
    }

    fn person(id: i64) -> Person {
        Person {
            id,
            localid: "100001".to_string(),
        }
    }

    fn work_item(id: i64, status: i32) -> WorkItem {
        WorkItem {
            id,
            person_id: 1,
            master_id: None,
            item_type: 3,
            description: "demographic mismatch".to_string(),
            status,
            last_updated: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_digest_is_deterministic() {
        let p = patient();
        let persons = [person(1), person(2)];
        let items = [work_item(5, 3)];

        let first = compute_digest(&p, &persons, &[], &[], &items, &[]).unwrap();
        let second = compute_digest(&p, &persons, &[], &[], &items, &[]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_digest_independent_of_iteration_order() {
        let p = patient();
        let forward = [person(1), person(2), person(3)];
        let shuffled = [person(3), person(1), person(2)];

        let a = compute_digest(&p, &forward, &[], &[], &[], &[]).unwrap();
        let b = compute_digest(&p, &shuffled, &[], &[], &[], &[]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_digest_sensitive_to_entity_changes() {
        let p = patient();
        let persons = [person(1)];
        let base = compute_digest(&p, &persons, &[], &[], &[], &[]).unwrap();

        // 新增实体
        let added = compute_digest(&p, &[person(1), person(2)], &[], &[], &[], &[]).unwrap();
        assert_ne!(base, added);

        // 移除实体
        let removed = compute_digest(&p, &[], &[], &[], &[], &[]).unwrap();
        assert_ne!(base, removed);

        // 修改实体字段
        let modified = compute_digest(
            &p,
            &[Person {
                id: 1,
                localid: "100002".to_string(),
            }],
            &[],
            &[],
            &[],
            &[],
        )
        .unwrap();
        assert_ne!(base, modified);
    }

    #[test]
    fn test_digest_sensitive_to_patient_fields() {
        let persons = [person(1)];
        let base = compute_digest(&patient(), &persons, &[], &[], &[], &[]).unwrap();

        let mut changed = patient();
        changed.observation_count += 1;
        let after = compute_digest(&changed, &persons, &[], &[], &[], &[]).unwrap();
        assert_ne!(base, after);
    }

    #[test]
    fn test_digest_sensitive_to_work_item_status() {
        let p = patient();
        let open = compute_digest(&p, &[], &[], &[], &[work_item(5, 1)], &[]).unwrap();
        let closed = compute_digest(&p, &[], &[], &[], &[work_item(5, 3)], &[]).unwrap();
        assert_ne!(open, closed);
    }
}
