//! 设施权限范围过滤
//!
//! 主索引记录自身不携带设施属性，可见性必须经由
//! 链接边 → Person → 交叉引用 间接推导。

use empi_core::{EmpiError, FacilitySet, MasterRecord, Result};
use empi_database::{DatabasePools, IndexQueries};
use std::collections::BTreeSet;

/// 纯匹配内核：任一设施出现在授权集合中即可见
fn facility_match(facilities: &[String], authorized: &FacilitySet) -> bool {
    if authorized.allows_all() {
        return true;
    }
    facilities.iter().any(|f| authorized.contains(f))
}

/// 单记录可见性检查
///
/// 只检查直接挂接的Person及其交叉引用，不展开传递闭包。
/// 这比列表过滤收窄：间接链接的设施不会使单记录检查通过。
pub async fn is_visible(
    pools: &DatabasePools,
    master: &MasterRecord,
    authorized: &FacilitySet,
) -> Result<bool> {
    if authorized.allows_all() {
        return Ok(true);
    }

    let queries = IndexQueries::new(pools.index());
    let facilities = queries.get_directly_attached_facilities(master.id).await?;
    Ok(facility_match(&facilities, authorized))
}

/// 单记录可见性断言，不可见时返回权限错误而非布尔值
pub async fn assert_visible(
    pools: &DatabasePools,
    master: &MasterRecord,
    authorized: &FacilitySet,
) -> Result<()> {
    if is_visible(pools, master, authorized).await? {
        Ok(())
    } else {
        Err(EmpiError::Forbidden(format!(
            "主索引记录 {} 不在授权设施范围内",
            master.id
        )))
    }
}

/// 批量列表过滤，整页记录使用单条join查询
pub async fn filter_visible(
    pools: &DatabasePools,
    records: Vec<MasterRecord>,
    authorized: &FacilitySet,
) -> Result<Vec<MasterRecord>> {
    if authorized.allows_all() || records.is_empty() {
        return Ok(records);
    }
    if authorized.is_empty() {
        return Ok(Vec::new());
    }

    let queries = IndexQueries::new(pools.index());
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
    let visible: BTreeSet<i64> = queries
        .get_master_ids_with_facility(&ids, &authorized.to_vec())
        .await?
        .into_iter()
        .collect();

    Ok(records
        .into_iter()
        .filter(|r| visible.contains(&r.id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facilities(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_wildcard_short_circuits() {
        let authorized = FacilitySet::all();
        assert!(facility_match(&[], &authorized));
        assert!(facility_match(&facilities(&["RFA01"]), &authorized));
    }

    #[test]
    fn test_match_requires_overlap() {
        let authorized = FacilitySet::new(["RFA01", "RFB02"]);
        assert!(facility_match(&facilities(&["RFA01"]), &authorized));
        assert!(facility_match(&facilities(&["RXX99", "RFB02"]), &authorized));
        assert!(!facility_match(&facilities(&["RXX99"]), &authorized));
    }

    #[test]
    fn test_empty_sides_do_not_match() {
        let authorized = FacilitySet::new(["RFA01"]);
        assert!(!facility_match(&[], &authorized));

        let nothing = FacilitySet::new(Vec::<String>::new());
        assert!(!facility_match(&facilities(&["RFA01"]), &nothing));
    }

    #[test]
    fn test_match_is_case_exact() {
        let authorized = FacilitySet::new(["RFA01"]);
        assert!(!facility_match(&facilities(&["rfa01"]), &authorized));
    }
}
