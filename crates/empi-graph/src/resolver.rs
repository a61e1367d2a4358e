//! 身份图连通分量解析
//!
//! 通过定点扩张计算与种子ID处于同一连通分量的全部主索引记录与Person记录。

use empi_core::{EmpiError, LinkRecord, Result};
use empi_database::{DatabasePools, IndexQueries};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// 防御性迭代上限，收敛轮数受分量直径约束而非规模约束
pub const MAX_RESOLVE_ITERATIONS: usize = 64;

/// 连通分量解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedComponent {
    pub master_ids: BTreeSet<i64>,
    pub person_ids: BTreeSet<i64>,
}

/// 将一批链接边的两端并入已发现集合，返回是否有增长
fn absorb(
    links: &[LinkRecord],
    masters: &mut BTreeSet<i64>,
    persons: &mut BTreeSet<i64>,
) -> bool {
    let mut grew = false;
    for link in links {
        grew |= masters.insert(link.master_id);
        grew |= persons.insert(link.person_id);
    }
    grew
}

/// 计算种子ID集合所在的完整连通分量
///
/// 每轮以完整的当前前沿重新查询链接边（而非仅查询新增ID），
/// 任何一轮没有发现新ID即到达定点。各轮依赖前一轮的发现集合，不可并行。
pub async fn resolve(
    pools: &DatabasePools,
    seed_master_ids: &[i64],
    seed_person_ids: &[i64],
) -> Result<ResolvedComponent> {
    let mut masters: BTreeSet<i64> = seed_master_ids.iter().copied().collect();
    let mut persons: BTreeSet<i64> = seed_person_ids.iter().copied().collect();

    if masters.is_empty() && persons.is_empty() {
        return Ok(ResolvedComponent::default());
    }

    let queries = IndexQueries::new(pools.index());

    for iteration in 0..MAX_RESOLVE_ITERATIONS {
        let master_frontier: Vec<i64> = masters.iter().copied().collect();
        let person_frontier: Vec<i64> = persons.iter().copied().collect();

        let links = queries
            .get_links_touching(&master_frontier, &person_frontier)
            .await?;
        let grew = absorb(&links, &mut masters, &mut persons);

        debug!(
            iteration,
            masters = masters.len(),
            persons = persons.len(),
            "link closure iteration"
        );

        if !grew {
            return Ok(ResolvedComponent {
                master_ids: masters,
                person_ids: persons,
            });
        }
    }

    Err(EmpiError::Internal(format!(
        "link closure did not converge within {} iterations",
        MAX_RESOLVE_ITERATIONS
    )))
}
