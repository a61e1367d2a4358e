//! 确认删除执行
//!
//! 以确认摘要为令牌的乐观并发控制：提交前以当前数据重算计划并比对摘要，
//! 预览后发生的任何图变更都会导致摘要不一致而拒绝提交，不使用跨库锁。

use crate::planner::plan_delete;
use empi_core::{DeletionSummary, EmpiError, Result};
use empi_database::{ClinicalQueries, DatabasePools, IndexQueries};
use tracing::info;

/// 按确认摘要执行两库事务删除
///
/// 摘要不一致时不做任何变更直接返回`ConfirmationMismatch`。
/// 匹配时身份图库与临床库各自开启事务，先提交身份图库、后提交临床库：
/// 两次提交之间崩溃只会留下没有身份图条目的孤儿临床记录，
/// 而不会留下污染后续图解析的孤儿身份片段。
pub async fn execute_delete(
    pools: &DatabasePools,
    pid: &str,
    confirmation_digest: &str,
) -> Result<DeletionSummary> {
    // 绝不信任调用方持有的旧摘要，重新计算删除计划
    let mut summary = plan_delete(pools, pid).await?;
    if summary.digest != confirmation_digest {
        return Err(EmpiError::ConfirmationMismatch);
    }

    let index = IndexQueries::new(pools.index());
    let clinical = ClinicalQueries::new(pools.clinical());

    let mut index_tx = pools
        .index()
        .begin()
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;
    let mut clinical_tx = pools
        .clinical()
        .begin()
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;

    let work_item_ids: Vec<i64> = summary.work_items.iter().map(|w| w.id).collect();
    let link_ids: Vec<i64> = summary.link_records.iter().map(|l| l.id).collect();
    let xref_ids: Vec<i64> = summary.pid_xrefs.iter().map(|x| x.id).collect();
    let person_ids: Vec<i64> = summary.persons.iter().map(|p| p.id).collect();
    let master_ids: Vec<i64> = summary.master_records.iter().map(|m| m.id).collect();

    // 身份图库删除顺序遵守外键依赖：工作项、链接边、交叉引用先行
    index.delete_work_items(&mut index_tx, &work_item_ids).await?;
    index.delete_link_records(&mut index_tx, &link_ids).await?;
    index.delete_pid_xrefs(&mut index_tx, &xref_ids).await?;
    index.delete_people(&mut index_tx, &person_ids).await?;
    index.delete_master_records(&mut index_tx, &master_ids).await?;

    clinical.delete_patient_data(&mut clinical_tx, pid).await?;

    index_tx
        .commit()
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;
    clinical_tx
        .commit()
        .await
        .map_err(|e| EmpiError::Database(e.to_string()))?;

    info!(pid, digest = %summary.digest, "confirmed delete committed");

    summary.committed = true;
    Ok(summary)
}
