//! # EMPI级联删除模块
//!
//! 提供删除计划（预览）、确认摘要计算和两库事务删除执行。

pub mod digest;
pub mod executor;
pub mod planner;

pub use digest::compute_digest;
pub use executor::execute_delete;
pub use planner::plan_delete;
