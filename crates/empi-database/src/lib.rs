//! # EMPI数据库模块
//!
//! 负责身份图库与临床数据库两个PostgreSQL存储的连接池管理和全部SQL操作。

pub mod connection;
pub mod models;
pub mod queries;

// 重新导出主要类型
pub use connection::{DatabasePools, StoreSettings};
pub use models::*;
pub use queries::{ClinicalQueries, IndexQueries};
