//! EMPI管理服务器主程序

mod settings;

use clap::{Parser, Subcommand};
use settings::load_config;
use empi_core::Result;
use empi_database::{ClinicalQueries, DatabasePools, IndexQueries};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// EMPI服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "empi-server")]
#[command(about = "EMPI (Enterprise Master Patient Index) 患者主索引管理服务")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

/// 管理子命令
#[derive(Subcommand, Debug)]
enum Command {
    /// 初始化两个存储的表结构
    InitDb,
    /// 解析种子ID所在的身份图连通分量
    Resolve {
        /// 种子主索引记录ID（逗号分隔）
        #[arg(long, value_delimiter = ',')]
        master_ids: Vec<i64>,
        /// 种子Person记录ID（逗号分隔）
        #[arg(long, value_delimiter = ',')]
        person_ids: Vec<i64>,
    },
    /// 生成删除预览并输出确认摘要
    PreviewDelete {
        /// 临床记录本地ID
        pid: String,
    },
    /// 按确认摘要执行级联删除
    ConfirmDelete {
        /// 临床记录本地ID
        pid: String,
        /// 预览返回的确认摘要
        digest: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_level))
        .init();

    info!("启动EMPI管理服务...");

    let config = load_config(args.config.as_deref())?;
    let pools = DatabasePools::connect(&config.index_store, &config.clinical_store).await?;

    match args.command {
        Command::InitDb => init_db(&pools).await?,
        Command::Resolve {
            master_ids,
            person_ids,
        } => {
            let component = empi_graph::resolve(&pools, &master_ids, &person_ids).await?;
            println!("{}", serde_json::to_string_pretty(&component)?);
        }
        Command::PreviewDelete { pid } => {
            let summary = empi_deletion::plan_delete(&pools, &pid).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::ConfirmDelete { pid, digest } => {
            let summary = empi_deletion::execute_delete(&pools, &pid, &digest).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

/// 初始化两个存储的表结构
async fn init_db(pools: &DatabasePools) -> Result<()> {
    IndexQueries::new(pools.index()).create_tables().await?;
    ClinicalQueries::new(pools.clinical()).create_tables().await?;
    info!("数据库初始化完成");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_resolve_command() {
        let args = Args::parse_from([
            "empi-server",
            "resolve",
            "--master-ids",
            "1,2",
            "--person-ids",
            "7",
        ]);
        match args.command {
            Command::Resolve {
                master_ids,
                person_ids,
            } => {
                assert_eq!(master_ids, vec![1, 2]);
                assert_eq!(person_ids, vec![7]);
            }
            _ => panic!("expected resolve command"),
        }
    }

    #[test]
    fn test_cli_parses_confirm_delete() {
        let args = Args::parse_from(["empi-server", "confirm-delete", "100001", "abc123"]);
        match args.command {
            Command::ConfirmDelete { pid, digest } => {
                assert_eq!(pid, "100001");
                assert_eq!(digest, "abc123");
            }
            _ => panic!("expected confirm-delete command"),
        }
    }
}
