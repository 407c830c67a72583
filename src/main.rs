// ==========================================
// 出库扫码匹配系统 - 命令行入口
// ==========================================
// 扫码枪以键盘方式输入,每个条码以回车结束
// run: 逐行读取 stdin,每行输出一条结果
// ==========================================

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shipment_scan_matcher::api::{ApiError, ScanApi, ScanDisposition};
use shipment_scan_matcher::app::{get_default_db_path, AppState};
use shipment_scan_matcher::engine::{CompletionNotifier, NoOpNotifier, ScanOutcome};
use shipment_scan_matcher::importer::default_export_path;
use shipment_scan_matcher::logging;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "shipment-scan-matcher")]
#[command(about = "出库扫码匹配: 商品条码 → 发货单", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite 数据库路径(默认位于用户数据目录)
    #[arg(long, global = true)]
    db: Option<String>,

    /// 输出 debug 日志
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    /// 日志以 JSON 行输出
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 开始扫码(从 stdin 逐行读取条码)
    Run {
        /// 数据集文件 (.csv/.xlsx/.xls)
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// 从数据库恢复上次进度
        #[arg(long, default_value_t = false)]
        resume: bool,

        /// 结束时导出 CSV; 省略路径时为 {数据集名}_matched.csv
        #[arg(long, num_args = 0..=1)]
        export: Option<Option<PathBuf>>,

        /// 不打印面单,完成即确认
        #[arg(long, default_value_t = false)]
        no_print: bool,
    },

    /// 重新发送完成通知
    Retry {
        /// 发货单号
        tracking_no: String,
    },

    /// 按条码汇总剩余数量
    Summary {
        /// 以 JSON 输出
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// 最近的扫码日志
    Logs {
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// 只显示该发货单的日志(忽略 --limit)
        #[arg(long)]
        tracking_no: Option<String>,
    },

    /// 配置管理
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// 设置配置值
    Set { key: String, value: String },
    /// 读取配置值
    Get { key: String },
    /// 列出全部配置
    List,
    /// 恢复默认值
    Reset { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(if cli.verbose { "debug" } else { "info" }, cli.log_json);

    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    let state = AppState::new(db_path).context("无法初始化应用状态")?;

    match cli.cmd {
        Commands::Run {
            dataset,
            resume,
            export,
            no_print,
        } => {
            let settings = state.settings()?;
            let notifier: Arc<dyn CompletionNotifier> = if no_print {
                Arc::new(NoOpNotifier)
            } else {
                AppState::build_notifier(&settings)
            };

            let api = match (&dataset, resume) {
                (_, true) if state.has_saved_session()? => state.resume_session(notifier)?,
                (Some(path), _) => state
                    .start_session(path, notifier)
                    .with_context(|| format!("无法加载数据集: {}", path.display()))?,
                (None, _) => bail!("需要 --dataset <文件> 或可恢复的进度 (--resume)"),
            };

            run_scan_loop(&api).await?;

            if !api.unsaved_shipments().await.is_empty() {
                match api.flush_unsaved().await {
                    Ok(rows) => tracing::info!("退出前补写完成: rows={}", rows),
                    Err(e) => tracing::error!(
                        "退出前补写失败,以下发货单进度未保存: {:?}, error={}",
                        api.unsaved_shipments().await,
                        e
                    ),
                }
            }

            let stats = api.stats().await;
            println!(
                "shipments={} used={} completed={} filling={} pending={}",
                stats.shipments, stats.used, stats.completed, stats.filling, stats.pending
            );
            let waiting = api.pending_completions().await;
            if !waiting.is_empty() {
                tracing::warn!("以下发货单已扫满但通知未确认: {:?}", waiting);
            }

            if let Some(target) = export {
                let output = match (target, &dataset) {
                    (Some(path), _) => path,
                    (None, Some(input)) => default_export_path(input),
                    (None, None) => bail!("--export 未指定路径且没有数据集文件"),
                };
                let rows = api.export_csv(&output).await?;
                println!("exported={} rows={}", output.display(), rows);
            }
        }

        Commands::Retry { tracking_no } => {
            let settings = state.settings()?;
            let api = state.resume_session(AppState::build_notifier(&settings))?;
            let progress = api.retry_completion(&tracking_no).await?;
            println!("{}\t{}", progress.tracking_no, progress.state);
        }

        Commands::Summary { json } => {
            let api = state.resume_session(Arc::new(NoOpNotifier))?;
            let rows = api.pending_summary().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                println!("barcode\tproduct_name\toption_name\trequired\tscanned\tremaining");
                for r in &rows {
                    println!(
                        "{}\t{}\t{}\t{}\t{}\t{}",
                        r.barcode,
                        r.product_name,
                        r.option_name,
                        r.required_qty,
                        r.scanned_qty,
                        r.remaining
                    );
                }
            }
        }

        Commands::Logs { limit, tracking_no } => {
            let api = state.resume_session(Arc::new(NoOpNotifier))?;
            let entries = match tracking_no {
                Some(tracking_no) => api.logs_for_shipment(&tracking_no).await?,
                None => api.recent_logs(limit).await?,
            };
            for entry in entries {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    entry.scanned_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.result,
                    entry.barcode,
                    entry.tracking_no.as_deref().unwrap_or("-"),
                    entry.message
                );
            }
        }

        Commands::Config { cmd } => match cmd {
            ConfigCmd::Set { key, value } => {
                state.config_api.update_config(&key, &value)?;
                println!("{}={}", key.trim(), value.trim());
            }
            ConfigCmd::Get { key } => {
                let item = state.config_api.get_config(&key)?;
                println!("{}={}", item.key, item.value.as_deref().unwrap_or("(default)"));
            }
            ConfigCmd::List => {
                for item in state.config_api.list_configs()? {
                    println!("{}={}", item.key, item.value.as_deref().unwrap_or("(default)"));
                }
                let effective = state.config_api.effective_settings()?;
                println!("# effective: {}", serde_json::to_string(&effective)?);
            }
            ConfigCmd::Reset { key } => {
                let removed = state.config_api.reset_config(&key)?;
                println!("{} reset={}", key, removed);
            }
        },
    }

    Ok(())
}

/// 逐行处理扫码,直到 EOF 或 Ctrl-C
///
/// 行内命令: `:retry <tracking_no>`, `:pending`, `:flush`, `:quit`
async fn run_scan_loop(api: &ScanApi) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("收到中断信号,停止扫码");
                None
            }
        };
        let Some(line) = line else { break };
        let input = line.trim();

        if let Some(command) = input.strip_prefix(':') {
            let mut parts = command.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("quit"), _) => break,
                (Some("pending"), _) => {
                    println!("PENDING\t{:?}", api.pending_completions().await);
                }
                (Some("flush"), _) => match api.flush_unsaved().await {
                    Ok(rows) => println!("FLUSHED\t{}", rows),
                    Err(e) => println!("UNSAVED\t{:?}\t{}", api.unsaved_shipments().await, e),
                },
                (Some("retry"), Some(tracking_no)) => match api.retry_completion(tracking_no).await {
                    Ok(progress) => println!("RETRIED\t{}\t{}", progress.tracking_no, progress.state),
                    Err(e) => println!("REJECTED\t{}\t{}", tracking_no, e),
                },
                _ => println!("UNKNOWN_COMMAND\t{}", input),
            }
            continue;
        }

        match api.process_scan(input).await {
            Ok(ScanDisposition::Ignored { barcode, reason }) => {
                println!("IGNORED\t{}\t{}", barcode, reason);
            }
            Ok(disposition) => {
                let Some(report) = disposition.report() else {
                    continue;
                };
                let outcome = match &report.outcome {
                    ScanOutcome::Accepted => "ACCEPTED".to_string(),
                    ScanOutcome::Finalized => "FINALIZED".to_string(),
                    ScanOutcome::CompletionPending { error } => format!("COMPLETION_PENDING: {}", error),
                };
                println!(
                    "OK\t{}\t{}\t{}/{}\t{}\t{}",
                    report.tracking_no,
                    report.barcode,
                    report.line.scanned_qty(),
                    report.line.required_qty(),
                    report.progress.state,
                    outcome
                );
                if let ScanDisposition::Unsaved { persist_error, .. } = &disposition {
                    println!("UNSAVED\t{}\t{}", report.tracking_no, persist_error);
                }
            }
            Err(ApiError::Scan(e)) => println!("REJECTED\t{}\t{}", input, e),
            Err(e) => {
                tracing::error!("扫码处理失败: barcode={}, error={}", input, e);
                println!("ERROR\t{}\t{}", input, e);
            }
        }
    }

    Ok(())
}
