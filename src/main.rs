// ==========================================
// 成绩登记系统 - 命令行入口
// ==========================================
// 子命令: assignment（单次作业目录）/ class（班级目录）/ recover（中断恢复）
// 输出: 批次报告写 stdout,日志写 stderr
// 退出码: 0 批次完成;1 批次级错误;2 保存失败已回滚
// ==========================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use grade_registry::config::ConfigManager;
use grade_registry::importer::load_roster_names;
use grade_registry::{logging, BatchOrchestrator, BatchReport, EngineError, RosterSource};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "grade-registry")]
#[command(about = "作业成绩归档到班级登记表")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件（JSON）;缺省时读取用户配置目录
    #[arg(long, global = true, env = "GRADE_REGISTRY_CONFIG")]
    config: Option<PathBuf>,

    /// 覆写配置项,可重复: --set grading_scheme=NUMERIC
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    overrides: Vec<String>,

    /// 以 JSON 输出报告与日志
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 处理一个作业目录中的学生文档
    Assignment {
        /// 作业目录（目录名确定作业编号）
        dir: PathBuf,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// 处理一个班级目录中的成绩汇总表
    Class {
        /// 班级目录
        dir: PathBuf,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// 用上次中断批次遗留的备份恢复登记表
    Recover {
        /// 登记表（.xlsx）
        #[arg(long, short = 'r')]
        registry: PathBuf,

        /// 先强制删除锁文件（确认没有其他批次在运行）
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args)]
struct BatchArgs {
    /// 登记表（.xlsx）
    #[arg(long, short = 'r')]
    registry: PathBuf,

    /// 外部花名册（.txt 每行一个姓名,或含姓名列的表格）
    #[arg(long)]
    roster: Option<PathBuf>,

    /// 试运行: 不保存登记表,不回写文档
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.json {
        logging::init_json();
    } else {
        logging::init();
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<EngineError>() {
            Some(EngineError::CommitFailed { report, .. }) => {
                print_report(report, cli.json);
                eprintln!("错误: {:#}", err);
                ExitCode::from(2)
            }
            _ => {
                eprintln!("错误: {:#}", err);
                ExitCode::FAILURE
            }
        },
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut manager =
        ConfigManager::load_or_default(cli.config.as_deref()).context("配置加载失败")?;
    for item in &cli.overrides {
        let (key, value) = item
            .split_once('=')
            .with_context(|| format!("配置覆写格式应为 KEY=VALUE: {}", item))?;
        manager.set_override(key.trim(), value)?;
    }

    match &cli.command {
        Commands::Assignment { dir, batch } => {
            let orchestrator = build_orchestrator(manager, batch)?;
            let roster = roster_source(&orchestrator, batch.roster.as_deref())?;
            let report = orchestrator.run_assignment_scope(dir, &batch.registry, &roster)?;
            print_report(&report, cli.json);
        }
        Commands::Class { dir, batch } => {
            let orchestrator = build_orchestrator(manager, batch)?;
            let roster = roster_source(&orchestrator, batch.roster.as_deref())?;
            let report = orchestrator.run_class_scope(dir, &batch.registry, &roster)?;
            print_report(&report, cli.json);
        }
        Commands::Recover { registry, force } => {
            let orchestrator = BatchOrchestrator::new(manager.into_config())?;
            if *force && orchestrator.release_registry_lock(registry)? {
                println!("已删除锁文件: {}", registry.display());
            }
            if orchestrator.recover_registry(registry)? {
                println!("已从备份恢复: {}", registry.display());
            } else {
                println!("无遗留备份: {}", registry.display());
            }
        }
    }
    Ok(())
}

fn build_orchestrator(mut manager: ConfigManager, batch: &BatchArgs) -> Result<BatchOrchestrator> {
    if batch.dry_run {
        manager.set_override(grade_registry::config::config_keys::DRY_RUN, "true")?;
    }
    Ok(BatchOrchestrator::new(manager.into_config())?)
}

fn roster_source(orchestrator: &BatchOrchestrator, path: Option<&Path>) -> Result<RosterSource> {
    match path {
        None => Ok(RosterSource::Registry),
        Some(path) => {
            let names = load_roster_names(path, &orchestrator.config().name_column_labels)
                .with_context(|| format!("花名册读取失败: {}", path.display()))?;
            Ok(RosterSource::Names(names))
        }
    }
}

fn print_report(report: &BatchReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("报告序列化失败: {}", e),
        }
    } else {
        print!("{}", report.render());
    }
}
