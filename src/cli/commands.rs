use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use pocket::core::{SiteBuilder, SiteWatcher};
use pocket::models::SiteConfig;
use pocket::utils;

use super::scaffold;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 站点根目录
    #[arg(short, long, default_value = ".", global = true)]
    pub path: PathBuf,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 不指定子命令时：生成一次，然后监视文件变化
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 生成静态文件后退出
    Build(BuildArgs),

    /// 生成静态文件并监视变化自动重新生成
    Watch(BuildArgs),

    /// 初始化新的站点
    Init(InitArgs),
}

#[derive(Args, Default)]
pub struct BuildArgs {
    /// 构建前清空输出目录
    #[arg(long)]
    pub clean: bool,
}

#[derive(Args)]
pub struct InitArgs {
    /// 站点目录名称
    #[arg(value_name = "NAME")]
    pub name: String,

    /// 站点标题
    #[arg(short, long)]
    pub title: Option<String>,
}

/// 执行命令
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Init(args)) => init(&cli.path, args),
        Some(Commands::Build(args)) => build(site_builder(&cli.path, &args)?),
        Some(Commands::Watch(args)) => watch(site_builder(&cli.path, &args)?).await,
        None => watch(site_builder(&cli.path, &BuildArgs::default())?).await,
    }
}

fn site_builder(path: &Path, args: &BuildArgs) -> Result<SiteBuilder> {
    // 绝对路径，与文件监视事件中的路径一致
    let root = fs::canonicalize(path)
        .with_context(|| format!("site directory not found: {}", path.display()))?;
    let config = SiteConfig::load(&root)
        .with_context(|| format!("failed to load site at {}", root.display()))?;

    let builder = SiteBuilder::new(config);
    Ok(if args.clean { builder.force_clean() } else { builder })
}

/// 生成一次；任何页面失败时以非零状态退出
fn build(builder: SiteBuilder) -> Result<()> {
    builder.build()?.check()?;
    Ok(())
}

/// 生成一次后进入监视循环，直到 Ctrl+C
async fn watch(mut builder: SiteBuilder) -> Result<()> {
    // 初始构建中的页面错误只记录日志，配置错误直接退出
    builder.build().context("initial build failed")?;

    let config = builder.config();
    let watcher = SiteWatcher::new(config.debounce).with_root(&config.root);
    let file_watcher = watcher.attach(&config.watch_targets())?;

    let handle = watcher.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
    });

    info!("{}", "Listening for file changes . . . (Ctrl+C to stop)".green());

    tokio::task::spawn_blocking(move || {
        // 监视器必须在循环期间保持存活
        let _file_watcher = file_watcher;
        // 每批变化都重新读取 `_config.yml`
        watcher.run(|_| {
            if let Err(e) = builder.rebuild() {
                error!("Rebuild failed: {}", utils::error_chain(&e));
            }
        })
    })
    .await??;

    Ok(())
}

fn init(base: &Path, args: InitArgs) -> Result<()> {
    let site_path = base.join(&args.name);

    // 如果目录不为空，询问用户是否继续
    if site_path.exists() && site_path.read_dir()?.next().is_some() {
        println!("Directory is not empty. Do you want to continue? (y/N)");
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Operation cancelled.");
            return Ok(());
        }
    }

    fs::create_dir_all(&site_path)
        .with_context(|| format!("failed to create {}", site_path.display()))?;

    let site_title = args.title.unwrap_or_else(|| args.name.clone());
    scaffold::initialize_site_structure(&site_path, &site_title)?;

    info!("Initialized new site at: {}", site_path.display());
    Ok(())
}
