use anyhow::Result;
use brkjit::{Args, build_engine_run_blocking};
use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::{self, EnvFilter, fmt::format::FmtSpan};

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .with_target(false) // 不显示目标模块
        .with_file(true) // 显示文件名
        .with_line_number(true) // 显示行号
        .with_span_events(FmtSpan::ACTIVE)
        .init();

    // 解析命令行参数
    let args = Args::parse();

    info!(version = env!("CARGO_PKG_VERSION"), "启动 brkjit");
    info!(pid = args.pid, "目标进程");

    let report = build_engine_run_blocking(args)?;
    info!(
        valid = report.valid_count,
        mapped = report.mapped_count,
        stops = report.stops,
        termination = ?report.termination,
        "完成"
    );
    Ok(())
}
