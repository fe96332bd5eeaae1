use crate::error::{Result, WatcherError};
use env_logger::{Builder, Env, Target};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// 初始化日志，以追加方式写入纯文本文件；级别由 RUST_LOG 控制，默认 info
pub fn init<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| WatcherError::ConfigError(format!("无法打开日志文件 {}: {}", path.display(), e)))?;

    Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{}  {:<5} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()
        .map_err(|e| WatcherError::ConfigError(format!("日志初始化失败: {}", e)))
}
