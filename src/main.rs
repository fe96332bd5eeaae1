use anyhow::{Context, Result};
use listing_watcher::config::{DEFAULT_LOG_FILE, DEFAULT_WATCHLIST_PATH};
use listing_watcher::{logging, Credentials, DiscordNotifier, EbayClient, ListingScanner, WatchList};
use log::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载环境变量
    dotenv::dotenv().ok();

    // 初始化日志
    let log_file = std::env::var("LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    logging::init(&log_file)?;

    info!("启动 eBay 商品监控...");

    // 缺少凭据或配置时直接退出
    let credentials = Credentials::from_env()?;
    let watchlist_path =
        std::env::var("WATCHLIST_PATH").unwrap_or_else(|_| DEFAULT_WATCHLIST_PATH.to_string());
    let watch_list = WatchList::load(&watchlist_path)
        .with_context(|| format!("无法加载监控列表 {}", watchlist_path))?;

    let client = EbayClient::new(credentials.ebay_app_id.as_str())?;
    let notifier = DiscordNotifier::new(
        &credentials.discord_webhook_id,
        &credentials.discord_webhook_token,
    )?;

    let mut scanner = ListingScanner::new(
        Box::new(client),
        Box::new(notifier),
        watch_list.settings,
        watch_list.searches,
    );

    if let Err(e) = scanner.start_scanning().await {
        error!("监控已停止: {}", e);
        return Err(e.into());
    }

    Ok(())
}
