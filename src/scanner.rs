use crate::api::{normalize, SearchClient};
use crate::config::Settings;
use crate::error::Result;
use crate::notifier::Notifier;
use crate::types::{Alert, AlertKind, Listing, SearchCriteria};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// 单条商品的判定结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Duplicate,
    Stale,
    NotAuction,
    NotEndingSoon,
    Excluded(String),
    Notify,
}

/// 一口价判定：去重 → 是否新上架 → 排除关键词。
///
/// 没见过的商品在判定前就记入已见集合，之后无论结果如何都不会再判定。
pub fn classify_fixed_price(
    criteria: &mut SearchCriteria,
    listing: &Listing,
    now: DateTime<Utc>,
) -> Verdict {
    if !criteria.record(listing) {
        return Verdict::Duplicate;
    }

    if !listing.is_recent(criteria, now) {
        return Verdict::Stale;
    }

    if let Some(anti) = listing.matched_anti_keyword(criteria) {
        return Verdict::Excluded(anti.to_string());
    }

    Verdict::Notify
}

/// 拍卖判定：只在即将结束时提醒一次。
///
/// 拍卖只有在提醒时才记入已见集合，还没到时间的会在后续轮询中重新判定。
pub fn classify_auction(
    criteria: &mut SearchCriteria,
    listing: &Listing,
    now: DateTime<Utc>,
) -> Verdict {
    if criteria.has_seen(&listing.id) {
        return Verdict::Duplicate;
    }

    if !listing.listing_type.is_auction() {
        return Verdict::NotAuction;
    }

    if !listing.is_ending_soon(criteria, now) {
        return Verdict::NotEndingSoon;
    }

    if let Some(anti) = listing.matched_anti_keyword(criteria) {
        return Verdict::Excluded(anti.to_string());
    }

    criteria.record(listing);
    Verdict::Notify
}

/// 距离下一轮还需等待的时间，超时则不等待
pub fn sleep_for(period: Duration, elapsed: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

pub struct ListingScanner {
    client: Box<dyn SearchClient>,
    notifier: Box<dyn Notifier>,
    settings: Settings,
    searches: Vec<SearchCriteria>,
}

impl ListingScanner {
    pub fn new(
        client: Box<dyn SearchClient>,
        notifier: Box<dyn Notifier>,
        settings: Settings,
        searches: Vec<SearchCriteria>,
    ) -> Self {
        Self {
            client,
            notifier,
            settings,
            searches,
        }
    }

    pub fn searches(&self) -> &[SearchCriteria] {
        &self.searches
    }

    /// 持续扫描，只有遇到致命错误（认证、配置）才返回
    pub async fn start_scanning(&mut self) -> Result<()> {
        let period = self.settings.poll_interval();
        info!(
            "开始监控 {} 个搜索条件，轮询间隔: {:?}",
            self.searches.len(),
            period
        );

        loop {
            let started = Instant::now();
            info!("开始新一轮扫描...");

            match self.scan_once().await {
                Ok(alerts) => {
                    info!("本轮扫描结束，推送 {} 条提醒", alerts.len());
                }
                Err(e) if e.is_fatal() => {
                    error!("致命错误，停止扫描: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    error!("扫描错误: {}", e);
                }
            }

            let wait = sleep_for(period, started.elapsed());
            debug!("等待 {:?} 后开始下一轮", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// 依次处理所有搜索条件；搜索失败会放弃本轮剩余的条件
    pub async fn scan_once(&mut self) -> Result<Vec<Alert>> {
        let mut alerts = Vec::new();

        for criteria in self.searches.iter_mut() {
            let records = self
                .client
                .search_fixed_price(criteria, &self.settings)
                .await?;
            let found = process_records(
                self.notifier.as_ref(),
                criteria,
                &records,
                AlertKind::NewFixedPrice,
            )
            .await?;
            alerts.extend(found);

            if criteria.watch_auctions {
                let records = self.client.search_auctions(criteria, &self.settings).await?;
                let found = process_records(
                    self.notifier.as_ref(),
                    criteria,
                    &records,
                    AlertKind::AuctionEndingSoon,
                )
                .await?;
                alerts.extend(found);
            }
        }

        Ok(alerts)
    }
}

async fn process_records(
    notifier: &dyn Notifier,
    criteria: &mut SearchCriteria,
    records: &[Value],
    kind: AlertKind,
) -> Result<Vec<Alert>> {
    let mut alerts = Vec::new();

    for record in records {
        let listing = match normalize(record) {
            Ok(listing) => listing,
            Err(e) => {
                warn!("[{}] 跳过记录: {}", criteria.keywords, e);
                continue;
            }
        };

        let now = Utc::now();
        let verdict = match kind {
            AlertKind::NewFixedPrice => classify_fixed_price(criteria, &listing, now),
            AlertKind::AuctionEndingSoon => classify_auction(criteria, &listing, now),
        };

        match verdict {
            Verdict::Notify => {}
            Verdict::Excluded(anti) => {
                debug!("[{}] 排除 {} (命中 {:?})", criteria.keywords, listing.id, anti);
                continue;
            }
            other => {
                debug!("[{}] 忽略 {}: {:?}", criteria.keywords, listing.id, other);
                continue;
            }
        }

        info!(
            "🔔 [{}] {} - {} ({})",
            criteria.keywords, listing.title, listing.price, listing.id
        );

        let alert = Alert {
            listing,
            kind,
            criteria: criteria.keywords.clone(),
            alerted_at: now,
        };

        // 已记为已见，推送失败不会重试
        if let Err(e) = notifier.notify(&alert).await {
            if e.is_fatal() {
                return Err(e);
            }
            error!("推送失败 [{}]: {}", alert.listing.id, e);
        }

        alerts.push(alert);
    }

    Ok(alerts)
}
