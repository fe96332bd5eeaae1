use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

pub const DEFAULT_RECENCY_THRESHOLD_MINUTES: i64 = 5000;
pub const DEFAULT_ENDING_SOON_THRESHOLD_MINUTES: i64 = 15;

/// 一条搜索结果，轮询时由 eBay 返回的记录转换而来
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub listing_type: ListingType,
    pub price: Price,
    pub image_url: Option<String>,
    pub detail_url: String,
}

impl Listing {
    /// 从开始时间到 `now` 经过的整分钟数（向下取整）
    pub fn minutes_since_start(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_seconds().div_euclid(60)
    }

    /// 距离结束还剩的整分钟数，已结束时为负数
    pub fn minutes_until_end(&self, now: DateTime<Utc>) -> i64 {
        (self.end_time - now).num_seconds().div_euclid(60)
    }

    pub fn is_recent(&self, criteria: &SearchCriteria, now: DateTime<Utc>) -> bool {
        self.minutes_since_start(now) < criteria.recency_threshold_minutes
    }

    pub fn is_ending_soon(&self, criteria: &SearchCriteria, now: DateTime<Utc>) -> bool {
        let remaining = self.minutes_until_end(now);
        remaining >= 0 && remaining < criteria.ending_soon_threshold_minutes
    }

    /// 返回标题或描述中命中的第一个排除关键词（区分大小写）
    pub fn matched_anti_keyword<'a>(&self, criteria: &'a SearchCriteria) -> Option<&'a str> {
        criteria
            .anti_keywords
            .iter()
            .find(|anti| self.title.contains(anti.as_str()) || self.description.contains(anti.as_str()))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingType {
    FixedPrice,
    Auction,
    AuctionWithBin,
    StoreInventory,
    Classified,
    Other(String),
}

impl ListingType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "FixedPrice" => ListingType::FixedPrice,
            "Auction" => ListingType::Auction,
            "AuctionWithBIN" => ListingType::AuctionWithBin,
            "StoreInventory" => ListingType::StoreInventory,
            "Classified" => ListingType::Classified,
            other => ListingType::Other(other.to_string()),
        }
    }

    pub fn is_auction(&self) -> bool {
        matches!(self, ListingType::Auction | ListingType::AuctionWithBin)
    }
}

impl fmt::Display for ListingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingType::FixedPrice => write!(f, "FixedPrice"),
            ListingType::Auction => write!(f, "Auction"),
            ListingType::AuctionWithBin => write!(f, "AuctionWithBIN"),
            ListingType::StoreInventory => write!(f, "StoreInventory"),
            ListingType::Classified => write!(f, "Classified"),
            ListingType::Other(raw) => write!(f, "{}", raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Price {
    pub amount: Decimal,
    pub currency: String,
}

impl Price {
    pub fn symbol(&self) -> Option<&'static str> {
        match self.currency.as_str() {
            "GBP" => Some("£"),
            "USD" | "AUD" | "CAD" => Some("$"),
            "EUR" => Some("€"),
            _ => None,
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 货币金额四舍五入到分
        let amount = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        match self.symbol() {
            Some(symbol) => write!(f, "{}{:.2}", symbol, amount),
            None => write!(f, "{:.2} {}", amount, self.currency),
        }
    }
}

/// eBay 商品成色过滤条件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    New,
    NewOther,
    Refurbished,
    Used,
    ForParts,
}

impl Condition {
    /// Finding API 使用的成色编号
    pub fn id(&self) -> u32 {
        match self {
            Condition::New => 1000,
            Condition::NewOther => 1500,
            Condition::Refurbished => 2500,
            Condition::Used => 3000,
            Condition::ForParts => 7000,
        }
    }
}

/// 一条长期运行的搜索条件，以及它见过的商品
#[derive(Debug, Clone, Deserialize)]
pub struct SearchCriteria {
    pub keywords: String,

    pub min_price: Decimal,

    pub max_price: Decimal,

    #[serde(default)]
    pub condition: Option<Condition>,

    #[serde(default)]
    pub anti_keywords: Vec<String>,

    #[serde(default = "default_recency_threshold")]
    pub recency_threshold_minutes: i64,

    #[serde(default = "default_ending_soon_threshold")]
    pub ending_soon_threshold_minutes: i64,

    #[serde(default)]
    pub watch_auctions: bool,

    #[serde(skip)]
    seen: HashMap<String, Listing>,
}

fn default_recency_threshold() -> i64 {
    DEFAULT_RECENCY_THRESHOLD_MINUTES
}

fn default_ending_soon_threshold() -> i64 {
    DEFAULT_ENDING_SOON_THRESHOLD_MINUTES
}

impl SearchCriteria {
    pub fn new(keywords: impl Into<String>, min_price: Decimal, max_price: Decimal) -> Self {
        Self {
            keywords: keywords.into(),
            min_price,
            max_price,
            condition: None,
            anti_keywords: Vec::new(),
            recency_threshold_minutes: DEFAULT_RECENCY_THRESHOLD_MINUTES,
            ending_soon_threshold_minutes: DEFAULT_ENDING_SOON_THRESHOLD_MINUTES,
            watch_auctions: false,
            seen: HashMap::new(),
        }
    }

    pub fn with_anti_keywords<I, S>(mut self, anti_keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.anti_keywords = anti_keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_auctions(mut self, watch_auctions: bool) -> Self {
        self.watch_auctions = watch_auctions;
        self
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains_key(id)
    }

    /// 记录商品；之前未见过时返回 true
    pub fn record(&mut self, listing: &Listing) -> bool {
        self.seen.insert(listing.id.clone(), listing.clone()).is_none()
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn seen_listing(&self, id: &str) -> Option<&Listing> {
        self.seen.get(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    NewFixedPrice,
    AuctionEndingSoon,
}

/// 通过筛选、准备推送的商品
#[derive(Debug, Clone)]
pub struct Alert {
    pub listing: Listing,
    pub kind: AlertKind,
    pub criteria: String,
    pub alerted_at: DateTime<Utc>,
}
