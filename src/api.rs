use crate::config::Settings;
use crate::error::{Result, WatcherError};
use crate::types::{Listing, ListingType, Price, SearchCriteria};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

const FINDING_API_BASE: &str = "https://svcs.ebay.com/services/search/FindingService/v1";
const FINDING_API_VERSION: &str = "1.13.0";
const OPERATION: &str = "findItemsAdvanced";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";
const AUTH_ERROR_ID: &str = "11002";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// 一口价，按上架时间从新到旧
    FixedPrice,
    /// 拍卖，按结束时间从近到远
    Auction,
}

impl SearchMode {
    fn sort_order(&self) -> &'static str {
        match self {
            SearchMode::FixedPrice => "StartTimeNewest",
            SearchMode::Auction => "EndTimeSoonest",
        }
    }
}

/// 商品搜索接口，主循环只依赖这个 trait
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search_fixed_price(
        &self,
        criteria: &SearchCriteria,
        settings: &Settings,
    ) -> Result<Vec<Value>>;

    async fn search_auctions(
        &self,
        criteria: &SearchCriteria,
        settings: &Settings,
    ) -> Result<Vec<Value>>;
}

pub struct EbayClient {
    client: Client,
    app_id: String,
    base_url: String,
}

impl EbayClient {
    pub fn new(app_id: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            app_id: app_id.into(),
            base_url: FINDING_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn find_items(
        &self,
        criteria: &SearchCriteria,
        settings: &Settings,
        mode: SearchMode,
    ) -> Result<Vec<Value>> {
        let params = finding_params(&self.app_id, criteria, settings, mode);

        debug!("搜索 [{}] ({:?})", criteria.keywords, mode);

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(WatcherError::Auth(format!("HTTP {}: {}", status, text)));
        }

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(e) if status.is_success() => return Err(WatcherError::JsonError(e)),
            Err(_) => {
                warn!("API 请求失败 [{}]: {}", status, text);
                return Err(WatcherError::InvalidResponse(format!("HTTP {}: {}", status, text)));
            }
        };

        if !status.is_success() {
            if let Some(err) = provider_error(&body) {
                return Err(err);
            }
            warn!("API 请求失败 [{}]: {}", status, text);
            return Err(WatcherError::InvalidResponse(format!("HTTP {}: {}", status, text)));
        }

        let items = parse_search_response(&body)?;
        debug!("[{}] 返回 {} 条记录", criteria.keywords, items.len());

        Ok(items)
    }
}

#[async_trait]
impl SearchClient for EbayClient {
    async fn search_fixed_price(
        &self,
        criteria: &SearchCriteria,
        settings: &Settings,
    ) -> Result<Vec<Value>> {
        self.find_items(criteria, settings, SearchMode::FixedPrice).await
    }

    async fn search_auctions(
        &self,
        criteria: &SearchCriteria,
        settings: &Settings,
    ) -> Result<Vec<Value>> {
        self.find_items(criteria, settings, SearchMode::Auction).await
    }
}

/// 组装 findItemsAdvanced 的 URL 参数
pub fn finding_params(
    app_id: &str,
    criteria: &SearchCriteria,
    settings: &Settings,
    mode: SearchMode,
) -> Vec<(String, String)> {
    let mut filters: Vec<(&str, String)> = vec![
        ("FeedbackScoreMin", settings.min_feedback.to_string()),
        ("MaxPrice", criteria.max_price.to_string()),
        ("MinPrice", criteria.min_price.to_string()),
        ("LocatedIn", settings.located_in.clone()),
    ];

    if mode == SearchMode::FixedPrice {
        filters.push(("ListingType", "FixedPrice".to_string()));
    }

    if let Some(condition) = criteria.condition {
        filters.push(("Condition", condition.id().to_string()));
    }

    let mut params = vec![
        ("OPERATION-NAME".to_string(), OPERATION.to_string()),
        ("SERVICE-VERSION".to_string(), FINDING_API_VERSION.to_string()),
        ("SECURITY-APPNAME".to_string(), app_id.to_string()),
        ("GLOBAL-ID".to_string(), settings.global_id.clone()),
        ("RESPONSE-DATA-FORMAT".to_string(), "JSON".to_string()),
        ("REST-PAYLOAD".to_string(), String::new()),
        ("keywords".to_string(), criteria.keywords.clone()),
        ("sortOrder".to_string(), mode.sort_order().to_string()),
        ("descriptionSearch".to_string(), "true".to_string()),
        ("outputSelector(0)".to_string(), "AspectHistogram".to_string()),
    ];

    for (i, (name, value)) in filters.into_iter().enumerate() {
        params.push((format!("itemFilter({}).name", i), name.to_string()));
        params.push((format!("itemFilter({}).value", i), value));
    }

    params
}

/// Finding API 的 JSON 把每个字段都包在数组里
fn first<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key)?.as_array()?.first()
}

fn first_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    first(value, key)?.as_str()
}

/// 从响应中提取 eBay 报告的错误（顶层或操作信封内）
fn provider_error(body: &Value) -> Option<WatcherError> {
    let envelope = first(body, &format!("{}Response", OPERATION));
    let ack = envelope.and_then(|e| first_str(e, "ack"));

    let error = first(body, "errorMessage")
        .or_else(|| envelope.and_then(|e| first(e, "errorMessage")))
        .and_then(|m| first(m, "error"));

    let error = match error {
        Some(error) => error,
        None if ack == Some("Failure") => {
            return Some(WatcherError::InvalidResponse("ack=Failure".to_string()))
        }
        None => return None,
    };

    let id = first_str(error, "errorId").unwrap_or_default().to_string();
    let message = first_str(error, "message").unwrap_or_default().to_string();
    let domain = first_str(error, "domain").unwrap_or_default();
    let severity = first_str(error, "severity").unwrap_or("Error");

    if id == AUTH_ERROR_ID || domain == "Security" || message.contains("Authentication") {
        return Some(WatcherError::Auth(format!("[{}] {}", id, message)));
    }

    // 警告级别且请求成功时照常处理结果
    if severity == "Warning" && ack != Some("Failure") {
        warn!("eBay 警告 [{}]: {}", id, message);
        return None;
    }

    Some(WatcherError::Provider { id, message })
}

/// 取出搜索结果中的原始商品记录，没有结果时返回空列表
pub fn parse_search_response(body: &Value) -> Result<Vec<Value>> {
    if let Some(err) = provider_error(body) {
        return Err(err);
    }

    let envelope = first(body, &format!("{}Response", OPERATION)).ok_or_else(|| {
        WatcherError::InvalidResponse(format!("缺少 {}Response", OPERATION))
    })?;

    let items = first(envelope, "searchResult")
        .and_then(|result| result.get("item"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Ok(items)
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(rename = "itemId")]
    item_id: Vec<String>,

    title: Vec<String>,

    #[serde(rename = "galleryURL", default)]
    gallery_url: Vec<String>,

    #[serde(rename = "viewItemURL")]
    view_item_url: Vec<String>,

    #[serde(rename = "sellingStatus")]
    selling_status: Vec<RawSellingStatus>,

    #[serde(rename = "listingInfo")]
    listing_info: Vec<RawListingInfo>,
}

#[derive(Debug, Deserialize)]
struct RawSellingStatus {
    #[serde(rename = "currentPrice")]
    current_price: Vec<RawAmount>,
}

#[derive(Debug, Deserialize)]
struct RawAmount {
    #[serde(rename = "@currencyId")]
    currency_id: String,

    #[serde(rename = "__value__")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct RawListingInfo {
    #[serde(rename = "startTime")]
    start_time: Vec<String>,

    #[serde(rename = "endTime")]
    end_time: Vec<String>,

    #[serde(rename = "listingType")]
    listing_type: Vec<String>,
}

fn one<T>(values: Vec<T>, field: &str) -> Result<T> {
    values
        .into_iter()
        .next()
        .ok_or_else(|| WatcherError::MalformedRecord(format!("缺少字段 {}", field)))
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|e| WatcherError::MalformedRecord(format!("时间格式错误 {:?}: {}", raw, e)))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// 把一条 eBay 商品记录转换成 `Listing`
pub fn normalize(record: &Value) -> Result<Listing> {
    let raw: RawItem = serde_json::from_value(record.clone())
        .map_err(|e| WatcherError::MalformedRecord(e.to_string()))?;

    let info = one(raw.listing_info, "listingInfo")?;
    let selling = one(raw.selling_status, "sellingStatus")?;
    let current_price = one(selling.current_price, "sellingStatus.currentPrice")?;

    let amount = Decimal::from_str(&current_price.value).map_err(|e| {
        WatcherError::MalformedRecord(format!("价格格式错误 {:?}: {}", current_price.value, e))
    })?;

    Ok(Listing {
        id: one(raw.item_id, "itemId")?,
        title: one(raw.title, "title")?,
        description: String::new(),
        start_time: parse_timestamp(&one(info.start_time, "listingInfo.startTime")?)?,
        end_time: parse_timestamp(&one(info.end_time, "listingInfo.endTime")?)?,
        listing_type: ListingType::parse(&one(info.listing_type, "listingInfo.listingType")?),
        price: Price {
            amount,
            currency: current_price.currency_id,
        },
        image_url: raw.gallery_url.into_iter().next(),
        detail_url: one(raw.view_item_url, "viewItemURL")?,
    })
}
