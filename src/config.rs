use crate::error::{Result, WatcherError};
use crate::types::SearchCriteria;
use log::info;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_WATCHLIST_PATH: &str = "watchlist.toml";
pub const DEFAULT_LOG_FILE: &str = "debug.log";

/// 所有搜索共用的设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub min_feedback: u32,
    pub located_in: String,
    pub global_id: String,
    pub poll_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_feedback: 5,
            located_in: "GB".to_string(),
            global_id: "EBAY-GB".to_string(),
            poll_interval_secs: 20,
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// 从环境变量读取的凭据，缺任何一个都直接启动失败
#[derive(Debug, Clone)]
pub struct Credentials {
    pub ebay_app_id: String,
    pub discord_webhook_id: String,
    pub discord_webhook_token: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| WatcherError::ConfigError(format!("缺少环境变量 {}", key)))
        };

        Ok(Self {
            ebay_app_id: required("EBAY_API_ID")?,
            discord_webhook_id: required("DISCORD_WEBHOOK_ID")?,
            discord_webhook_token: required("DISCORD_WEBHOOK_TOKEN")?,
        })
    }
}

/// 监控列表：全局设置加上若干搜索条件
#[derive(Debug, Deserialize)]
pub struct WatchList {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default, rename = "search")]
    pub searches: Vec<SearchCriteria>,
}

impl WatchList {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WatcherError::ConfigError(format!("读取配置文件 {} 失败: {}", path.display(), e))
        })?;

        let watch_list = Self::from_toml(&contents)?;
        info!(
            "从 {} 加载了 {} 个搜索条件",
            path.display(),
            watch_list.searches.len()
        );

        Ok(watch_list)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let watch_list: WatchList = toml::from_str(contents)
            .map_err(|e| WatcherError::ConfigError(format!("配置文件解析失败: {}", e)))?;

        watch_list.validate()?;
        Ok(watch_list)
    }

    fn validate(&self) -> Result<()> {
        if self.searches.is_empty() {
            return Err(WatcherError::ConfigError("没有配置任何搜索条件".to_string()));
        }

        if self.settings.poll_interval_secs == 0 {
            return Err(WatcherError::ConfigError("poll_interval_secs 必须大于 0".to_string()));
        }

        for search in &self.searches {
            if search.keywords.trim().is_empty() {
                return Err(WatcherError::ConfigError("搜索关键词不能为空".to_string()));
            }
            if search.min_price > search.max_price {
                return Err(WatcherError::ConfigError(format!(
                    "[{}] min_price {} 大于 max_price {}",
                    search.keywords, search.min_price, search.max_price
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Condition;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    const WATCHLIST: &str = r#"
        [settings]
        min_feedback = 10
        located_in = "GB"

        [[search]]
        keywords = "Surface Pro 16GB"
        min_price = 100
        max_price = 1000
        anti_keywords = ["Surface Pro 4", "Surface Pro 3", "like surface pro"]

        [[search]]
        keywords = "ThinkPad X1"
        min_price = 50.5
        max_price = 400
        condition = "used"
        recency_threshold_minutes = 60
        watch_auctions = true
    "#;

    #[test]
    fn test_parse_watch_list() {
        let watch_list = WatchList::from_toml(WATCHLIST).unwrap();

        assert_eq!(watch_list.settings.min_feedback, 10);
        assert_eq!(watch_list.settings.global_id, "EBAY-GB");
        assert_eq!(watch_list.settings.poll_interval(), Duration::from_secs(20));
        assert_eq!(watch_list.searches.len(), 2);

        let surface = &watch_list.searches[0];
        assert_eq!(surface.keywords, "Surface Pro 16GB");
        assert_eq!(surface.min_price, Decimal::new(100, 0));
        assert_eq!(surface.anti_keywords.len(), 3);
        assert_eq!(surface.condition, None);
        assert_eq!(surface.recency_threshold_minutes, 5000);
        assert_eq!(surface.ending_soon_threshold_minutes, 15);
        assert!(!surface.watch_auctions);
        assert_eq!(surface.seen_count(), 0);

        let thinkpad = &watch_list.searches[1];
        assert_eq!(thinkpad.min_price, Decimal::new(505, 1));
        assert_eq!(thinkpad.condition, Some(Condition::Used));
        assert_eq!(thinkpad.recency_threshold_minutes, 60);
        assert!(thinkpad.anti_keywords.is_empty());
        assert!(thinkpad.watch_auctions);
    }

    #[test]
    fn test_empty_watch_list_is_rejected() {
        let err = WatchList::from_toml("[settings]\nmin_feedback = 1\n").unwrap_err();
        assert!(matches!(err, WatcherError::ConfigError(_)));
    }

    #[test]
    fn test_inverted_price_range_is_rejected() {
        let toml = r#"
            [[search]]
            keywords = "Surface Pro"
            min_price = 500
            max_price = 100
        "#;
        assert!(matches!(WatchList::from_toml(toml), Err(WatcherError::ConfigError(_))));
    }

    #[test]
    fn test_credentials_fail_fast_when_missing() {
        let mut env = HashMap::new();
        env.insert("EBAY_API_ID", "app-123");
        env.insert("DISCORD_WEBHOOK_ID", "42");
        env.insert("DISCORD_WEBHOOK_TOKEN", "  ");

        let err = Credentials::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(err.to_string().contains("DISCORD_WEBHOOK_TOKEN"));

        env.insert("DISCORD_WEBHOOK_TOKEN", "secret");
        let creds = Credentials::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(creds.ebay_app_id, "app-123");
        assert_eq!(creds.discord_webhook_id, "42");
        assert_eq!(creds.discord_webhook_token, "secret");
    }
}
