use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("API 请求失败: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("无效的响应数据: {0}")]
    InvalidResponse(String),

    #[error("eBay 返回错误 [{id}]: {message}")]
    Provider { id: String, message: String },

    #[error("认证失败: {0}")]
    Auth(String),

    #[error("无法解析的商品记录: {0}")]
    MalformedRecord(String),

    #[error("配置错误: {0}")]
    ConfigError(String),
}

impl WatcherError {
    /// 重试也无法恢复的错误，主循环遇到后直接退出
    pub fn is_fatal(&self) -> bool {
        matches!(self, WatcherError::Auth(_) | WatcherError::ConfigError(_))
    }
}

pub type Result<T> = std::result::Result<T, WatcherError>;
