use crate::error::{Result, WatcherError};
use crate::types::{Alert, AlertKind};
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Serialize;

const DISCORD_WEBHOOK_BASE: &str = "https://discord.com/api/webhooks";
const EMBED_COLOR: u32 = 0x00ff00;
const DATE_FORMAT: &str = "%d/%m/%Y  %H:%M %Z";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<()>;
}

#[derive(Debug, Serialize)]
pub struct WebhookMessage {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
pub struct Embed {
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub url: String,

    pub color: u32,

    pub fields: Vec<EmbedField>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
}

#[derive(Debug, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

fn field(name: &str, value: impl Into<String>) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value: value.into(),
        inline: true,
    }
}

/// 按本地时区格式化时间
pub fn format_local(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format(DATE_FORMAT).to_string()
}

/// 把一条提醒排成 Discord embed
pub fn build_message(alert: &Alert) -> WebhookMessage {
    let listing = &alert.listing;

    let type_label = match alert.kind {
        AlertKind::NewFixedPrice => listing.listing_type.to_string(),
        AlertKind::AuctionEndingSoon => format!("{} (即将结束)", listing.listing_type),
    };

    let embed = Embed {
        title: listing.title.clone(),
        description: Some(listing.description.clone()).filter(|d| !d.is_empty()),
        url: listing.detail_url.clone(),
        color: EMBED_COLOR,
        fields: vec![
            field("Price", listing.price.to_string()),
            field("Type", type_label),
            field(":date: Time of Alert", format_local(alert.alerted_at)),
            field(":date: Start Time", format_local(listing.start_time)),
            field(":date: End Time", format_local(listing.end_time)),
            field("URL", listing.detail_url.clone()),
        ],
        image: listing.image_url.clone().map(|url| EmbedImage { url }),
    };

    WebhookMessage {
        embeds: vec![embed],
    }
}

pub struct DiscordNotifier {
    client: Client,
    webhook_path: String,
    url: String,
}

impl DiscordNotifier {
    pub fn new(webhook_id: &str, webhook_token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let webhook_path = format!("{}/{}", webhook_id, webhook_token);

        Ok(Self {
            client,
            url: format!("{}/{}", DISCORD_WEBHOOK_BASE, webhook_path),
            webhook_path,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.url = format!("{}/{}", base_url.trim_end_matches('/'), self.webhook_path);
        self
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        let message = build_message(alert);

        let response = self.client.post(&self.url).json(&message).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND {
            let text = response.text().await.unwrap_or_default();
            return Err(WatcherError::Auth(format!("Discord webhook HTTP {}: {}", status, text)));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(WatcherError::InvalidResponse(format!(
                "Discord webhook HTTP {}: {}",
                status, text
            )));
        }

        debug!("已推送 [{}] {}", alert.listing.id, alert.listing.title);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::listing;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert(kind: AlertKind) -> Alert {
        Alert {
            listing: listing("1001", "Surface Pro 16GB i5", Utc::now()),
            kind,
            criteria: "Surface Pro 16GB".to_string(),
            alerted_at: Utc::now(),
        }
    }

    #[test]
    fn test_embed_fields() {
        let message = build_message(&alert(AlertKind::NewFixedPrice));
        assert_eq!(message.embeds.len(), 1);

        let embed = &message.embeds[0];
        assert_eq!(embed.title, "Surface Pro 16GB i5");
        assert_eq!(embed.color, 0x00ff00);
        assert!(embed.description.is_none());

        let names: Vec<&str> = embed.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Price",
                "Type",
                ":date: Time of Alert",
                ":date: Start Time",
                ":date: End Time",
                "URL"
            ]
        );
        assert_eq!(embed.fields[0].value, "£450.00");
        assert_eq!(embed.fields[1].value, "FixedPrice");
        assert_eq!(embed.fields[5].value, "https://www.ebay.co.uk/itm/1001");
        assert!(embed.fields.iter().all(|f| f.inline));
    }

    #[test]
    fn test_payload_shape() {
        let mut alert = alert(AlertKind::AuctionEndingSoon);
        alert.listing.description = "Boxed, barely used".to_string();

        let payload = serde_json::to_value(build_message(&alert)).unwrap();
        let embed = &payload["embeds"][0];

        assert_eq!(embed["description"], json!("Boxed, barely used"));
        assert_eq!(embed["color"], json!(65280));
        assert_eq!(embed["image"]["url"], json!("https://i.ebayimg.com/thumbs/1001.jpg"));
        assert_eq!(embed["fields"][1]["value"], json!("FixedPrice (即将结束)"));
    }

    #[test]
    fn test_image_omitted_when_missing() {
        let mut alert = alert(AlertKind::NewFixedPrice);
        alert.listing.image_url = None;

        let payload = serde_json::to_value(build_message(&alert)).unwrap();
        assert!(payload["embeds"][0].get("image").is_none());
        assert!(payload["embeds"][0].get("description").is_none());
    }

    #[test]
    fn test_webhook_url() {
        let notifier = DiscordNotifier::new("42", "secret").unwrap();
        assert_eq!(notifier.url, "https://discord.com/api/webhooks/42/secret");
    }

    async fn notifier_with_status(status: u16) -> (MockServer, DiscordNotifier) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/42/secret"))
            .respond_with(ResponseTemplate::new(status).set_body_string("{\"message\": \"nope\"}"))
            .mount(&server)
            .await;

        let notifier = DiscordNotifier::new("42", "secret")
            .unwrap()
            .with_base_url(&server.uri());
        (server, notifier)
    }

    #[tokio::test]
    async fn test_notify_posts_embed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/42/secret"))
            .and(body_partial_json(json!({
                "embeds": [{ "title": "Surface Pro 16GB i5", "color": 65280 }]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = DiscordNotifier::new("42", "secret")
            .unwrap()
            .with_base_url(&format!("{}/", server.uri()));

        tokio_test::assert_ok!(notifier.notify(&alert(AlertKind::NewFixedPrice)).await);
    }

    #[tokio::test]
    async fn test_notify_unauthorized_is_auth() {
        let (_server, notifier) = notifier_with_status(401).await;
        let err = notifier.notify(&alert(AlertKind::NewFixedPrice)).await.unwrap_err();
        assert!(matches!(err, WatcherError::Auth(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_notify_unknown_webhook_is_auth() {
        let (_server, notifier) = notifier_with_status(404).await;
        let err = notifier.notify(&alert(AlertKind::NewFixedPrice)).await.unwrap_err();
        assert!(matches!(err, WatcherError::Auth(_)));
    }

    #[tokio::test]
    async fn test_notify_server_error_is_not_fatal() {
        let (_server, notifier) = notifier_with_status(500).await;
        let err = notifier.notify(&alert(AlertKind::NewFixedPrice)).await.unwrap_err();
        assert!(matches!(err, WatcherError::InvalidResponse(_)));
        assert!(!err.is_fatal());
    }
}
