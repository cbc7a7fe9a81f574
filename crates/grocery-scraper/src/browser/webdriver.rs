//! Minimal W3C WebDriver client (chromedriver, Selenium, browserless).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};

use super::{BrowserLauncher, BrowserSession};
use crate::error::ScraperError;

/// Key the W3C protocol uses for element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const BODY_TEXT_SCRIPT: &str = "return document.body ? document.body.innerText : '';";
const SCROLL_SCRIPT: &str =
    "window.scrollTo(0, document.body.scrollHeight); return document.body.scrollHeight;";

/// Opens WebDriver sessions against a remote endpoint.
pub struct WebDriverLauncher {
    client: Client,
    endpoint: String,
    token: Option<String>,
    headless: bool,
    user_agent: String,
}

impl WebDriverLauncher {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be constructed.
    pub fn new(
        endpoint: &str,
        token: Option<&str>,
        headless: bool,
        user_agent: &str,
        command_timeout_secs: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(command_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            headless,
            user_agent: user_agent.to_string(),
        })
    }

    fn capabilities(&self) -> Value {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--window-size=1920,1080".to_string(),
            format!("--user-agent={}", self.user_agent),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "pageLoadStrategy": "normal",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, ScraperError> {
        let url = with_token(&format!("{}/session", self.endpoint), self.token.as_deref());
        let response = self
            .client
            .post(&url)
            .json(&self.capabilities())
            .send()
            .await?;
        let value = read_value(response, "new session").await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| ScraperError::Browser {
                command: "new session".to_string(),
                message: "response carried no sessionId".to_string(),
            })?
            .to_string();

        tracing::debug!(session_id = %session_id, "webdriver session opened");
        Ok(Box::new(WebDriverSession {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            token: self.token.clone(),
            session_id,
            closed: false,
        }))
    }
}

/// One live WebDriver session. Owned by a single source run.
pub struct WebDriverSession {
    client: Client,
    endpoint: String,
    token: Option<String>,
    session_id: String,
    closed: bool,
}

impl WebDriverSession {
    fn session_url(&self, path: &str) -> String {
        with_token(
            &format!("{}/session/{}{}", self.endpoint, self.session_id, path),
            self.token.as_deref(),
        )
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        command: &str,
    ) -> Result<Value, ScraperError> {
        let url = self.session_url(path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        read_value(response, command).await
    }

    async fn execute(&self, script: &str) -> Result<Value, ScraperError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": [] })),
            "execute script",
        )
        .await
    }

    async fn text_of(&self, path: &str, command: &str) -> Result<String, ScraperError> {
        let value = self.command(Method::GET, path, None, command).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&mut self, url: &str) -> Result<(), ScraperError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })), "navigate")
            .await
            .map(|_| ())
    }

    async fn title(&mut self) -> Result<String, ScraperError> {
        self.text_of("/title", "get title").await
    }

    async fn body_text(&mut self) -> Result<String, ScraperError> {
        let value = self.execute(BODY_TEXT_SCRIPT).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn page_source(&mut self) -> Result<String, ScraperError> {
        self.text_of("/source", "get page source").await
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), ScraperError> {
        self.execute(SCROLL_SCRIPT).await.map(|_| ())
    }

    async fn click_first(&mut self, css: &str) -> Result<bool, ScraperError> {
        let found = self
            .command(
                Method::POST,
                "/element",
                Some(json!({ "using": "css selector", "value": css })),
                "find element",
            )
            .await;
        let element = match found {
            Ok(value) => value,
            Err(ScraperError::Browser { message, .. }) if message.starts_with("no such element") => {
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        let Some(element_id) = element.get(ELEMENT_KEY).and_then(Value::as_str) else {
            return Ok(false);
        };
        self.command(
            Method::POST,
            &format!("/element/{element_id}/click"),
            Some(json!({})),
            "click element",
        )
        .await?;
        Ok(true)
    }

    async fn close(mut self: Box<Self>) -> Result<(), ScraperError> {
        self.closed = true;
        self.command(Method::DELETE, "", None, "delete session")
            .await
            .map(|_| ())?;
        tracing::debug!(session_id = %self.session_id, "webdriver session closed");
        Ok(())
    }
}

impl Drop for WebDriverSession {
    /// A run cancelled mid-flight (source deadline) never reaches `close`;
    /// fire the delete in the background so the remote browser is freed.
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(session_id = %self.session_id, "webdriver session dropped without a runtime");
            return;
        };
        let client = self.client.clone();
        let url = self.session_url("");
        let session_id = self.session_id.clone();
        handle.spawn(async move {
            if let Err(e) = client.delete(&url).send().await {
                tracing::warn!(session_id = %session_id, error = %e, "failed to delete abandoned session");
            }
        });
    }
}

fn with_token(url: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => format!(
            "{url}?token={}",
            percent_encoding::utf8_percent_encode(token, percent_encoding::NON_ALPHANUMERIC)
        ),
        None => url.to_string(),
    }
}

/// Unwrap the `{"value": ...}` envelope, turning WebDriver error payloads
/// into [`ScraperError::Browser`].
async fn read_value(response: reqwest::Response, command: &str) -> Result<Value, ScraperError> {
    let status = response.status();
    let text = response.text().await?;
    let parsed: Value = serde_json::from_str(&text).map_err(|e| ScraperError::Deserialize {
        context: format!("webdriver {command}"),
        source: e,
    })?;
    let value = parsed.get("value").cloned().unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }

    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = value.get("message").and_then(Value::as_str).unwrap_or("");
    Err(ScraperError::Browser {
        command: command.to_string(),
        message: format!("{error}: {message} (HTTP {})", status.as_u16()),
    })
}
