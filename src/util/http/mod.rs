use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use once_cell::sync::{Lazy, OnceCell};
use reqwest::{header, Client, Method, Response};
use serde::de::DeserializeOwned;

use crate::{config, logging::Logger};

pub mod user_agent;

/// A singleton instance of the reqwest client.
static CLIENT: OnceCell<Client> = OnceCell::new();

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("http"));

/// HTTP 請求遇到傳輸錯誤時的最大嘗試次數。
const MAX_RETRIES: usize = 2;

/// 以設定的逾時建立 client，已經建立過時沿用原本的
pub fn init(settings: &config::Http) -> Result<()> {
    CLIENT.get_or_try_init(|| build_client(settings))?;
    Ok(())
}

/// Returns the reqwest client singleton instance or creates one with the default timeouts.
fn get_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| build_client(&config::Http::default()))
}

fn build_client(settings: &config::Http) -> Result<Client> {
    // 已經安裝過 provider 時會回傳 Err，可以忽略
    let _ = rustls::crypto::ring::default_provider().install_default();

    Client::builder()
        .gzip(true)
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .timeout(Duration::from_secs(settings.timeout_secs))
        .tcp_nodelay(true)
        .pool_idle_timeout(Duration::from_secs(90))
        .redirect(reqwest::redirect::Policy::limited(5))
        .user_agent(user_agent::gen_random_ua())
        .build()
        .map_err(|e| anyhow!("Failed to create reqwest client: {:?}", e))
}

/// 等 http 日誌寫完
pub fn flush_log() {
    LOGGER.flush();
}

/// Performs an HTTP GET request and deserializes the JSON response into the specified type.
///
/// Transport failures are retried up to `MAX_RETRIES` times.
///
/// # Arguments
///
/// * `url`: The URL to send the GET request to.
/// * `headers`: An optional set of headers to include with the request.
///
/// # Returns
///
/// * `Result<RES>`: The deserialized response, or an error if the request fails
///   or the response cannot be deserialized.
pub async fn get_json<RES: DeserializeOwned>(
    url: &str,
    headers: Option<header::HeaderMap>,
) -> Result<RES> {
    get_json_with_attempts(get_client()?, url, headers, MAX_RETRIES).await
}

/// 只送出一次請求，重試交給呼叫端自己的策略
pub async fn get_json_once<RES: DeserializeOwned>(
    url: &str,
    headers: Option<header::HeaderMap>,
) -> Result<RES> {
    get_json_with_attempts(get_client()?, url, headers, 1).await
}

async fn get_json_with_attempts<RES: DeserializeOwned>(
    client: &Client,
    url: &str,
    headers: Option<header::HeaderMap>,
    max_attempts: usize,
) -> Result<RES> {
    let res = send(client, Method::GET, url, headers, max_attempts).await?;
    let status = res.status();
    if !status.is_success() {
        return Err(anyhow!("GET {} responded with HTTP {}", url, status));
    }

    let body = res
        .text()
        .await
        .map_err(|e| anyhow!("Error reading response body: {}", e))?;

    serde_json::from_str(&body)
        .map_err(|e| anyhow!("Error parsing response JSON({}): {:?}", body, e))
}

/// Sends an HTTP request, retrying transport failures up to `max_attempts` times
/// with an exponential delay between attempts.
async fn send(
    client: &Client,
    method: Method,
    url: &str,
    headers: Option<header::HeaderMap>,
    max_attempts: usize,
) -> Result<Response> {
    let visit_log = format!("{method}:{url}");
    let mut rb = client.request(method, url);
    let mut last_error = String::new();
    let max_attempts = max_attempts.max(1);

    if let Some(h) = headers {
        rb = rb.headers(h);
    }

    for attempt in 1..=max_attempts {
        let msg = format!("Attempt {} to send {}", attempt, visit_log);
        let rb_clone = rb
            .try_clone()
            .ok_or_else(|| anyhow!("Failed to clone RequestBuilder"))?;
        let start = Instant::now();
        let res = rb_clone.send().await;
        let elapsed = start.elapsed().as_millis();

        match res {
            Ok(response) => {
                LOGGER.info(format!("{} {} ms", msg, elapsed));
                return Ok(response);
            }
            Err(why) => {
                last_error = format!("{:?}", why);
                LOGGER.error(format!("{} failed because {:?}. {} ms", msg, why, elapsed));
                if attempt < max_attempts {
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt as u32))).await;
                }
            }
        }
    }

    Err(anyhow!(
        "Failed to send request to {} after {} attempts; last error: {}",
        url,
        max_attempts,
        last_error
    ))
}
