use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::Result;
use config::{Config as config_config, File as config_file};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::logging;

const CONFIG_PATH: &str = "app.json";

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct App {
    #[serde(default)]
    pub stock: Stock,
    #[serde(default)]
    pub realtime: Realtime,
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub output: Output,
}

const STOCK_SYMBOL: &str = "STOCK_SYMBOL";
const STOCK_PERIOD: &str = "STOCK_PERIOD";
const STOCK_ALPHA: &str = "STOCK_ALPHA";

/// 要計算 K 值的標的與參數
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Stock {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// RSV 回看的天數
    #[serde(default = "default_period")]
    pub period: usize,
    /// 平滑係數
    #[serde(default = "default_alpha")]
    pub alpha: Decimal,
}

impl Default for Stock {
    fn default() -> Self {
        Stock {
            symbol: default_symbol(),
            period: default_period(),
            alpha: default_alpha(),
        }
    }
}

fn default_symbol() -> String {
    "0050".to_string()
}

fn default_period() -> usize {
    9
}

fn default_alpha() -> Decimal {
    dec!(1) / dec!(3)
}

const REALTIME_MAX_ATTEMPTS: &str = "REALTIME_MAX_ATTEMPTS";
const REALTIME_RETRY_DELAY_MS: &str = "REALTIME_RETRY_DELAY_MS";

/// 盤中即時報價的重試設定
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Realtime {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for Realtime {
    fn default() -> Self {
        Realtime {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Realtime {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_max_attempts() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

const HTTP_CONNECT_TIMEOUT_SECS: &str = "HTTP_CONNECT_TIMEOUT_SECS";
const HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Http {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Http {
    fn default() -> Self {
        Http {
            connect_timeout_secs: default_connect_timeout_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    8
}

fn default_timeout_secs() -> u64 {
    15
}

/// 輸出方式
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputMode {
    /// 只印出最新一筆 K 值
    #[default]
    Latest,
    /// 畫出價格區間與 K 值的雙面板圖
    Chart,
}

const OUTPUT_MODE: &str = "OUTPUT_MODE";
const OUTPUT_CHART_PATH: &str = "OUTPUT_CHART_PATH";

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct Output {
    #[serde(default)]
    pub mode: OutputMode,
    /// 圖表另存的檔案路徑，空字串表示只輸出到終端機
    #[serde(default)]
    pub chart_path: String,
}

pub static SETTINGS: Lazy<App> = Lazy::new(|| {
    App::get().unwrap_or_else(|why| {
        logging::error_file_async(format!(
            "I can't read the config context because {:?}",
            why
        ));
        App::default().override_with_env()
    })
});

impl App {
    fn get() -> Result<Self> {
        let config_path = config_path();
        if config_path.exists() {
            let config: App = config_config::builder()
                .add_source(config_file::from(config_path))
                .build()?
                .try_deserialize()?;
            return Ok(config.override_with_env());
        }

        Ok(App::default().override_with_env())
    }

    /// 將來至於 env 的設定值覆蓋掉 json 上的設定值
    fn override_with_env(mut self) -> Self {
        if let Ok(symbol) = env::var(STOCK_SYMBOL) {
            let symbol = symbol.trim();
            if !symbol.is_empty() {
                self.stock.symbol = symbol.to_string();
            }
        }

        if let Some(period) = parse_env::<usize>(STOCK_PERIOD) {
            self.stock.period = period;
        }

        if let Some(alpha) = parse_env::<Decimal>(STOCK_ALPHA) {
            self.stock.alpha = alpha;
        }

        if let Some(max_attempts) = parse_env::<usize>(REALTIME_MAX_ATTEMPTS) {
            self.realtime.max_attempts = max_attempts;
        }

        if let Some(delay) = parse_env::<u64>(REALTIME_RETRY_DELAY_MS) {
            self.realtime.retry_delay_ms = delay;
        }

        if let Some(secs) = parse_env::<u64>(HTTP_CONNECT_TIMEOUT_SECS) {
            self.http.connect_timeout_secs = secs;
        }

        if let Some(secs) = parse_env::<u64>(HTTP_TIMEOUT_SECS) {
            self.http.timeout_secs = secs;
        }

        if let Some(mode) = parse_env::<OutputMode>(OUTPUT_MODE) {
            self.output.mode = mode;
        }

        if let Ok(path) = env::var(OUTPUT_CHART_PATH) {
            self.output.chart_path = path;
        }

        self
    }
}

/// 讀取環境變數並轉型，轉型失敗時記錄下來並忽略
fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match T::from_str(raw.trim()) {
        Ok(v) => Some(v),
        Err(_) => {
            logging::warn_file_async(format!("Ignore invalid value of {}: '{}'", key, raw));
            None
        }
    }
}

/// 回傳設定檔的路徑
fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_PATH)
}
