use reqwest::header::{HeaderMap, HeaderValue};

/// 盤中即時報價（基本市況報導網站）
pub mod realtime;
/// 個股日成交資訊
pub mod stock_day;

const HOST: &str = "twse.com.tw";

/// 台灣證券交易所
///
/// 月成交資訊與盤中報價都由這裡實作 `HistorySource`、`RealtimeSource`。
#[derive(Debug, Default, Clone, Copy)]
pub struct Twse;

fn build_headers(referer: &'static str) -> HeaderMap {
    let mut h = HeaderMap::with_capacity(3);
    h.insert("Referer", HeaderValue::from_static(referer));
    h.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
    h.insert(
        "Accept",
        HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
    );
    h
}
