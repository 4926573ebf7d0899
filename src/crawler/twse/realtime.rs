use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Local;
use concat_string::concat_string;
use serde::{Deserialize, Serialize};

use crate::{
    crawler::{
        twse::{self, Twse},
        RealtimeSource, Snapshot,
    },
    util::{http, text},
};

/// 基本市況報導網站
const MIS_HOST: &str = "mis.twse.com.tw";

#[derive(Serialize, Deserialize, Debug)]
struct StockInfoResponse {
    #[serde(rename = "msgArray")]
    pub msg_array: Option<Vec<StockInfo>>,
    #[serde(rename = "rtmessage")]
    pub rt_message: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct StockInfo {
    /// 最近成交價，尚未成交時為 "-"
    #[serde(rename = "z", default)]
    pub trade_price: String,
    /// 開盤價
    #[serde(rename = "o", default)]
    pub opening_price: String,
}

/// 查詢上市股票的盤中報價
pub async fn visit(stock_symbol: &str) -> Result<Snapshot> {
    let url = format!(
        "https://{host}/stock/api/getStockInfo.jsp?ex_ch={ex_ch}&json=1&delay=0&_={time}",
        host = MIS_HOST,
        ex_ch = concat_string!("tse_", stock_symbol, ".tw"),
        time = Local::now().timestamp_millis()
    );
    let headers = twse::build_headers("https://mis.twse.com.tw/stock/fibest.jsp");
    // 每次查詢只送一次請求，失敗次數由 fetch_realtime_quote 的重試策略計算
    let res = http::get_json_once::<StockInfoResponse>(&url, Some(headers)).await?;

    parse(stock_symbol, res)
}

fn parse(stock_symbol: &str, res: StockInfoResponse) -> Result<Snapshot> {
    let info = res
        .msg_array
        .and_then(|list| list.into_iter().next())
        .ok_or_else(|| {
            anyhow!(
                "getStockInfo returned no msgArray for {} ({})",
                stock_symbol,
                res.rt_message.unwrap_or_default()
            )
        })?;

    Ok(Snapshot {
        last_price: text::coerce_decimal(&info.trade_price),
        opening_price: text::coerce_decimal(&info.opening_price),
    })
}

#[async_trait]
impl RealtimeSource for Twse {
    async fn snapshot(&self, stock_symbol: &str) -> Result<Snapshot> {
        visit(stock_symbol).await
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::logging;

    use super::*;

    #[test]
    fn test_parse_traded() {
        let json = r#"{"msgArray":[{"c":"0050","n":"元大台灣50","z":"150.3500","o":"149.8000","h":"150.6000","l":"149.5000","y":"149.2000"}],"rtmessage":"OK","rtcode":"0000"}"#;
        let res: StockInfoResponse = serde_json::from_str(json).unwrap();

        let snapshot = parse("0050", res).unwrap();

        assert_eq!(snapshot.last_price, Some(dec!(150.35)));
        assert_eq!(snapshot.opening_price, Some(dec!(149.8)));
    }

    #[test]
    fn test_parse_not_traded_yet() {
        let json = r#"{"msgArray":[{"c":"0050","z":"-","o":"99.0000"}],"rtmessage":"OK"}"#;
        let res: StockInfoResponse = serde_json::from_str(json).unwrap();

        let snapshot = parse("0050", res).unwrap();

        assert_eq!(snapshot.last_price, None);
        assert_eq!(snapshot.opening_price, Some(dec!(99.0)));
    }

    #[test]
    fn test_parse_empty_msg_array() {
        let json = r#"{"msgArray":[],"rtmessage":"Empty Query."}"#;
        let res: StockInfoResponse = serde_json::from_str(json).unwrap();

        let err = parse("0050", res).unwrap_err();
        assert!(err.to_string().contains("Empty Query."));
    }

    #[tokio::test]
    #[ignore]
    async fn test_visit() {
        dotenv::dotenv().ok();
        logging::debug_file_async("開始 visit".to_string());

        match visit("0050").await {
            Ok(snapshot) => {
                logging::debug_file_async(format!("snapshot:{:#?}", snapshot));
            }
            Err(why) => {
                logging::debug_file_async(format!("Failed to visit because: {:?}", why));
            }
        }

        logging::debug_file_async("結束 visit".to_string());
    }
}
