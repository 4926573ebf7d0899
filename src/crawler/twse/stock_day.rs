use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    crawler::{
        twse::{self, Twse},
        HistorySource,
    },
    declare::Bar,
    logging,
    util::{datetime, http, text},
};

/// 欄位順序︰日期、成交股數、成交金額、開盤價、最高價、最低價、收盤價、漲跌價差、成交筆數
const COLUMN_DATE: usize = 0;
const COLUMN_HIGH: usize = 4;
const COLUMN_LOW: usize = 5;
const COLUMN_CLOSE: usize = 6;

#[derive(Serialize, Deserialize, Debug)]
struct StockDayResponse {
    pub stat: Option<String>,
    pub data: Option<Vec<Vec<String>>>,
}

/// 抓取個股指定月份的日成交資訊
pub async fn visit(stock_symbol: &str, month: NaiveDate) -> Result<Vec<Bar>> {
    let url = format!(
        "https://www.{host}/exchangeReport/STOCK_DAY?response=json&date={date}&stockNo={symbol}",
        host = twse::HOST,
        date = datetime::first_day_of_month(month).format("%Y%m%d"),
        symbol = stock_symbol
    );
    let headers = twse::build_headers("https://www.twse.com.tw/zh/trading/historical/stock-day.html");
    let res = http::get_json::<StockDayResponse>(&url, Some(headers))
        .await
        .with_context(|| format!("Failed to get STOCK_DAY of {}", stock_symbol))?;

    parse(res)
}

fn parse(res: StockDayResponse) -> Result<Vec<Bar>> {
    let stat = res.stat.unwrap_or_default();
    if stat.trim().to_uppercase() != "OK" {
        return Err(anyhow!("STOCK_DAY stat is '{}'", stat));
    }

    let rows = res.data.unwrap_or_default();
    let mut bars = Vec::with_capacity(rows.len());

    for row in rows {
        match parse_row(&row) {
            Some(bar) => bars.push(bar),
            None => {
                logging::warn_file_async(format!("Skip malformed STOCK_DAY row: {:?}", row));
            }
        }
    }

    Ok(bars)
}

/// 價格欄位無法轉成數字時（例如暫停交易的 `--`）保留為 `None`
fn parse_row(row: &[String]) -> Option<Bar> {
    if row.len() <= COLUMN_CLOSE {
        return None;
    }

    let date = row[COLUMN_DATE].trim();
    datetime::parse_taiwan_date(date)?;

    Some(Bar {
        date: date.to_string(),
        high: text::coerce_decimal(&row[COLUMN_HIGH]),
        low: text::coerce_decimal(&row[COLUMN_LOW]),
        close: text::coerce_decimal(&row[COLUMN_CLOSE]),
    })
}

#[async_trait]
impl HistorySource for Twse {
    async fn monthly_bars(&self, stock_symbol: &str, month: NaiveDate) -> Result<Vec<Bar>> {
        visit(stock_symbol, month).await
    }
}
