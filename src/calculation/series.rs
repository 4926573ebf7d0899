use chrono::NaiveDate;

use crate::{
    config,
    crawler::{self, RealtimeSource},
    declare::{Bar, Quote},
    error::KValueError,
    logging,
    util::datetime,
};

/// 組好的日線序列
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub bars: Vec<Bar>,
    /// 有補上今日資料時，用來組成今日資料的盤中報價
    pub quote: Option<Quote>,
}

/// 最後一筆資料不是今天時，需要以盤中報價補上今日資料
pub fn needs_today_bar(bars: &[Bar], today_label: &str) -> bool {
    bars.last().map_or(true, |bar| bar.date != today_label)
}

/// 串接上個月與本月的日成交資訊，必要時補上今日的盤中報價。
///
/// 證交所在收盤後才會公布當日的日成交資訊，盤中只能用即時成交價組出一筆
/// 最高、最低、收盤都相同的資料。
pub async fn assemble<R>(
    last_month: Vec<Bar>,
    current_month: Vec<Bar>,
    today: NaiveDate,
    realtime: &R,
    stock_symbol: &str,
    policy: &config::Realtime,
) -> Result<Assembled, KValueError>
where
    R: RealtimeSource + ?Sized,
{
    let mut bars = last_month;
    bars.extend(current_month);

    let today_label = datetime::to_taiwan_date_label(today);
    if !needs_today_bar(&bars, &today_label) {
        return Ok(Assembled { bars, quote: None });
    }

    let quote = crawler::fetch_realtime_quote(realtime, stock_symbol, policy).await?;
    logging::info_file_async(format!(
        "Append {} {} with realtime quote {:?}",
        stock_symbol, today_label, quote
    ));
    bars.push(Bar::synthetic(today_label, quote.price()));

    Ok(Assembled {
        bars,
        quote: Some(quote),
    })
}
