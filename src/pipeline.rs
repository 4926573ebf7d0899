use chrono::NaiveDate;

use crate::{
    calculation::{
        series,
        stochastic::{self, IndicatorRow},
    },
    config::App,
    crawler::{HistorySource, RealtimeSource},
    declare::{Bar, Quote},
    error::KValueError,
    logging,
    util::datetime::{self, Clock},
};

/// 一次執行的結果
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub stock_symbol: String,
    pub rows: Vec<IndicatorRow>,
    /// 有以盤中報價補上今日資料時才會有值
    pub quote: Option<Quote>,
}

impl Report {
    pub fn latest(&self) -> Option<&IndicatorRow> {
        self.rows.last()
    }
}

/// 抓上個月與本月的日成交資訊，必要時補上今日盤中報價，再算出每一天的 K 值
pub async fn run<H, R, C>(
    settings: &App,
    history: &H,
    realtime: &R,
    clock: &C,
) -> Result<Report, KValueError>
where
    H: HistorySource + ?Sized,
    R: RealtimeSource + ?Sized,
    C: Clock + ?Sized,
{
    stochastic::validate(settings.stock.period, settings.stock.alpha)?;

    let stock_symbol = settings.stock.symbol.as_str();
    let today = clock.today();

    let current_month = fetch_month(history, stock_symbol, datetime::first_day_of_month(today)).await?;
    let last_month =
        fetch_month(history, stock_symbol, datetime::first_day_of_previous_month(today)).await?;

    let assembled = series::assemble(
        last_month,
        current_month,
        today,
        realtime,
        stock_symbol,
        &settings.realtime,
    )
    .await?;

    let rows = stochastic::calculate_k_values(
        &assembled.bars,
        settings.stock.period,
        settings.stock.alpha,
    )?;

    logging::info_file_async(format!(
        "Calculated {} K values of {} (period={}, alpha={})",
        rows.len(),
        stock_symbol,
        settings.stock.period,
        settings.stock.alpha
    ));

    Ok(Report {
        stock_symbol: stock_symbol.to_string(),
        rows,
        quote: assembled.quote,
    })
}

async fn fetch_month<H>(history: &H, stock_symbol: &str, month: NaiveDate) -> Result<Vec<Bar>, KValueError>
where
    H: HistorySource + ?Sized,
{
    match history.monthly_bars(stock_symbol, month).await {
        Ok(bars) => {
            logging::debug_file_async(format!(
                "Fetched {} bars of {} in {}",
                bars.len(),
                stock_symbol,
                month.format("%Y%m")
            ));
            Ok(bars)
        }
        Err(why) => {
            logging::error_file_async(format!(
                "Failed to fetch history of {} in {} because {:?}",
                stock_symbol,
                month.format("%Y%m"),
                why
            ));
            Err(KValueError::History {
                stock_symbol: stock_symbol.to_string(),
                month: month.format("%Y%m").to_string(),
                reason: format!("{:#}", why),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::{
        calculation::stochastic::StochasticError,
        config,
        crawler::{
            tests::{fast_policy, ScriptedRealtime},
            Snapshot,
        },
        util::datetime::FixedClock,
    };

    use super::*;

    /// 以月份第一天為鍵，沒有登記的月份視為證交所回傳非 OK
    struct FakeHistory {
        months: HashMap<NaiveDate, Vec<Bar>>,
        calls: Mutex<usize>,
    }

    impl FakeHistory {
        fn new(months: HashMap<NaiveDate, Vec<Bar>>) -> Self {
            FakeHistory {
                months,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl HistorySource for FakeHistory {
        async fn monthly_bars(&self, _stock_symbol: &str, month: NaiveDate) -> Result<Vec<Bar>> {
            *self.calls.lock().unwrap() += 1;
            self.months
                .get(&month)
                .cloned()
                .ok_or_else(|| anyhow!("STOCK_DAY stat is '很抱歉，沒有符合條件的資料!'"))
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn settings(period: usize) -> App {
        App {
            stock: config::Stock {
                symbol: "0050".to_string(),
                period,
                alpha: dec!(1) / dec!(3),
            },
            realtime: fast_policy(),
            ..Default::default()
        }
    }

    fn history() -> FakeHistory {
        let mut months = HashMap::new();
        months.insert(
            ymd(2024, 3, 1),
            vec![
                Bar::new("113/03/28", dec!(12), dec!(8), dec!(10)),
                Bar::new("113/03/29", dec!(14), dec!(9), dec!(13)),
            ],
        );
        months.insert(
            ymd(2024, 4, 1),
            vec![
                Bar::new("113/04/01", dec!(15), dec!(10), dec!(11)),
                Bar::new("113/04/02", dec!(13), dec!(11), dec!(12)),
            ],
        );
        FakeHistory::new(months)
    }

    #[tokio::test]
    async fn test_run_without_realtime_quote() {
        let clock = FixedClock::on(ymd(2024, 4, 2)).unwrap();
        let realtime = ScriptedRealtime::new(vec![]);

        let report = run(&settings(3), &history(), &realtime, &clock).await.unwrap();

        assert_eq!(report.stock_symbol, "0050");
        assert_eq!(report.quote, None);
        assert_eq!(realtime.calls(), 0);
        let dates: Vec<&str> = report.rows.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, ["113/03/28", "113/03/29", "113/04/01", "113/04/02"]);

        // 113/04/01: 區間 8~15，RSV = (11-8)/7*100
        // 113/04/02: 區間 9~15，RSV = (12-9)/6*100 = 50
        let rows = &report.rows;
        assert_eq!(rows[0].k, None);
        assert_eq!(rows[1].k, None);
        assert_eq!(rows[2].rolling_high, Some(dec!(15)));
        assert_eq!(rows[2].rolling_low, Some(dec!(8)));
        assert_eq!(rows[3].rsv, Some(dec!(50)));
        let latest = report.latest().unwrap().k.unwrap();
        // K = 50/3 + 2/3 * 300/7 ≈ 45.24
        assert_eq!(latest.round_dp(2), dec!(45.24));
    }

    #[tokio::test]
    async fn test_run_appends_today_from_realtime() {
        let clock = FixedClock::on(ymd(2024, 4, 3)).unwrap();
        let realtime = ScriptedRealtime::new(vec![Ok(Snapshot {
            last_price: Some(dec!(14)),
            opening_price: Some(dec!(12.5)),
        })]);

        let report = run(&settings(3), &history(), &realtime, &clock).await.unwrap();

        assert_eq!(report.quote, Some(Quote::Traded(dec!(14))));
        let latest = report.latest().unwrap();
        assert_eq!(latest.date, "113/04/03");
        assert_eq!(latest.close, Some(dec!(14)));
        // 區間 10~15，RSV = (14-10)/5*100 = 80
        assert_eq!(latest.rsv, Some(dec!(80)));
    }

    #[tokio::test]
    async fn test_run_reports_degraded_quote() {
        let clock = FixedClock::on(ymd(2024, 4, 3)).unwrap();
        let not_traded = || {
            Ok(Snapshot {
                last_price: None,
                opening_price: Some(dec!(12.5)),
            })
        };
        let realtime = ScriptedRealtime::new(vec![not_traded(), not_traded(), not_traded()]);

        let report = run(&settings(3), &history(), &realtime, &clock).await.unwrap();

        assert_eq!(report.quote, Some(Quote::Degraded(dec!(12.5))));
        assert_eq!(report.latest().unwrap().close, Some(dec!(12.5)));
    }

    #[tokio::test]
    async fn test_run_history_failure_aborts() {
        // 2024-05 沒有資料
        let clock = FixedClock::on(ymd(2024, 5, 2)).unwrap();
        let realtime = ScriptedRealtime::new(vec![]);

        let err = run(&settings(3), &history(), &realtime, &clock).await.unwrap_err();

        match err {
            KValueError::History {
                stock_symbol,
                month,
                reason,
            } => {
                assert_eq!(stock_symbol, "0050");
                assert_eq!(month, "202405");
                assert!(reason.contains("沒有符合條件的資料"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(realtime.calls(), 0);
    }

    #[tokio::test]
    async fn test_run_previous_month_failure_aborts() {
        // 4 月有資料，3 月沒有
        let april = history().months.remove(&ymd(2024, 4, 1)).unwrap();
        let history = FakeHistory::new(HashMap::from([(ymd(2024, 4, 1), april)]));
        let clock = FixedClock::on(ymd(2024, 4, 3)).unwrap();
        let realtime = ScriptedRealtime::new(vec![]);

        let err = run(&settings(3), &history, &realtime, &clock).await.unwrap_err();

        match err {
            KValueError::History { month, .. } => assert_eq!(month, "202403"),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(history.calls(), 2);
        assert_eq!(realtime.calls(), 0);
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_period_before_fetching() {
        let clock = FixedClock::on(ymd(2024, 4, 3)).unwrap();
        let history = history();
        let realtime = ScriptedRealtime::new(vec![]);

        let err = run(&settings(0), &history, &realtime, &clock).await.unwrap_err();

        assert!(matches!(
            err,
            KValueError::Indicator(StochasticError::InvalidPeriod { period: 0 })
        ));
        assert_eq!(history.calls(), 0);
        assert_eq!(realtime.calls(), 0);
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_alpha_before_fetching() {
        let clock = FixedClock::on(ymd(2024, 4, 3)).unwrap();
        let history = history();
        let realtime = ScriptedRealtime::new(vec![]);
        let mut settings = settings(3);
        settings.stock.alpha = Decimal::ZERO;

        let err = run(&settings, &history, &realtime, &clock).await.unwrap_err();

        assert!(matches!(
            err,
            KValueError::Indicator(StochasticError::InvalidAlpha { .. })
        ));
        assert_eq!(history.calls(), 0);
    }
}
