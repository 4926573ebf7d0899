use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio_retry::{strategy::FixedInterval, Retry};

use crate::{
    config,
    declare::{Bar, Quote},
    error::KValueError,
    logging,
};

/// 台灣證券交易所
pub mod twse;

/// 月成交資訊的來源
#[async_trait]
pub trait HistorySource {
    /// 取得 `month` 所在月份的每日價格，依日期排序
    async fn monthly_bars(&self, stock_symbol: &str, month: NaiveDate) -> Result<Vec<Bar>>;
}

/// 盤中即時報價的一次查詢結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    /// 最近成交價，今日尚未成交時為 `None`
    pub last_price: Option<Decimal>,
    pub opening_price: Option<Decimal>,
}

/// 盤中即時報價的來源
#[async_trait]
pub trait RealtimeSource {
    async fn snapshot(&self, stock_symbol: &str) -> Result<Snapshot>;
}

/// 取得盤中報價。
///
/// 最多查詢 `max_attempts` 次，每次間隔 `retry_delay`；查詢失敗或尚未成交都算一次失敗。
/// 全部失敗時改用最後一次看到的開盤價，並標記為 `Quote::Degraded`。
pub async fn fetch_realtime_quote<R>(
    source: &R,
    stock_symbol: &str,
    policy: &config::Realtime,
) -> Result<Quote, KValueError>
where
    R: RealtimeSource + ?Sized,
{
    let attempts = policy.max_attempts.max(1);
    let strategy = FixedInterval::new(policy.retry_delay()).take(attempts - 1);
    let last_opening: Mutex<Option<Decimal>> = Mutex::new(None);
    let opening_ref = &last_opening;

    let traded = Retry::spawn(strategy, move || async move {
        let snapshot = match source.snapshot(stock_symbol).await {
            Ok(snapshot) => snapshot,
            Err(why) => {
                logging::warn_file_async(format!(
                    "Failed to fetch realtime quote of {} because {:?}",
                    stock_symbol, why
                ));
                return Err(why);
            }
        };

        if let Some(opening) = snapshot.opening_price {
            if let Ok(mut guard) = opening_ref.lock() {
                *guard = Some(opening);
            }
        }

        snapshot
            .last_price
            .ok_or_else(|| anyhow!("{} has not traded yet", stock_symbol))
    })
    .await;

    match traded {
        Ok(price) => Ok(Quote::Traded(price)),
        Err(why) => {
            let opening = last_opening.lock().ok().and_then(|guard| *guard);
            match opening {
                Some(price) => {
                    logging::warn_file_async(format!(
                        "No trade price of {} after {} attempts ({:?}), use opening price {} instead",
                        stock_symbol, attempts, why, price
                    ));
                    Ok(Quote::Degraded(price))
                }
                None => {
                    logging::error_file_async(format!(
                        "No realtime quote of {} after {} attempts because {:?}",
                        stock_symbol, attempts, why
                    ));
                    Err(KValueError::QuoteUnavailable {
                        stock_symbol: stock_symbol.to_string(),
                        attempts,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;

    use rust_decimal_macros::dec;

    use super::*;

    /// 依序回傳預先排好的結果，用完後一律回傳錯誤
    pub(crate) struct ScriptedRealtime {
        replies: Mutex<VecDeque<Result<Snapshot>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedRealtime {
        pub(crate) fn new(replies: Vec<Result<Snapshot>>) -> Self {
            ScriptedRealtime {
                replies: Mutex::new(replies.into_iter().collect()),
                calls: Mutex::new(0),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl RealtimeSource for ScriptedRealtime {
        async fn snapshot(&self, _stock_symbol: &str) -> Result<Snapshot> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("no more scripted replies")))
        }
    }

    pub(crate) fn fast_policy() -> config::Realtime {
        config::Realtime {
            max_attempts: 3,
            retry_delay_ms: 0,
        }
    }

    fn not_traded(opening: Option<Decimal>) -> Result<Snapshot> {
        Ok(Snapshot {
            last_price: None,
            opening_price: opening,
        })
    }

    #[tokio::test]
    async fn test_traded_on_first_attempt() {
        let source = ScriptedRealtime::new(vec![Ok(Snapshot {
            last_price: Some(dec!(150.35)),
            opening_price: Some(dec!(149.8)),
        })]);

        let quote = fetch_realtime_quote(&source, "0050", &fast_policy())
            .await
            .unwrap();

        assert_eq!(quote, Quote::Traded(dec!(150.35)));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_traded_after_retry() {
        let source = ScriptedRealtime::new(vec![
            not_traded(None),
            Err(anyhow!("connection reset")),
            Ok(Snapshot {
                last_price: Some(dec!(101.5)),
                opening_price: Some(dec!(100)),
            }),
        ]);

        let quote = fetch_realtime_quote(&source, "0050", &fast_policy())
            .await
            .unwrap();

        assert_eq!(quote, Quote::Traded(dec!(101.5)));
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_falls_back_to_opening_price_as_degraded() {
        let source = ScriptedRealtime::new(vec![
            not_traded(Some(dec!(99.0))),
            not_traded(Some(dec!(99.0))),
            not_traded(Some(dec!(99.0))),
        ]);

        let quote = fetch_realtime_quote(&source, "0050", &fast_policy())
            .await
            .unwrap();

        assert_eq!(quote, Quote::Degraded(dec!(99.0)));
        assert!(quote.is_degraded());
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_without_opening_price() {
        let source = ScriptedRealtime::new(vec![
            not_traded(None),
            Err(anyhow!("timeout")),
            not_traded(None),
            not_traded(Some(dec!(1))),
        ]);

        let result = fetch_realtime_quote(&source, "0050", &fast_policy()).await;

        assert!(matches!(
            result,
            Err(KValueError::QuoteUnavailable { attempts: 3, .. })
        ));
        assert_eq!(source.calls(), 3);
    }
}
