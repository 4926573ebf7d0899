//! 隨機指標（KD）中的 K 值。
//!
//! 計算分三段︰
//! 1. 以單調佇列求出回看區間內的最高價與最低價；
//! 2. RSV = (收盤 - 區間最低) / (區間最高 - 區間最低) * 100；
//! 3. K = α * RSV + (1 - α) * 前一個 K，以第一個有值的 RSV 當作起始值。
//!
//! 任何沒有定義的值一律以 `None` 表示，不會出現除以零或 NaN。

use std::collections::VecDeque;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use crate::declare::Bar;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StochasticError {
    #[error("invalid period {period}: must be at least 1")]
    InvalidPeriod { period: usize },

    #[error("invalid alpha {alpha}: must be greater than 0 and at most 1")]
    InvalidAlpha { alpha: Decimal },
}

/// 單一交易日的原始價格與衍生的指標值
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub date: String,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    /// 回看區間內的最高價
    pub rolling_high: Option<Decimal>,
    /// 回看區間內的最低價
    pub rolling_low: Option<Decimal>,
    pub rsv: Option<Decimal>,
    pub k: Option<Decimal>,
}

/// 計算整個序列的 K 值，輸出筆數與輸入相同。
pub fn calculate_k_values(
    series: &[Bar],
    period: usize,
    alpha: Decimal,
) -> Result<Vec<IndicatorRow>, StochasticError> {
    validate(period, alpha)?;

    let highs: Vec<Option<Decimal>> = series.iter().map(|b| b.high).collect();
    let lows: Vec<Option<Decimal>> = series.iter().map(|b| b.low).collect();
    let rolling_high = rolling_max(&highs, period);
    let rolling_low = rolling_min(&lows, period);
    let rsv: Vec<Option<Decimal>> = series
        .iter()
        .zip(rolling_low.iter().zip(rolling_high.iter()))
        .map(|(bar, (low, high))| raw_stochastic_value(bar.close, *low, *high))
        .collect();
    let k = smooth(&rsv, alpha);

    Ok(series
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorRow {
            date: bar.date.clone(),
            high: bar.high,
            low: bar.low,
            close: bar.close,
            rolling_high: rolling_high[i],
            rolling_low: rolling_low[i],
            rsv: rsv[i],
            k: k[i],
        })
        .collect())
}

/// 回看天數至少 1，平滑係數落在 (0, 1]
pub fn validate(period: usize, alpha: Decimal) -> Result<(), StochasticError> {
    if period == 0 {
        return Err(StochasticError::InvalidPeriod { period });
    }

    if alpha <= Decimal::ZERO || alpha > Decimal::ONE {
        return Err(StochasticError::InvalidAlpha { alpha });
    }

    Ok(())
}

/// 區間最高值；區間未滿或區間內有缺值時為 `None`
pub fn rolling_max(values: &[Option<Decimal>], period: usize) -> Vec<Option<Decimal>> {
    rolling_extreme(values, period, |incoming, kept| incoming >= kept)
}

/// 區間最低值；區間未滿或區間內有缺值時為 `None`
pub fn rolling_min(values: &[Option<Decimal>], period: usize) -> Vec<Option<Decimal>> {
    rolling_extreme(values, period, |incoming, kept| incoming <= kept)
}

/// 單調佇列︰佇列前端永遠是區間內的極值，每個元素最多進出一次。
///
/// `dominates(incoming, kept)` 為 true 時，`kept` 不可能再成為極值，直接移除。
fn rolling_extreme(
    values: &[Option<Decimal>],
    period: usize,
    dominates: impl Fn(Decimal, Decimal) -> bool,
) -> Vec<Option<Decimal>> {
    let mut result = Vec::with_capacity(values.len());
    if period == 0 {
        result.resize(values.len(), None);
        return result;
    }

    let mut window: VecDeque<(usize, Decimal)> = VecDeque::with_capacity(period);
    let mut last_missing: Option<usize> = None;

    for (i, value) in values.iter().enumerate() {
        while let Some(&(front, _)) = window.front() {
            if front + period <= i {
                window.pop_front();
            } else {
                break;
            }
        }

        match *value {
            Some(v) => {
                while let Some(&(_, back)) = window.back() {
                    if dominates(v, back) {
                        window.pop_back();
                    } else {
                        break;
                    }
                }
                window.push_back((i, v));
            }
            None => last_missing = Some(i),
        }

        let full = i + 1 >= period;
        let complete = last_missing.map_or(true, |m| m + period <= i);
        if full && complete {
            result.push(window.front().map(|&(_, v)| v));
        } else {
            result.push(None);
        }
    }

    result
}

/// RSV；高低價相同（區間沒有波動）時沒有定義
pub fn raw_stochastic_value(
    close: Option<Decimal>,
    low: Option<Decimal>,
    high: Option<Decimal>,
) -> Option<Decimal> {
    let (close, low, high) = (close?, low?, high?);
    let range = high - low;
    if range <= Decimal::ZERO {
        return None;
    }

    (close - low).checked_div(range).map(|r| r * dec!(100))
}

/// 指數平滑。
///
/// 第一個有值的 RSV 直接當作 K；之後遇到沒有值的 RSV，該位置的 K 也是 `None`，
/// 下一個有值的 RSV 則接續最後一個 K 繼續遞推。
pub fn smooth(rsv: &[Option<Decimal>], alpha: Decimal) -> Vec<Option<Decimal>> {
    let keep = Decimal::ONE - alpha;
    let mut previous: Option<Decimal> = None;

    rsv.iter()
        .map(|value| {
            let v = (*value)?;
            let k = match previous {
                Some(p) => alpha * v + keep * p,
                None => v,
            };
            previous = Some(k);
            Some(k)
        })
        .collect()
}
