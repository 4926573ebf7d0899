//! K 值計算流程中會讓整次執行中止的錯誤。

use thiserror::Error;

use crate::calculation::stochastic::StochasticError;

#[derive(Debug, Error)]
pub enum KValueError {
    /// 月成交資訊抓取失敗（證交所回傳非 OK、網路或解析錯誤）
    #[error("failed to fetch {stock_symbol} history of {month}: {reason}")]
    History {
        stock_symbol: String,
        /// 查詢的月份，格式 YYYYMM
        month: String,
        reason: String,
    },

    /// 重試後沒有成交價也沒有開盤價可以替代
    #[error("no realtime quote for {stock_symbol} after {attempts} attempts")]
    QuoteUnavailable { stock_symbol: String, attempts: usize },

    #[error(transparent)]
    Indicator(#[from] StochasticError),
}
