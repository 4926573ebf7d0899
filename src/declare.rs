use rust_decimal::Decimal;

/// 一日的價格資料，日期沿用證交所的民國紀年字串（例︰113/04/11）
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: String,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
}

impl Bar {
    pub fn new(date: impl Into<String>, high: Decimal, low: Decimal, close: Decimal) -> Self {
        Bar {
            date: date.into(),
            high: Some(high),
            low: Some(low),
            close: Some(close),
        }
    }

    /// 用盤中的單一報價組出當日資料，最高、最低與收盤都是同一個價格
    pub fn synthetic(date: impl Into<String>, price: Decimal) -> Self {
        Bar::new(date, price, price, price)
    }
}

/// 盤中報價
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    /// 最近一筆成交價
    Traded(Decimal),
    /// 重試後仍沒有成交價，改用開盤價替代
    Degraded(Decimal),
}

impl Quote {
    pub fn price(&self) -> Decimal {
        match *self {
            Quote::Traded(p) | Quote::Degraded(p) => p,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Quote::Degraded(_))
    }
}
