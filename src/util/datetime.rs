use chrono::{DateTime, Datelike, FixedOffset, Months, NaiveDate, Offset, Utc};

/// 民國紀年與西元紀年的差距
const ROC_YEAR_OFFSET: i32 = 1911;
/// 台灣時區 UTC+8
const TAIPEI_OFFSET_SECS: i32 = 8 * 3600;

/// 提供「現在」的來源，讓計算流程不直接依賴系統時鐘
pub trait Clock {
    fn now(&self) -> DateTime<FixedOffset>;

    /// 台灣時間的今天
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// 以系統時間換算成台灣時間
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&taipei_offset())
    }
}

/// 固定時間，測試時使用
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

#[cfg(test)]
impl FixedClock {
    /// 以台灣時間當天 13:30 建立
    pub fn on(date: NaiveDate) -> Option<Self> {
        date.and_hms_opt(13, 30, 0)
            .and_then(|naive| naive.and_local_timezone(taipei_offset()).single())
            .map(FixedClock)
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

fn taipei_offset() -> FixedOffset {
    FixedOffset::east_opt(TAIPEI_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Convert ROC year to Gregorian year.
pub fn to_gregorian_year(year: i32) -> i32 {
    year + ROC_YEAR_OFFSET
}

/// Convert Gregorian year to ROC year.
pub fn to_roc_year(year: i32) -> i32 {
    year - ROC_YEAR_OFFSET
}

/// 轉成證交所日成交資訊使用的日期字串，例︰2024-04-11 => "113/04/11"
pub fn to_taiwan_date_label(date: NaiveDate) -> String {
    format!(
        "{}/{:02}/{:02}",
        to_roc_year(date.year()),
        date.month(),
        date.day()
    )
}

/// Parse a date string in the format of ROC calendar
/// and return it as a NaiveDate in the Gregorian calendar.
pub fn parse_taiwan_date(date_str: &str) -> Option<NaiveDate> {
    let split_date: Vec<&str> = date_str.trim().split(['/', '-']).collect();
    if split_date.len() != 3 {
        return None;
    }

    let year = to_gregorian_year(parse_date_part::<i32>(split_date[0])?);
    let month = parse_date_part::<u32>(split_date[1])?;
    let day = parse_date_part::<u32>(split_date[2])?;

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Try to parse a string as a date part and return it as an Option.
fn parse_date_part<T: std::str::FromStr>(date_part_str: &str) -> Option<T> {
    date_part_str.parse::<T>().ok()
}

/// 該月的第一天
pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// 上個月的第一天
pub fn first_day_of_previous_month(date: NaiveDate) -> NaiveDate {
    let first = first_day_of_month(date);
    first.checked_sub_months(Months::new(1)).unwrap_or(first)
}
