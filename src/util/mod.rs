/// 日期與民國紀年
pub mod datetime;
/// HTTP 請求
pub mod http;
/// 文字與數字轉換
pub mod text;
