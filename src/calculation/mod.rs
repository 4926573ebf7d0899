/// 串接月成交資訊並補上今日盤中資料
pub mod series;
/// 隨機指標 K 值
pub mod stochastic;
