use std::{fmt::Write as _, fs, path::Path};

use anyhow::{Context, Result};
use rust_decimal::{prelude::ToPrimitive, Decimal};

use crate::{
    calculation::stochastic::IndicatorRow,
    config::{Output, OutputMode},
    declare::Quote,
    logging,
    pipeline::Report,
};

/// 圖表每一列可用的字元數
const CHART_WIDTH: usize = 50;
/// K 值面板的參考線
const K_REFERENCE_LINES: [i64; 2] = [20, 80];

/// 依設定輸出最新 K 值或圖表
pub fn present(report: &Report, output: &Output) -> Result<()> {
    if let Some(quote) = report.quote.filter(Quote::is_degraded) {
        logging::warn_console(format!(
            "{} 今日尚無成交價，最後一筆以開盤價 {} 替代",
            report.stock_symbol,
            quote.price()
        ));
    }

    match output.mode {
        OutputMode::Latest => {
            println!("{}", format_latest(report));
        }
        OutputMode::Chart => {
            let chart = render_chart(report);
            print!("{}", chart);

            let chart_path = output.chart_path.trim();
            if !chart_path.is_empty() {
                write_chart(Path::new(chart_path), &chart)?;
            }
        }
    }

    Ok(())
}

/// 最後一筆的 K 值，四捨五入到小數第二位；沒有定義時為 `NaN`
pub fn format_latest(report: &Report) -> String {
    match report.latest().and_then(|row| row.k) {
        Some(k) => format!("{:.2}", k.round_dp(2)),
        None => "NaN".to_string(),
    }
}

/// 上下兩個共用日期軸的文字面板︰價格區間與 K 值
pub fn render_chart(report: &Report) -> String {
    let mut chart = String::new();

    let price_scale = Scale::of_prices(&report.rows);
    let range = price_scale
        .map(|s| format!(" ({:.2} ~ {:.2})", s.min.round_dp(2), s.max.round_dp(2)))
        .unwrap_or_default();
    let _ = writeln!(chart, "{} 價格區間{}", report.stock_symbol, range);
    for row in &report.rows {
        let cells = match price_scale {
            Some(scale) => price_cells(row, scale),
            None => blank_cells(),
        };
        push_line(&mut chart, &row.date, &cells, &price_label(row.close));
    }
    if report.quote.is_some_and(|q| q.is_degraded()) {
        let _ = writeln!(chart, "最後一筆為開盤價替代");
    }

    let _ = writeln!(chart);
    let _ = writeln!(
        chart,
        "{} K 值 (參考線 {} / {})",
        report.stock_symbol, K_REFERENCE_LINES[0], K_REFERENCE_LINES[1]
    );
    let k_scale = Scale {
        min: Decimal::ZERO,
        max: Decimal::ONE_HUNDRED,
    };
    for row in &report.rows {
        let mut cells = blank_cells();
        for line in K_REFERENCE_LINES {
            cells[k_scale.column(Decimal::from(line))] = ':';
        }
        if let Some(k) = row.k {
            cells[k_scale.column(k)] = '*';
        }
        let label = row
            .k
            .map(|k| format!("{:.2}", k.round_dp(2)))
            .unwrap_or_default();
        push_line(&mut chart, &row.date, &cells, &label);
    }

    chart
}

fn write_chart(path: &Path, chart: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    fs::write(path, chart).with_context(|| format!("Failed to write chart to {}", path.display()))?;
    logging::info_file_async(format!("Chart written to {}", path.display()));

    Ok(())
}

/// 把數值換算成面板上的欄位
#[derive(Debug, Clone, Copy)]
struct Scale {
    min: Decimal,
    max: Decimal,
}

impl Scale {
    /// 以所有有值的最低價與最高價作為價格面板的上下限
    fn of_prices(rows: &[IndicatorRow]) -> Option<Self> {
        let values = rows
            .iter()
            .flat_map(|row| [row.low, row.high, row.close])
            .flatten();

        values.fold(None, |scale: Option<Scale>, v| {
            Some(match scale {
                Some(s) => Scale {
                    min: s.min.min(v),
                    max: s.max.max(v),
                },
                None => Scale { min: v, max: v },
            })
        })
    }

    fn column(&self, value: Decimal) -> usize {
        let last = CHART_WIDTH - 1;
        if self.max <= self.min {
            return last / 2;
        }

        let clamped = value.max(self.min).min(self.max);
        let ratio = (clamped - self.min) / (self.max - self.min);
        (ratio * Decimal::from(last))
            .round()
            .to_usize()
            .unwrap_or(0)
            .min(last)
    }
}

fn blank_cells() -> Vec<char> {
    vec![' '; CHART_WIDTH]
}

/// 最低到最高畫成 `-`，收盤價畫成 `o`
fn price_cells(row: &IndicatorRow, scale: Scale) -> Vec<char> {
    let mut cells = blank_cells();

    if let (Some(low), Some(high)) = (row.low, row.high) {
        let (from, to) = (scale.column(low), scale.column(high));
        for cell in &mut cells[from.min(to)..=from.max(to)] {
            *cell = '-';
        }
    }

    if let Some(close) = row.close {
        cells[scale.column(close)] = 'o';
    }

    cells
}

fn price_label(close: Option<Decimal>) -> String {
    close
        .map(|c| format!("{:.2}", c.round_dp(2)))
        .unwrap_or_else(|| "--".to_string())
}

fn push_line(chart: &mut String, date: &str, cells: &[char], label: &str) {
    let body: String = cells.iter().collect();
    let line = format!("{} |{}| {}", date, body, label);
    let _ = writeln!(chart, "{}", line.trim_end());
}
