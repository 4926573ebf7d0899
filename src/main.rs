pub mod calculation;
pub mod config;
pub mod crawler;
pub mod declare;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod presenter;
pub mod util;

use crate::{crawler::twse::Twse, util::datetime::SystemClock};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let settings = &*config::SETTINGS;
    util::http::init(&settings.http)?;

    logging::info_file_async(format!(
        "Start {} period={} alpha={} mode={}",
        settings.stock.symbol, settings.stock.period, settings.stock.alpha, settings.output.mode
    ));

    let result = match pipeline::run(settings, &Twse, &Twse, &SystemClock).await {
        Ok(report) => presenter::present(&report, &settings.output),
        Err(why) => {
            logging::error_file_async(format!("Failed to calculate K values because {:?}", why));
            Err(why.into())
        }
    };

    util::http::flush_log();
    logging::flush();

    result
}
