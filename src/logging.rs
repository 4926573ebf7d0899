use std::{
    fmt::Write as _,
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use chrono::{format::DelayedFormat, DateTime, Local};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::Level;
use once_cell::sync::Lazy;

/// 日誌檔存放的目錄
const LOG_DIR: &str = "log";
/// 累積到這個長度就寫入檔案
const FLUSH_THRESHOLD: usize = 4096;
/// 等待背景線程寫完的上限
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("kvalue"));

/// 以背景線程寫檔的日誌器，呼叫端只負責把訊息送進通道
pub struct Logger {
    writer: Sender<Command>,
}

enum Command {
    Write(LogMessage),
    /// 寫完目前收到的訊息後回覆
    Flush(Sender<()>),
}

impl Logger {
    pub fn new(log_name: &str) -> Self {
        let (tx, rx) = unbounded::<Command>();

        match Self::get_log_path(log_name) {
            Some(log_path) => {
                // 寫入檔案的操作使用另一個線程處理
                thread::spawn(move || write_loop(log_path, rx));
            }
            None => {
                error_console(format!(
                    "Failed to create log directory, {} logs go to stderr",
                    log_name
                ));
                // stdout 只留給計算結果
                thread::spawn(move || console_loop(rx, io::stderr()));
            }
        }

        Logger { writer: tx }
    }

    pub fn info(&self, log: String) {
        self.send(Level::Info, log);
    }

    pub fn warn(&self, log: String) {
        self.send(Level::Warn, log);
    }

    pub fn error(&self, log: String) {
        self.send(Level::Error, log);
    }

    pub fn debug(&self, log: String) {
        self.send(Level::Debug, log);
    }

    fn send(&self, level: Level, msg: String) {
        if let Err(why) = self.writer.send(Command::Write(LogMessage::new(level, msg))) {
            error_console(why.to_string());
        }
    }

    /// 等背景線程把已送出的訊息寫進檔案，程式結束前呼叫
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = bounded::<()>(1);
        if self.writer.send(Command::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv_timeout(FLUSH_TIMEOUT);
        }
    }

    fn get_log_path(name: &str) -> Option<PathBuf> {
        let path = Path::new(LOG_DIR);

        if !path.exists() {
            fs::create_dir_all(path).ok()?;
        }

        let mut log_path = PathBuf::from(path);
        log_path.push(format!("{}_{}.log", Local::now().format("%Y-%m-%d"), name));

        Some(log_path)
    }
}

fn write_loop(log_path: PathBuf, rx: Receiver<Command>) {
    let file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(why) => {
            error_console(format!(
                "Failed to open log file {}: {}",
                log_path.display(),
                why
            ));
            return;
        }
    };

    let mut writer = BufWriter::new(file);
    let mut buffer = String::with_capacity(FLUSH_THRESHOLD);

    for received in &rx {
        let ack = match received {
            Command::Write(msg) => {
                if writeln!(&mut buffer, "{}", msg.line()).is_err() {
                    continue;
                }
                None
            }
            Command::Flush(ack) => Some(ack),
        };

        if ack.is_some() || rx.is_empty() || buffer.len() >= FLUSH_THRESHOLD {
            if let Err(why) = writer.write_all(buffer.as_bytes()) {
                error_console(format!(
                    "Failed to write to log file. because:{:#?}\r\nmsg:{}",
                    why, buffer
                ));
            }

            if let Err(why) = writer.flush() {
                error_console(format!("Failed to flush log file. because:{:#?}", why));
            }

            buffer.clear();
        }

        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }
}

fn console_loop<W: Write>(rx: Receiver<Command>, mut out: W) {
    for received in &rx {
        match received {
            Command::Write(msg) => {
                let _ = writeln!(out, "{}", msg.line());
            }
            Command::Flush(ack) => {
                let _ = out.flush();
                let _ = ack.send(());
            }
        }
    }
}

pub struct LogMessage {
    pub level: Level,
    pub msg: String,
    pub created_at: DateTime<Local>,
}

impl LogMessage {
    pub fn new(level: Level, msg: String) -> Self {
        LogMessage {
            level,
            msg,
            created_at: Local::now(),
        }
    }

    fn line(&self) -> String {
        format!(
            "{} {} {}",
            self.created_at.format("%F %X%.6f"),
            self.level,
            self.msg
        )
    }
}

pub fn info_file_async(log: String) {
    LOGGER.info(log);
}

pub fn warn_file_async(log: String) {
    LOGGER.warn(log);
}

pub fn error_file_async(log: String) {
    LOGGER.error(log);
}

pub fn debug_file_async(log: String) {
    LOGGER.debug(log);
}

pub fn flush() {
    LOGGER.flush();
}

pub fn warn_console(log: String) {
    eprintln!(
        "{} Warn {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn error_console(log: String) {
    eprintln!(
        "{} Error {}",
        DelayedFormat::to_string(&Local::now().format("%Y-%m-%d %H:%M:%S.%3f")),
        log
    );
}
