use crate::env;
use once_cell::sync::Lazy;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

#[derive(Debug)]
struct Logger {
    level: log::LevelFilter,
    term_level: log::LevelFilter,
    file_level: log::LevelFilter,
    log_file: Option<Mutex<File>>,
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if !record.target().starts_with("promsync") {
            // dependencies only get through at warn and above
            if record.level() > log::Level::Warn {
                return;
            }
        }
        if record.level() <= self.file_level
            && let Some(log_file) = &self.log_file
        {
            let mut log_file = log_file.lock().unwrap_or_else(|e| e.into_inner());
            let out = self.render(record, true);
            let _ = writeln!(log_file, "{}", console::strip_ansi_codes(&out));
        }
        if record.level() <= self.term_level {
            eprintln!("{}", self.render(record, false));
        }
    }

    fn flush(&self) {
        if let Some(log_file) = &self.log_file {
            let _ = log_file.lock().unwrap_or_else(|e| e.into_inner()).flush();
        }
    }
}

static LOGGER: Lazy<Logger> = Lazy::new(Logger::init);

impl Logger {
    fn init() -> Self {
        let term_level = *env::PROMSYNC_LOG;
        let file_level = *env::PROMSYNC_LOG_FILE_LEVEL;
        let log_file = env::PROMSYNC_LOG_FILE.as_ref().and_then(|path| {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                let _ = xx::file::mkdirp(parent);
            }
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(f) => Some(Mutex::new(f)),
                Err(e) => {
                    eprintln!("promsync: could not open log file {}: {e}", path.display());
                    None
                }
            }
        });
        let level = if log_file.is_some() {
            term_level.max(file_level)
        } else {
            term_level
        };
        Logger {
            level,
            term_level,
            file_level,
            log_file,
        }
    }

    fn render(&self, record: &log::Record, to_file: bool) -> String {
        let level = self.styled_level(record.level());
        let args = record.args();
        if to_file {
            let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            format!("{ts} {level} {args}")
        } else if *env::PROMSYNC_LOG >= log::LevelFilter::Debug {
            let ts = chrono::Local::now().format("%H:%M:%S%.3f");
            let ts = console::style(ts).dim();
            format!("{ts} {level} {args}")
        } else {
            format!("{} {level} {args}", console::style("promsync").magenta())
        }
    }

    fn styled_level(&self, level: log::Level) -> String {
        let name = format!("{:<5}", level.to_string());
        match level {
            log::Level::Error => console::style(name).red().bold().to_string(),
            log::Level::Warn => console::style(name).yellow().to_string(),
            log::Level::Info => console::style(name).cyan().to_string(),
            log::Level::Debug => console::style(name).blue().dim().to_string(),
            log::Level::Trace => console::style(name).dim().to_string(),
        }
    }
}

pub fn init() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        if let Err(err) = log::set_logger(&*LOGGER).map(|()| log::set_max_level(LOGGER.level)) {
            eprintln!("promsync: could not initialize logger: {err}");
        }
    });
}
