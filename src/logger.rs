use crate::cmd_args::{Args, LogFormat};
use crate::errors::Error;
use log::LevelFilter;
use std::process;
use syslog::{BasicLogger, Facility, Formatter3164};
use tracing_subscriber::EnvFilter;

pub fn init(args: &Args, syslog_name: Option<String>) -> Result<(), Error> {
    match syslog_name {
        Some(process_name) => {
            let formatter = Formatter3164 {
                facility: Facility::LOG_USER,
                hostname: None,
                process: process_name,
                pid: process::id(),
            };
            let syslog_logger = syslog::unix(formatter)
                .map_err(|err| Error::BadConfig(format!("Could not connect to syslog: {err}")))?;
            // max level in syslog mode is INFO (performance penalty for DEBUG).
            log::set_boxed_logger(Box::new(BasicLogger::new(syslog_logger)))
                .map(|()| log::set_max_level(LevelFilter::Info))
                .map_err(|err| Error::BadConfig(format!("Could not install logger: {err}")))
        }
        None => {
            // Start from RUST_LOG, then let the command line level (default: "info") win.
            let filter = EnvFilter::from_default_env().add_directive(args.log_level.into());

            let trace_sub = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(!args.no_color);

            match args.log_format {
                LogFormat::Structured => trace_sub.json().init(),
                LogFormat::Debug => trace_sub.pretty().init(),
                _ => trace_sub.init(),
            };
            Ok(())
        }
    }
}
