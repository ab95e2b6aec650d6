use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::Dispatch;
use log::LevelFilter;
use std::path::Path;

/// Level from `--debug`, else `RUST_LOG`, else `info`
pub fn level_filter(debug: bool) -> LevelFilter {
    if debug {
        return LevelFilter::Debug;
    }
    std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Install the global logger: colored lines on stderr, plus plain lines in
/// `log_file` when given.
///
/// Call once, at the start of `main`.
pub fn init(debug: bool, log_file: Option<&Path>) -> Result<(), fern::InitError> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::BrightBlack);

    let console = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr());

    let mut dispatch = Dispatch::new()
        .level(level_filter(debug))
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("rustls", LevelFilter::Warn)
        .chain(console);

    if let Some(path) = log_file {
        let file = Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "[{} {} {}] {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.target(),
                    message
                ))
            })
            .chain(fern::log_file(path)?);
        dispatch = dispatch.chain(file);
    }

    dispatch.apply()?;
    log::debug!("logger initialized at {}", level_filter(debug));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flag_wins() {
        assert_eq!(level_filter(true), LevelFilter::Debug);
    }
}
