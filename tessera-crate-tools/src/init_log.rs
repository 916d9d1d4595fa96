use std::io::Write;

use anstyle::{AnsiColor, Color, RgbColor, Style};

/// 日志格式：
///
/// ```text
/// [2024/01/01 12:00:00] INFO: message
///      tessera_gfx::foundation::device @ device.rs:42
/// ```
///
/// 默认过滤级别为 `info`，可以通过 `RUST_LOG` 环境变量覆盖。
/// 重复调用不会 panic（使用 `try_init`）。
pub fn init_log() {
    let _ = build_logger(false).try_init();
}

/// 测试用的日志初始化
///
/// 日志输出会被 test harness 捕获，只在失败的测试中显示
pub fn init_test_log() {
    let _ = build_logger(true).try_init();
}

fn level_style(level: log::Level) -> Style {
    let color = match level {
        log::Level::Error => AnsiColor::Red,
        log::Level::Warn => AnsiColor::Yellow,
        log::Level::Info => AnsiColor::Green,
        log::Level::Debug => AnsiColor::Cyan,
        log::Level::Trace => AnsiColor::Magenta,
    };
    Style::new().fg_color(Some(Color::Ansi(color)))
}

fn build_logger(is_test: bool) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .is_test(is_test)
        .filter_level(log::LevelFilter::Info)
        // RUST_LOG 优先级更高，放在默认 filter 之后解析
        .parse_default_env()
        .format(|buf, record| {
            let level_style = level_style(record.level());
            let location_style = Style::new().fg_color(Some(Color::Rgb(RgbColor(110, 110, 110))));

            // windows 下的路径分隔符是 '\\'
            let file = record.file().unwrap_or("").rsplit(['/', '\\']).next().unwrap_or("");
            let line = record.line().unwrap_or(0);
            let module = record.module_path().unwrap_or("");
            let time = chrono::Local::now().format("%Y/%m/%d %H:%M:%S");
            let level = record.level();

            writeln!(
                buf,
                "{level_style}[{time}] {level}: {}{level_style:#}\n\t {location_style}{module} @ {file}:{line}{location_style:#}",
                record.args()
            )
        });
    builder
}
