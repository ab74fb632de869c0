use env_logger::{Builder, Env};

/// Logs go to stderr so `run --json` output stays machine readable.
/// `POSECOACH_LOG` takes the usual env_logger filter syntax.
pub fn init() {
    let env = Env::default()
        .filter_or("POSECOACH_LOG", "info")
        .write_style("POSECOACH_LOG_STYLE");
    Builder::from_env(env).format_timestamp_millis().init();
}
