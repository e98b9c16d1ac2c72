//! Ambient process helpers shared by the `rest` binary: tracing bootstrap and
//! a build-version string for the `--version`/`/healthz` surfaces.

/// Installs a `tracing-subscriber` `fmt` layer whose verbosity is controlled
/// by `RUST_LOG` (defaulting to `info`), matching the teacher's logging setup
/// minus the OpenTelemetry/Jaeger exporter, which has no counterpart here —
/// this is a single-process service with no distributed trace to join.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Build version string, baked in at compile time from the git describe output.
pub const VERSION: &str = git_version::git_version!(fallback = "unknown");
