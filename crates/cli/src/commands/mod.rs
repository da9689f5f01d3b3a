//! CLI subcommand implementations

pub mod agent;
pub mod baseline;
pub mod chart;
pub mod health;
pub mod samples;
pub mod simulate;
pub mod submit;

/// Resolves on Ctrl-C; never resolves if the signal cannot be watched
pub async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        crate::output::print_warning("Ctrl-C handling unavailable");
        std::future::pending::<()>().await;
    }
}
