use anyhow::Context;
use kanban_core::config::Config;
use std::path::Path;

pub fn run(root: &Path, port: Option<u16>, open: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let port = port.unwrap_or(config.server.port);

    let rt = tokio::runtime::Runtime::new()?;
    let root_buf = root.to_path_buf();

    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
            .await
            .with_context(|| format!("failed to bind port {port}"))?;
        let actual_port = listener.local_addr()?.port();
        println!(
            "Kanban API for {} -> http://localhost:{actual_port}  (PID {})",
            root_buf.display(),
            std::process::id()
        );

        tokio::select! {
            res = kanban_server::serve_on(&root_buf, listener, open) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
