//! Command execution

use aarambh_status::{AiEndpoint, AiRequest, Clock, ReqwestTransport, SystemClock};
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;

use super::{render_status, Cli, Commands, ExitCode};
use crate::handler::{create_router, AppState};

/// Execute a parsed command line
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let transport = Arc::new(ReqwestTransport::new()?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());

    match cli.command {
        Commands::Check { config, format } => {
            let config = config.resolve()?;
            let monitor = config.build_monitor(transport, clock);

            let data = monitor.check_health().await;
            println!("{}", render_status(&data, format));

            Ok(ExitCode::from_status(data.status))
        }

        Commands::Watch {
            config,
            interval,
            format,
        } => {
            let mut config = config.resolve()?;
            if let Some(secs) = interval {
                config.poll_interval_secs = secs.max(1);
            }
            let service = config.build_service(transport, clock);

            let _subscription = service.subscribe(move |data| {
                if data.status.is_settled() {
                    println!("{}", render_status(data, format));
                }
            });
            service.start();

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            service.stop();

            Ok(ExitCode::from_status(service.current().status))
        }

        Commands::Serve { config, port, host } => {
            let config = config.resolve()?;
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .with_context(|| format!("Invalid bind address {}:{}", host, port))?;

            let service = Arc::new(config.build_service(transport, clock));
            let state = Arc::new(AppState::new(Arc::clone(&service))?);
            let router = create_router(state);

            tracing::info!("Starting AI Status Monitor on {}", addr);
            tracing::info!(
                "Agent ID: {}, Version: {}, probes: {:?}",
                crate::AGENT_ID,
                crate::AGENT_VERSION,
                service.monitor().probe_ids()
            );
            service.start();

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;

            service.stop();
            Ok(ExitCode::Success)
        }

        Commands::Ask {
            config,
            endpoint,
            prompt,
            agent_type,
        } => {
            let config = config.resolve()?;
            let ai = config.build_ai_client(transport, clock);

            let mut request = AiRequest::new(prompt);
            if let Some(agent_type) = agent_type {
                request = request.with_agent_type(agent_type);
            }

            let response = ai.request(AiEndpoint::from_name(&endpoint), request).await?;

            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(ExitCode::Success)
        }
    }
}
