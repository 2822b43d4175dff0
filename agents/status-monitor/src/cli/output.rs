//! Status rendering for terminal output

use aarambh_status::{HealthData, HealthStatus};
use clap::ValueEnum;
use colored::Colorize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable
    Text,
    /// One JSON object per status
    Json,
}

/// Render a status for the terminal
pub fn render_status(data: &HealthData, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string(data).unwrap_or_else(|e| {
            format!("{{\"status\":\"{}\",\"error\":\"{}\"}}", data.status, e)
        }),
        OutputFormat::Text => render_text(data),
    }
}

fn render_text(data: &HealthData) -> String {
    let status = match data.status {
        HealthStatus::Healthy => data.status.as_str().green().bold(),
        HealthStatus::Degraded => data.status.as_str().yellow().bold(),
        HealthStatus::Unhealthy => data.status.as_str().red().bold(),
        HealthStatus::Checking | HealthStatus::Unknown => data.status.as_str().dimmed(),
    };

    let mut out = format!("AI status: {} ({}ms)", status, data.response_time_ms);

    if let Some(server) = &data.server {
        out.push_str(&format!(" via {}", server));
    }
    for (service, available) in &data.services {
        let mark = if *available { "up".green() } else { "down".red() };
        out.push_str(&format!("\n  {:<16} {}", service, mark));
    }
    if let Some(error) = &data.error {
        out.push_str(&format!("\n  error: {}", error));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_text() {
        colored::control::set_override(false);

        let mut data = HealthData::unhealthy(
            "AI services unavailable (a: Request timed out after 500ms)",
            Default::default(),
        );
        data.services.insert("gemini".to_string(), false);

        let text = render_status(&data, OutputFormat::Text);
        assert!(text.starts_with("AI status: unhealthy (0ms)"));
        assert!(text.contains("gemini"));
        assert!(text.contains("down"));
        assert!(text.contains("error: AI services unavailable"));
    }

    #[test]
    fn test_render_json() {
        let data = HealthData::unknown();
        let json: serde_json::Value =
            serde_json::from_str(&render_status(&data, OutputFormat::Json)).unwrap();
        assert_eq!(json["status"], "unknown");
    }
}
