//! Optional external security scanner probe.
//!
//! Runs a config-supplied CLI against the target and captures its JSON
//! output. A missing or failing scanner is never fatal.

use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::types::collector::CollectorOutput;
use crate::types::config::SecurityScope;
use crate::types::raw::SecurityScanFacts;

use super::CollectorContext;

const SCAN_TIMEOUT: Duration = Duration::from_secs(60);

/// Run the external scanner, if one is configured and in scope.
pub async fn collect(ctx: &CollectorContext) -> CollectorOutput<SecurityScanFacts> {
    if ctx.config.security_scope == SecurityScope::HeadersOnly {
        return CollectorOutput::err("security scan skipped: headers-only scope");
    }

    let command = match &ctx.config.security_scanner_cmd {
        Some(c) => c.clone(),
        None => return CollectorOutput::err("security scanner not configured"),
    };

    let url = ctx.identity.normalized_url.clone();
    debug!(command = %command, url = %url, "security scan");

    let output = tokio::time::timeout(
        SCAN_TIMEOUT,
        Command::new(&command).arg(&url).output(),
    )
    .await;

    let output = match output {
        Ok(Ok(o)) => o,
        Ok(Err(e)) => return CollectorOutput::err(format!("scanner failed to start: {}", e)),
        Err(_) => {
            return CollectorOutput::err(format!(
                "scanner timed out after {}s",
                SCAN_TIMEOUT.as_secs()
            ))
        }
    };

    if !output.status.success() {
        return CollectorOutput::err(format!("scanner exited with {}", output.status));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed = serde_json::from_str::<serde_json::Value>(&stdout)
        .unwrap_or_else(|_| serde_json::Value::String(stdout.trim().to_string()));

    CollectorOutput::ok(SecurityScanFacts {
        tool: command,
        output: parsed,
    })
}
