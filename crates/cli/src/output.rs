//! Rendering of orchestrator events and results.

use linkscout_core::{
    DownloadOutcome, OrchestratorEvent, ResolutionResult, ResourceItem, SniffFailure,
};

/// One human-readable line per event, `None` for events only shown in
/// logs.
pub fn render_event(event: &OrchestratorEvent) -> Option<String> {
    match event {
        OrchestratorEvent::Log { .. } => None,
        OrchestratorEvent::Progress { item, percent, .. } => {
            Some(format!("[{:>3}%] {}", percent, item))
        }
        OrchestratorEvent::Warning { message } => Some(format!("warning: {}", message)),
        OrchestratorEvent::SniffFinished { url, result, .. } => Some(render_resolution(url, result)),
        OrchestratorEvent::DownloadFinished { item, outcome, .. } => Some(match outcome {
            DownloadOutcome::Completed { path: Some(path), .. } => {
                format!("done: {} -> {}", item, path.display())
            }
            DownloadOutcome::Completed { path: None, .. } => format!("done: {}", item),
            DownloadOutcome::Failed { error } => format!("failed: {}: {}", item, error),
            DownloadOutcome::Cancelled => format!("cancelled: {}", item),
        }),
        OrchestratorEvent::QueueFinished { summary, .. } => Some(format!(
            "{} completed, {} failed, {} cancelled, {} skipped",
            summary.completed, summary.failed, summary.cancelled, summary.skipped
        )),
    }
}

pub fn render_resolution(url: &str, result: &ResolutionResult) -> String {
    match (&result.error, result.engine_used) {
        (Some(error), _) => format!("{}: {}", url, describe_failure(error)),
        (None, engine) => {
            let mut out = format!(
                "{} ({} items via {})",
                result.title.as_deref().unwrap_or(url),
                result.items.len(),
                engine.map(|e| e.as_str()).unwrap_or("unknown"),
            );
            for (index, item) in result.items.iter().enumerate() {
                out.push('\n');
                out.push_str(&render_item(index, item));
            }
            out
        }
    }
}

fn describe_failure(error: &SniffFailure) -> String {
    match error {
        SniffFailure::NoStrategy => "no strategy applies to this URL".to_string(),
        other => other.to_string(),
    }
}

pub fn render_item(index: usize, item: &ResourceItem) -> String {
    let mut line = format!("  [{}] {:<8} {}", index, item.category.as_str(), item.label());
    if let Some(size) = item.size {
        line.push_str(&format!(" ({})", human_size(size)));
    }
    if let Some(note) = &item.note {
        line.push_str(&format!(" - {}", note));
    }
    line
}

pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
