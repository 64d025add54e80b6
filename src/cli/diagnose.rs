//! `kdiag diagnose`

use super::{DiagnoseArgs, OutputFormat};
use crate::settings::{load_config, AppConfig};
use anyhow::{Context, Result};
use kdiag_core::{DiagnosisConfig, DiagnosisResult, Orchestrator};
use kdiag_tools::ShellExecutor;
use serde_json::Value;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run(args: DiagnoseArgs) -> Result<()> {
    let app = load_config()?;
    let metadata = read_metadata(&args.metadata)?;
    let config = apply_overrides(app.diagnosis.clone(), &args);
    let orchestrator = build_orchestrator(&app, config, args.no_llm)?;

    let result = orchestrator.diagnose(&metadata).await;
    if result.is_degraded() {
        warn!(termination = %result.termination, "Diagnosis ended early");
    }

    match args.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize result")?
        ),
        OutputFormat::Text => println!("{}", render_text(&result)),
    }
    Ok(())
}

fn read_metadata(path: &Path) -> Result<Value> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read metadata from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&raw).context("Metadata is not valid JSON")
}

fn apply_overrides(mut config: DiagnosisConfig, args: &DiagnoseArgs) -> DiagnosisConfig {
    if let Some(max) = args.max_iterations {
        config = config.with_max_iterations(max);
    }
    if let Some(threshold) = args.threshold {
        config = config.with_confidence_threshold(threshold);
    }
    config
}

fn build_orchestrator(app: &AppConfig, config: DiagnosisConfig, no_llm: bool) -> Result<Orchestrator> {
    let executor = Arc::new(ShellExecutor::new(app.executor.to_executor_config()));
    let orchestrator = Orchestrator::new(executor, config);

    if no_llm {
        return Ok(orchestrator);
    }
    match app.llm.provider()? {
        Some(provider) => {
            info!(model = %app.llm.model, "Using LLM provider for the diagnosis text");
            Ok(orchestrator.with_llm(Arc::new(provider)))
        }
        None => {
            info!("No LLM provider configured, using templates");
            Ok(orchestrator)
        }
    }
}

fn render_text(result: &DiagnosisResult) -> String {
    let mut out = vec![
        result.diagnosis.clone(),
        String::new(),
        format!(
            "Best hypothesis: {} ({:.1}/10.0)",
            result.best_hypothesis.category, result.confidence_score
        ),
        format!("Termination: {}", result.termination),
        format!(
            "Commands executed: {} in {:.1}s",
            result.total_commands_executed, result.total_elapsed_secs
        ),
        String::new(),
        "Recommendations:".to_string(),
    ];
    out.extend(
        result
            .recommendations
            .iter()
            .enumerate()
            .map(|(i, rec)| format!("{}. {}", i + 1, rec)),
    );
    out.push(String::new());
    out.push(result.iteration_summary());
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> DiagnoseArgs {
        DiagnoseArgs {
            metadata: PathBuf::from("-"),
            format: OutputFormat::Text,
            max_iterations: Some(5),
            threshold: None,
            no_llm: true,
        }
    }

    #[test]
    fn test_overrides_apply_only_when_given() {
        let config = apply_overrides(DiagnosisConfig::default(), &args());
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.confidence_threshold, 8.0);
    }

    #[test]
    fn test_read_metadata_rejects_invalid_json() {
        let path = std::env::temp_dir().join(format!("kdiag-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{not json").unwrap();
        let err = read_metadata(&path).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_render_text_includes_recommendations() {
        let executor = Arc::new(ShellExecutor::default());
        let orchestrator = Orchestrator::new(executor, DiagnosisConfig::default());
        let result = orchestrator.diagnose(&serde_json::json!({})).await;

        let text = render_text(&result);
        assert!(text.starts_with("No viable hypotheses generated from metadata"));
        assert!(text.contains("Termination: no_hypotheses"));
        assert!(text.contains("1. Review pod configuration manually"));
        assert!(text.ends_with("No iterations completed"));
    }
}
