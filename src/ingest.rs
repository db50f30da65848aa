//! `repochat ingest <url>`: index one repository into its collection.

use anyhow::{bail, Result};

use repochat_core::ingest::IngestReport;
use repochat_core::store::DuplicatePolicy;
use repochat_core::workflow::{Mode, RunRequest};

use crate::config::{code_only_globs, Config};
use crate::services::build_workflow;

/// Per-run overrides from the command line.
#[derive(Debug, Default, Clone)]
pub struct IngestArgs {
    pub branch: Option<String>,
    /// Restrict the listing to common source-code extensions.
    pub code_only: bool,
    pub replace: bool,
}

fn apply_args(config: &Config, args: &IngestArgs) -> Config {
    let mut config = config.clone();
    if let Some(branch) = &args.branch {
        config.github.branch = branch.clone();
    }
    if args.code_only {
        config.github.include_globs = code_only_globs();
    }
    if args.replace {
        config.store.on_duplicate = DuplicatePolicy::Replace.to_string();
    }
    config
}

pub async fn run_ingest(config: &Config, url: &str, args: &IngestArgs) -> Result<()> {
    let config = apply_args(config, args);
    let workflow = build_workflow(&config).await?;

    let result = workflow
        .run(RunRequest {
            repo_url: url.to_string(),
            mode: Mode::ProcessRepo,
            history: Vec::new(),
        })
        .await;

    match (result.ingest, result.error) {
        (Some(report), None) => {
            print_report(&report);
            Ok(())
        }
        (_, Some(error)) => bail!(error),
        (None, None) => bail!("ingestion produced no report"),
    }
}

fn print_report(report: &IngestReport) {
    println!("ingest {}", report.repo);
    println!("  collection: {}", report.collection);
    println!("  branch: {}", report.branch);
    println!("  files listed: {}", report.files_listed);
    println!("  files indexed: {}", report.files_indexed);
    if report.files_empty > 0 {
        println!("  files empty: {}", report.files_empty);
    }
    println!("  chunks: {}", report.chunks);
    println!("  inserted: {}", report.store.inserted);
    if report.store.replaced > 0 {
        println!("  replaced: {}", report.store.replaced);
    }
    println!("  skipped: {}", report.store.skipped);
    println!("ok");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_args_overrides() {
        let base = Config::default();
        let args = IngestArgs {
            branch: Some("develop".to_string()),
            code_only: true,
            replace: true,
        };
        let config = apply_args(&base, &args);
        assert_eq!(config.github.branch, "develop");
        assert!(config.github.include_globs.contains(&"**/*.py".to_string()));
        assert_eq!(config.duplicate_policy().unwrap(), DuplicatePolicy::Replace);

        let untouched = apply_args(&base, &IngestArgs::default());
        assert_eq!(untouched.github.branch, "main");
        assert!(untouched.github.include_globs.is_empty());
        assert_eq!(untouched.duplicate_policy().unwrap(), DuplicatePolicy::Skip);
    }
}
