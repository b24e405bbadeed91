use serde::Serialize;
use weave_kernel::{
    BatchReport, DEFAULT_CONFIG_PATH, FactSource, MixinConfiguration, ResolverConfig,
    TargetDescriptor, TargetOutcome, TypeRef,
};
use weave_store::JsonlFactSource;

/// Input failures (unreadable facts, bad config) exit with this code;
/// rejected targets exit with 1.
pub const INPUT_ERROR_EXIT: i32 = 2;

pub fn load_config_or_exit(config: Option<&str>) -> ResolverConfig {
    let loaded = match config {
        Some(path) => ResolverConfig::load(path),
        None => ResolverConfig::load_or_default(DEFAULT_CONFIG_PATH),
    };
    loaded.unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(INPUT_ERROR_EXIT);
    })
}

pub fn load_facts_or_exit(facts: &str) -> MixinConfiguration {
    let source = JsonlFactSource::new(facts);
    if !source.path().exists() {
        eprintln!("error: facts file not found: {}", source.path().display());
        std::process::exit(INPUT_ERROR_EXIT);
    }
    source.load().unwrap_or_else(|e| {
        eprintln!("error: failed to load {}: {e}", source.path().display());
        std::process::exit(INPUT_ERROR_EXIT);
    })
}

pub fn parse_target_or_exit(target: &str) -> TargetDescriptor {
    TypeRef::parse(target)
        .map(TargetDescriptor::new)
        .unwrap_or_else(|e| {
            eprintln!("error: invalid target {target:?}: {e}");
            std::process::exit(INPUT_ERROR_EXIT);
        })
}

pub fn print_json_or_exit(value: &impl Serialize) {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("error: failed to render json output: {e}");
        std::process::exit(2);
    });
    println!("{rendered}");
}

/// One line per target, then its errors or warnings indented below it.
pub fn print_batch_report(label: &str, report: &BatchReport) {
    println!(
        "[{label}] {} (targets={}, resolved={}, rejected={}, deferred={}, warnings={})",
        if report.accepted() { "OK" } else { "FAIL" },
        report.summary.target_count,
        report.summary.resolved_count,
        report.summary.rejected_count,
        report.summary.deferred_count,
        report.summary.warning_count,
    );
    for target in &report.targets {
        match &target.outcome {
            TargetOutcome::Resolved { plan } => {
                println!(
                    "  {} -> {} [{}]",
                    target.target,
                    plan.call_chain(),
                    plan.content_hash.short()
                );
                for warning in &plan.warnings {
                    println!("    - WARN {} ({warning})", warning.warning_class());
                }
            }
            TargetOutcome::Rejected { errors } => {
                println!("  {} rejected", target.target);
                for error in errors {
                    println!("    - {} ({error})", error.failure_class());
                }
            }
            TargetOutcome::Deferred => {
                println!("  {} deferred (batch deadline passed)", target.target);
            }
        }
    }
}
