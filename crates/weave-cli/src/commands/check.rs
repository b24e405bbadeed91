use crate::support::{load_config_or_exit, load_facts_or_exit, print_json_or_exit};
use serde_json::json;
use weave_kernel::{BatchReport, PlanCache, TargetOutcome, resolve_batch};

const CHECK_KIND: &str = "weave.check.v1";

fn print_check_report(report: &BatchReport) {
    println!(
        "[check] {} (targets={}, errors={}, warnings={})",
        if report.accepted() { "OK" } else { "FAIL" },
        report.summary.target_count,
        report.summary.error_count,
        report.summary.warning_count
    );
    for error in report.errors() {
        println!("  - {} ({error})", error.failure_class());
    }
    for plan in report.plans() {
        for warning in &plan.warnings {
            println!(
                "  - WARN {} {} ({warning})",
                plan.target,
                warning.warning_class()
            );
        }
    }
    for target in &report.targets {
        if matches!(target.outcome, TargetOutcome::Deferred) {
            println!("  - {} deferred", target.target);
        }
    }
}

pub fn run(facts: String, config: Option<String>, json_output: bool) {
    let resolver_config = load_config_or_exit(config.as_deref());
    let configuration = load_facts_or_exit(&facts);
    let report = resolve_batch(&configuration, &PlanCache::new(), &resolver_config);

    if json_output {
        let warnings: Vec<_> = report
            .plans()
            .flat_map(|plan| {
                plan.warnings
                    .iter()
                    .map(move |warning| json!({ "target": plan.target, "warning": warning }))
            })
            .collect();
        let deferred: Vec<_> = report
            .targets
            .iter()
            .filter(|target| matches!(target.outcome, TargetOutcome::Deferred))
            .map(|target| &target.target)
            .collect();
        let payload = json!({
            "schema": 1,
            "checkKind": CHECK_KIND,
            "factsPath": facts,
            "result": report.result,
            "failureClasses": report.failure_classes,
            "warningClasses": report.warning_classes,
            "errors": report.errors().collect::<Vec<_>>(),
            "warnings": warnings,
            "deferred": deferred,
            "summary": report.summary,
        });
        print_json_or_exit(&payload);
    } else {
        print_check_report(&report);
    }

    if !report.accepted() {
        std::process::exit(1);
    }
}
