use crate::support::{
    INPUT_ERROR_EXIT, load_config_or_exit, load_facts_or_exit, parse_target_or_exit,
    print_batch_report, print_json_or_exit,
};
use weave_kernel::{PlanCache, generate_all, resolve_batch};
use weave_store::PlanStoreWriter;

pub fn run(
    facts: String,
    config: Option<String>,
    target: Option<String>,
    out: Option<String>,
    json_output: bool,
) {
    let resolver_config = load_config_or_exit(config.as_deref());
    let mut configuration = load_facts_or_exit(&facts);

    if let Some(target) = target.as_deref() {
        let descriptor = parse_target_or_exit(target);
        if !configuration.targets.contains_key(&descriptor) {
            eprintln!("error: no facts for target {descriptor} in {facts}");
            std::process::exit(INPUT_ERROR_EXIT);
        }
        configuration = configuration.restrict_to(&descriptor);
    }

    let report = resolve_batch(&configuration, &PlanCache::new(), &resolver_config);

    if let Some(out) = out.as_deref() {
        let mut writer = PlanStoreWriter::new();
        if let Err(e) = generate_all(&report, &mut writer) {
            eprintln!("error: {e}");
            std::process::exit(INPUT_ERROR_EXIT);
        }
        let written = writer.finish(out).unwrap_or_else(|e| {
            eprintln!("error: failed to write {out}: {e}");
            std::process::exit(INPUT_ERROR_EXIT);
        });
        tracing::info!(path = out, plans = written.len(), "plans written");
    }

    if json_output {
        print_json_or_exit(&report);
    } else {
        print_batch_report("resolve", &report);
    }

    if !report.accepted() {
        std::process::exit(1);
    }
}
