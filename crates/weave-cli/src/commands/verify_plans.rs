use crate::support::{
    INPUT_ERROR_EXIT, load_config_or_exit, load_facts_or_exit, print_json_or_exit,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeSet;
use weave_kernel::{CompositionPlan, PlanCache, PlanSet, TargetDescriptor, resolve_batch};
use weave_store::read_plans_from_path;

const CHECK_KIND: &str = "weave.verify_plans.v1";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Mismatch {
    target: TargetDescriptor,
    class: &'static str,
    message: String,
}

/// Compare every stored plan with a fresh resolution of the same facts.
fn compare(
    stored: &PlanSet,
    fresh: &PlanSet,
    rejected: &BTreeSet<&TargetDescriptor>,
) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();
    for plan in fresh.iter() {
        match stored.get(&plan.target) {
            None => mismatches.push(Mismatch {
                target: plan.target.clone(),
                class: "plan.missing",
                message: "resolved but absent from the plan store".to_string(),
            }),
            Some(existing) if existing != plan => mismatches.push(Mismatch {
                target: plan.target.clone(),
                class: "plan.stale",
                message: describe_drift(existing, plan),
            }),
            Some(_) => {}
        }
    }
    for plan in stored.iter() {
        if fresh.get(&plan.target).is_some() {
            continue;
        }
        let (class, message) = if rejected.contains(&plan.target) {
            ("plan.rejected", "stored plan, but the target no longer resolves")
        } else {
            ("plan.orphaned", "stored plan for a target with no facts")
        };
        mismatches.push(Mismatch {
            target: plan.target.clone(),
            class,
            message: message.to_string(),
        });
    }
    mismatches.sort_by(|a, b| a.target.cmp(&b.target));
    mismatches
}

fn describe_drift(stored: &CompositionPlan, fresh: &CompositionPlan) -> String {
    if stored.content_hash == fresh.content_hash {
        format!("{} differs only in warnings", stored.content_hash.short())
    } else {
        format!(
            "stored {} ({}) but facts resolve to {} ({})",
            stored.content_hash.short(),
            stored.call_chain(),
            fresh.content_hash.short(),
            fresh.call_chain()
        )
    }
}

pub fn run(facts: String, plans: String, config: Option<String>, json_output: bool) {
    let resolver_config = load_config_or_exit(config.as_deref());
    let configuration = load_facts_or_exit(&facts);
    let stored = read_plans_from_path(&plans).unwrap_or_else(|e| {
        eprintln!("error: failed to load {plans}: {e}");
        std::process::exit(INPUT_ERROR_EXIT);
    });

    let report = resolve_batch(&configuration, &PlanCache::new(), &resolver_config);
    let fresh = report.plan_set().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(INPUT_ERROR_EXIT);
    });
    let rejected: BTreeSet<&TargetDescriptor> = report
        .targets
        .iter()
        .filter(|target| fresh.get(&target.target).is_none())
        .map(|target| &target.target)
        .collect();
    let mismatches = compare(&stored, &fresh, &rejected);
    let verified = mismatches.is_empty();

    if json_output {
        let failure_classes: BTreeSet<&str> = mismatches.iter().map(|m| m.class).collect();
        let result = if verified { "accepted" } else { "rejected" };
        let payload = json!({
            "schema": 1,
            "checkKind": CHECK_KIND,
            "factsPath": facts,
            "plansPath": plans,
            "result": result,
            "failureClasses": failure_classes,
            "mismatches": mismatches,
            "summary": {
                "storedCount": stored.len(),
                "resolvedCount": fresh.len(),
                "mismatchCount": mismatches.len(),
            },
        });
        print_json_or_exit(&payload);
    } else {
        println!(
            "[verify-plans] {} (stored={}, resolved={}, mismatches={})",
            if verified { "OK" } else { "FAIL" },
            stored.len(),
            fresh.len(),
            mismatches.len()
        );
        for mismatch in &mismatches {
            println!(
                "  - {} {} ({})",
                mismatch.target, mismatch.class, mismatch.message
            );
        }
    }

    if !verified {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_kernel::{Fact, MixinFact, ResolverConfig, TypeCatalog, TypeRef, resolve_target};

    fn ty(text: &str) -> TypeRef {
        TypeRef::parse(text).unwrap()
    }

    fn plan(target: &str, mixins: &[&str]) -> CompositionPlan {
        let facts: Vec<Fact> = mixins
            .iter()
            .map(|name| MixinFact::builder(ty(name)).build().unwrap().into())
            .collect();
        resolve_target(
            TargetDescriptor::new(ty(target)),
            &facts,
            &TypeCatalog::new(),
            &ResolverConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn identical_sets_have_no_mismatches() {
        let set = PlanSet::from_plans([plan("Order", &["M1"])]).unwrap();
        assert!(compare(&set, &set.clone(), &BTreeSet::new()).is_empty());
    }

    #[test]
    fn drift_missing_and_orphaned_plans_are_reported() {
        let stored =
            PlanSet::from_plans([plan("Order", &["M1"]), plan("Legacy", &["M1"])]).unwrap();
        let fresh =
            PlanSet::from_plans([plan("Order", &["M1", "M2"]), plan("Invoice", &["M1"])]).unwrap();
        let classes: Vec<(String, &str)> = compare(&stored, &fresh, &BTreeSet::new())
            .into_iter()
            .map(|m| (m.target.to_string(), m.class))
            .collect();
        assert_eq!(
            classes,
            vec![
                ("Invoice".to_string(), "plan.missing"),
                ("Legacy".to_string(), "plan.orphaned"),
                ("Order".to_string(), "plan.stale"),
            ]
        );
    }
}
