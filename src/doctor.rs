use pageflow_agent::content::{BENEFITS_BLOCK, INGREDIENTS_BLOCK, SAFETY_BLOCK, USAGE_BLOCK};
use pageflow_agent::template::fill_placeholders;
use pageflow_core::config::{AppConfig, TemplateConfig};
use pageflow_core::types::Product;

pub struct CheckResult {
    pub label: String,
    pub ok: bool,
    pub detail: String,
}

pub fn run_doctor(config: &AppConfig) -> usize {
    let checks = collect_checks(config);

    // Print results
    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
    fail_count
}

pub fn collect_checks(config: &AppConfig) -> Vec<CheckResult> {
    vec![
        check_output_dir(config),
        check_pipeline(config),
        check_templates(config),
        check_refinement(config),
        check_retrieval(config),
    ]
}

fn check_output_dir(config: &AppConfig) -> CheckResult {
    let dir = config.output_dir();
    if !dir.exists() {
        return CheckResult {
            label: "Output".into(),
            ok: true,
            detail: format!("{} (created on first run)", dir.display()),
        };
    }
    if !dir.is_dir() {
        return CheckResult {
            label: "Output".into(),
            ok: false,
            detail: format!("{} (not a directory)", dir.display()),
        };
    }

    let probe = dir.join(".doctor_test");
    match std::fs::write(&probe, "test") {
        Ok(_) => {
            std::fs::remove_file(&probe).ok();
            CheckResult {
                label: "Output".into(),
                ok: true,
                detail: format!("{}", dir.display()),
            }
        }
        Err(e) => CheckResult {
            label: "Output".into(),
            ok: false,
            detail: format!("{} (not writable: {})", dir.display(), e),
        },
    }
}

/// Longest approved path: parser, then qa/content/critique once per
/// attempt, then comparison, index and assembler.
fn worst_case_steps(max_revisions: usize) -> usize {
    1 + 3 * (max_revisions + 1) + 3
}

fn check_pipeline(config: &AppConfig) -> CheckResult {
    let p = &config.pipeline;
    let needed = worst_case_steps(p.max_revisions);

    if p.min_qa_items == 0 {
        return CheckResult {
            label: "Pipeline".into(),
            ok: false,
            detail: "min_qa_items is 0, critique accepts an empty FAQ".into(),
        };
    }
    if p.max_steps < needed {
        return CheckResult {
            label: "Pipeline".into(),
            ok: false,
            detail: format!(
                "max_steps ({}) trips before max_revisions ({}) can; need at least {}",
                p.max_steps, p.max_revisions, needed
            ),
        };
    }

    CheckResult {
        label: "Pipeline".into(),
        ok: true,
        detail: format!(
            "{} QA items (min {}), up to {} revisions, ceiling {} steps",
            p.target_qa_items.max(p.min_qa_items),
            p.min_qa_items,
            p.max_revisions,
            p.max_steps
        ),
    }
}

fn template_issues(name: &str, template: &TemplateConfig, probe: &Product) -> Vec<String> {
    let known_blocks = [BENEFITS_BLOCK, INGREDIENTS_BLOCK, USAGE_BLOCK, SAFETY_BLOCK];
    let mut issues = Vec::new();

    if fill_placeholders(&template.title, probe).contains("{{") {
        issues.push(format!("{}: unknown placeholder in '{}'", name, template.title));
    }
    for section in &template.sections {
        if !known_blocks.contains(&section.as_str()) {
            issues.push(format!("{}: unknown block '{}'", name, section));
        }
    }
    issues
}

fn check_templates(config: &AppConfig) -> CheckResult {
    let probe = Product {
        name: "probe".into(),
        concentration: None,
        skin_type: vec![],
        key_ingredients: vec![],
        benefits: vec![],
        how_to_use: String::new(),
        side_effects: None,
        price_inr: None,
    };
    let t = &config.templates;
    let issues: Vec<String> = [("product", &t.product), ("faq", &t.faq), ("comparison", &t.comparison)]
        .into_iter()
        .flat_map(|(name, template)| template_issues(name, template, &probe))
        .collect();

    if issues.is_empty() {
        CheckResult {
            label: "Templates".into(),
            ok: true,
            detail: "product, faq, comparison".into(),
        }
    } else {
        CheckResult {
            label: "Templates".into(),
            ok: false,
            detail: issues.join(", "),
        }
    }
}

fn check_refinement(config: &AppConfig) -> CheckResult {
    let Some(ref refinement) = config.refinement else {
        return CheckResult {
            label: "Refinement".into(),
            ok: true,
            detail: "Not configured (rule-based answers)".into(),
        };
    };

    let capability = pageflow_llm::create_refiner(Some(refinement));
    match capability.reason() {
        None => CheckResult {
            label: "Refinement".into(),
            ok: true,
            detail: format!("{} ({})", refinement.model_id, refinement.provider),
        },
        Some(reason) if !refinement.enabled => CheckResult {
            label: "Refinement".into(),
            ok: true,
            detail: reason.to_string(),
        },
        Some(reason) => CheckResult {
            label: "Refinement".into(),
            ok: false,
            detail: reason.to_string(),
        },
    }
}

fn check_retrieval(config: &AppConfig) -> CheckResult {
    let Some(ref retrieval) = config.retrieval else {
        return CheckResult {
            label: "Retrieval".into(),
            ok: true,
            detail: "Not configured".into(),
        };
    };
    if !retrieval.enabled {
        return CheckResult {
            label: "Retrieval".into(),
            ok: true,
            detail: "Disabled".into(),
        };
    }

    let Some(mut retriever) = pageflow_memory::create_retriever(Some(retrieval)).into_inner() else {
        return CheckResult {
            label: "Retrieval".into(),
            ok: false,
            detail: format!("provider '{}' unavailable", retrieval.provider),
        };
    };

    let sample = vec![retrieval.probe_query.clone()];
    match retriever
        .build_index(&sample)
        .and_then(|_| retriever.query(&retrieval.probe_query, 1))
    {
        Ok(hits) if !hits.is_empty() => CheckResult {
            label: "Retrieval".into(),
            ok: true,
            detail: format!("{} embeddings, top_k {}", retrieval.provider, retrieval.top_k),
        },
        Ok(_) => CheckResult {
            label: "Retrieval".into(),
            ok: false,
            detail: "index returned no results for its own probe".into(),
        },
        Err(e) => CheckResult {
            label: "Retrieval".into(),
            ok: false,
            detail: e.to_string(),
        },
    }
}
