/// Scenario Linter — validates scenario definition files before they ship.
///
/// Usage: scenario_linter <file_or_dir>

use chat_demo_engine::core::sequence::Sequence;
use chat_demo_engine::schema::flow::InputKind;
use chat_demo_engine::schema::scenario::Scenario;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: scenario_linter <file_or_dir>");
        process::exit(0);
    }

    let root = Path::new(&args[1]);
    let files = if root.is_file() {
        vec![root.to_path_buf()]
    } else if root.is_dir() {
        let mut found = Vec::new();
        collect_ron_files(root, &mut found);
        found.sort();
        found
    } else {
        eprintln!("ERROR: Path '{}' does not exist", root.display());
        process::exit(1);
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for path in &files {
        match Scenario::load_from_ron(path) {
            Ok(scenario) => {
                println!("  Loaded: {} ({})", path.display(), scenario.id);
                let (e, w) = lint_scenario(&scenario);
                let prefix = path.display().to_string();
                errors.extend(e.into_iter().map(|m| format!("{prefix}: {m}")));
                warnings.extend(w.into_iter().map(|m| format!("{prefix}: {m}")));
            }
            Err(e) => errors.push(format!("{}: failed to parse: {}", path.display(), e)),
        }
    }

    println!("\n=== Scenario Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} files, {} errors, {} warnings",
        files.len(),
        errors.len(),
        warnings.len()
    );

    if !errors.is_empty() {
        process::exit(1);
    }
}

fn collect_ron_files(dir: &Path, out: &mut Vec<PathBuf>) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                collect_ron_files(&path, out);
            } else if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                out.push(path);
            }
        }
    }
}

fn lint_scenario(scenario: &Scenario) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Structural problems the engine refuses to play
    if let Err(e) = Sequence::generate(scenario) {
        errors.push(e.to_string());
    }

    if scenario.messages.is_empty() {
        warnings.push("scenario has no messages".to_string());
    }

    let mut seen = HashSet::new();
    for message in &scenario.messages {
        if !seen.insert(message.id.0.as_str()) {
            errors.push(format!("duplicate message id '{}'", message.id));
        }
    }

    for pair in scenario.messages.windows(2) {
        if pair[1].at_ms < pair[0].at_ms {
            warnings.push(format!(
                "message '{}' at {}ms comes before '{}' at {}ms and will be delayed",
                pair[1].id, pair[1].at_ms, pair[0].id, pair[0].at_ms
            ));
        }
    }

    if let Some(last) = scenario.messages.iter().map(|m| m.at_ms).max() {
        if scenario.duration_ms < last {
            warnings.push(format!(
                "duration_ms {} ends before the last message at {}ms",
                scenario.duration_ms, last
            ));
        }
    }

    let launched: HashSet<_> = scenario
        .messages
        .iter()
        .filter_map(|m| m.launches.as_ref().map(|l| &l.flow))
        .collect();

    for flow in &scenario.flows {
        if !launched.contains(&flow.id) {
            warnings.push(format!("flow '{}' is never launched", flow.id));
        }

        let auto = scenario
            .messages
            .iter()
            .filter_map(|m| m.launches.as_ref())
            .any(|l| l.flow == flow.id && l.auto_advance.is_some());

        for step in &flow.steps {
            if matches!(step.input, InputKind::Select) && step.options.is_empty() {
                warnings.push(format!(
                    "select step '{}/{}' has no options",
                    flow.id, step.id
                ));
            }
            match &step.mock_value {
                Some(value) => {
                    if let Err(e) = step.validate(value) {
                        errors.push(format!(
                            "mock value for '{}/{}' fails validation: {}",
                            flow.id, step.id, e
                        ));
                    }
                }
                None if auto => warnings.push(format!(
                    "step '{}/{}' auto-advances without a mock value",
                    flow.id, step.id
                )),
                None => {}
            }
        }
    }

    (errors, warnings)
}
