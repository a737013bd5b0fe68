use crate::cli::InspectArgs;
use crate::error::{CliError, Result};
use std::fmt::Write;
use stratopt::core::io::bdf::BdfFile;
use stratopt::core::io::traits::ModelFile;
use stratopt::core::models::model::StructuralModel;
use stratopt::engine::config::ConfigError;
use stratopt::engine::context::resolve_parameters;
use tracing::info;

pub fn run(args: InspectArgs) -> Result<()> {
    info!("Loading input model from {:?}", &args.input);
    let (model, _) = BdfFile::read_from_path(&args.input).map_err(|e| CliError::FileParsing {
        path: args.input.clone(),
        source: e.into(),
    })?;

    let mut report = format!("Model: {}\n", args.input.display());
    report.push_str(&render_report(&model, args.properties.as_deref())?);
    print!("{report}");
    Ok(())
}

/// Property table, mass, and optionally how a selection resolves.
fn render_report(model: &StructuralModel, selection: Option<&str>) -> Result<String> {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Nodes: {}, Elements: {}, Properties: {}",
        model.node_count(),
        model.element_count(),
        model.property_count()
    );
    let _ = writeln!(out, "{:>10}  {:<8}  {:>14}  {}", "PID", "Card", "Value", "Tunable");
    for property in model.properties_iter() {
        let value = property
            .tunable_value()
            .map_or_else(|| "-".to_string(), |v| format!("{v:.6}"));
        let tunable = if property.tunable_kind().is_some() { "yes" } else { "no" };
        let _ = writeln!(
            out,
            "{:>10}  {:<8}  {:>14}  {}",
            property.id,
            property.card_name(),
            value,
            tunable
        );
    }

    match model.mass() {
        Ok(mass) => {
            let _ = writeln!(out, "Mass: {mass:.6}");
        }
        Err(e) => {
            let _ = writeln!(out, "Mass: unavailable ({e})");
        }
    }

    let Some(expression) = selection else {
        return Ok(out);
    };
    let _ = writeln!(out, "Selection '{expression}':");
    match resolve_parameters(model, expression) {
        Ok(set) => {
            let ids: Vec<_> = set.tunable.iter().map(|p| p.id.to_string()).collect();
            let _ = writeln!(out, "  Tunable ({}): {}", ids.len(), ids.join(", "));
            for (id, card) in &set.unsupported {
                let _ = writeln!(out, "  Unsupported: {id} ({card})");
            }
            for id in &set.missing {
                let _ = writeln!(out, "  Not in model: {id}");
            }
        }
        Err(ConfigError::NoTunableProperties) => {
            let _ = writeln!(out, "  {}", ConfigError::NoTunableProperties);
        }
        Err(e) => return Err(CliError::Argument(e.to_string())),
    }
    Ok(out)
}
