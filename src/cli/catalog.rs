//! Catalog listing command implementation.

use super::{CliError, OutputFormat};
use dronefall::game::{builtin, Catalog};
use std::fmt::Write as _;

/// Execute the catalog command.
///
/// # Errors
///
/// Returns an error if JSON encoding fails.
pub(crate) fn execute(format: OutputFormat) -> Result<(), CliError> {
    let catalog = builtin::catalog();
    match format {
        OutputFormat::Text => print!("{}", format_text(&catalog)),
        OutputFormat::Json => {
            let kinds: Vec<_> = catalog.kinds().collect();
            println!("{}", serde_json::to_string_pretty(&kinds)?);
        }
    }
    Ok(())
}

fn format_text(catalog: &Catalog) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{:<4} {:<10} {:>6} {:>4} {:>3} {:>5}  categories",
        "id", "name", "memory", "cost", "hp", "count"
    );
    for kind in catalog.kinds() {
        let categories: Vec<String> = kind.categories.iter().map(|c| format!("{c:?}")).collect();
        let _ = writeln!(
            output,
            "{:<4} {:<10} {:>6} {:>4} {:>3} {:>5}  {}",
            kind.id.to_string(),
            kind.name,
            kind.memory,
            kind.cost,
            kind.max_health,
            kind.occurrences,
            categories.join(", ")
        );
    }
    output
}
