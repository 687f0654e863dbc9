//! Galaxy inspection command implementation.

use super::{CliError, OutputFormat};
use dronefall::galaxy::{generate_galaxy, Galaxy};
use std::fmt::Write as _;

/// Execute the galaxy command.
///
/// # Errors
///
/// Returns an error if generation or encoding fails.
pub(crate) fn execute(locations: usize, seed: u64, format: OutputFormat) -> Result<(), CliError> {
    let galaxy = generate_galaxy(locations, seed)?;
    match format {
        OutputFormat::Text => print!("{}", format_text(&galaxy, seed)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&galaxy)?),
    }
    Ok(())
}

fn format_text(galaxy: &Galaxy, seed: u64) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Galaxy (seed: {seed}): {} locations, {} connections",
        galaxy.len(),
        galaxy.connections().len()
    );
    for location in galaxy.locations() {
        let neighbors: Vec<String> = galaxy
            .neighbors(location.id)
            .iter()
            .map(ToString::to_string)
            .collect();
        let _ = writeln!(
            output,
            "  {:>4} ({:>7.2}, {:>7.2}) r={:.2}  -> {}",
            location.id.to_string(),
            location.position.x,
            location.position.y,
            location.radius,
            neighbors.join(" ")
        );
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_lists_every_location() {
        let galaxy = generate_galaxy(6, 3).unwrap();
        let text = format_text(&galaxy, 3);
        assert!(text.starts_with("Galaxy (seed: 3): 6 locations"));
        assert_eq!(text.lines().count(), 7);
    }
}
