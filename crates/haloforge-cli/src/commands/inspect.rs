//! `haloforge inspect` command - Show a stencil and its communication fan-out.

use colored::Colorize;
use haloforge_ir::{comm_directions, Stencil};

use crate::error::CliResult;

/// One line per stencil direction: index, name, offsets and the
/// directions a read along it has to be communicated through.
pub fn describe(stencil: &Stencil) -> CliResult<Vec<String>> {
    stencil
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let fan_out = comm_directions(d)?
                .iter()
                .map(|c| c.name())
                .collect::<Vec<_>>()
                .join(" ");
            Ok(format!("{:>3}  {:<4} {:<12} {}", i, d.name(), d.to_string(), fan_out))
        })
        .collect()
}

/// Execute the `inspect` command.
pub fn execute(stencil: &str) -> CliResult<()> {
    let stencil = Stencil::by_name(stencil)?;
    println!(
        "{} {} ({}D, {} directions)",
        "→".bright_cyan(),
        stencil.name().unwrap_or("stencil").bright_white(),
        stencil.dim(),
        stencil.len()
    );
    for line in describe(&stencil)? {
        println!("  {}", line);
    }
    Ok(())
}
