use anyhow::Result;

use crate::entity::{strip_line_ending, CodeEntity};
use crate::models::{BackendsResponse, CleanResponse, DocumentRange, ResolveResponse};

/// Render a resolved entity in human-readable text form.
///
/// The header reads `kind name (backend)`, followed by the entity's
/// positions in 1-based document coordinates and its code indented by
/// four spaces.
pub fn print_resolve_text(response: &ResolveResponse) -> Result<()> {
    let Some(entity) = &response.entity else {
        println!("no entity found ({})", response.backend);
        return Ok(());
    };

    match entity.name() {
        Some(name) => println!("{} {} ({})", entity.kind(), name, response.backend),
        None => println!("{} ({})", entity.kind(), response.backend),
    }

    if let Some(named) = entity.as_named() {
        println!("range        : {}", named.code_range());
        println!("signature end: {}", named.signature_end());
        println!("indent level : {}", named.indent_level());
    }
    println!("docstring    : {}", describe_range(entity.docstring_range()));
    println!("lines        : {}", entity.code_lines().len());
    println!();
    print_code(entity);

    Ok(())
}

fn describe_range(range: Option<DocumentRange>) -> String {
    range.map_or_else(|| "none".to_string(), |range| range.to_string())
}

fn print_code(entity: &CodeEntity) {
    for line in entity.code_lines() {
        println!("    {}", strip_line_ending(line));
    }
}

/// Print cleaned code as-is, terminated by a single newline.
pub fn print_clean_text(response: &CleanResponse) -> Result<()> {
    print!("{}", response.code);
    if !response.code.ends_with('\n') {
        println!();
    }
    Ok(())
}

/// Render available backends, marking the default one.
pub fn print_backends_text(response: &BackendsResponse) -> Result<()> {
    for name in &response.backends {
        let marker = if *name == response.default {
            " (default)"
        } else {
            ""
        };
        println!("{name}{marker}");
    }
    Ok(())
}
