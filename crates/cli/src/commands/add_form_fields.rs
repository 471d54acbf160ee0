use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use leadsign_core::field_definitions;
use leadsign_server::pdf::add_form_fields;

use crate::commands::CommandResult;

pub fn run(input: &Path, output: Option<&Path>) -> CommandResult {
    let template = match fs::read(input) {
        Ok(bytes) => bytes,
        Err(error) => {
            return CommandResult::failure(
                "add-form-fields",
                "input_read",
                format!("could not read `{}`: {error}", input.display()),
                7,
            );
        }
    };

    let fillable = match add_form_fields(&template) {
        Ok(bytes) => bytes,
        Err(error) => {
            return CommandResult::failure("add-form-fields", "template", error.to_string(), 8);
        }
    };

    let destination = output.unwrap_or(input);
    if let Err(error) = write_replacing(destination, &fillable) {
        return CommandResult::failure("add-form-fields", "output_write", format!("{error:#}"), 9);
    }

    CommandResult::success(
        "add-form-fields",
        format!(
            "wrote {} form fields to {}",
            field_definitions().len(),
            destination.display()
        ),
    )
}

/// Writes next to `path` first so a reader never sees a half-written template.
fn write_replacing(path: &Path, bytes: &[u8]) -> Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(directory)
        .with_context(|| format!("could not create a temp file in `{}`", directory.display()))?;
    temp.write_all(bytes).context("could not write the fillable template")?;
    temp.persist(path)
        .map_err(|error| error.error)
        .with_context(|| format!("could not move the template into `{}`", path.display()))?;
    Ok(())
}
