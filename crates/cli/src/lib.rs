pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "leadsign",
    about = "Leadsign operator CLI",
    long_about = "Inspect configuration, apply migrations, check the CRM custom field, read a contact back and author the fillable NDA template.",
    after_help = "Examples:\n  leadsign config\n  leadsign fields\n  leadsign verify-contact c-123\n  leadsign add-form-fields --input templates/nda_template.pdf"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "List CRM custom fields for the location and mark the configured one")]
    Fields,
    #[command(about = "Read a CRM contact and show whether the signed NDA link and tag landed")]
    VerifyContact {
        #[arg(help = "CRM contact id")]
        contact_id: String,
        #[arg(long, help = "Custom field id to check (defaults to crm.custom_field_id)")]
        field_id: Option<String>,
    },
    #[command(about = "Add the NDA form fields to a template PDF")]
    AddFormFields {
        #[arg(long, help = "Template PDF to read")]
        input: PathBuf,
        #[arg(long, help = "Where to write the fillable PDF (defaults to overwriting --input)")]
        output: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Fields => commands::fields::run(),
        Command::VerifyContact { contact_id, field_id } => {
            commands::verify_contact::run(&contact_id, field_id.as_deref())
        }
        Command::AddFormFields { input, output } => {
            commands::add_form_fields::run(&input, output.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
