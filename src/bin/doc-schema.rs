//! Doc Schema CLI
//!
//! Command-line interface for validating and cleaning documents against a
//! JSON schema declaration.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use doc_schema::{
    load_json_auto, CleanOptions, ErrorType, Schema, ValidateError, ValidateOptions,
};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "doc-schema")]
#[command(about = "Validate and clean documents and update modifiers against a schema")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a document or modifier
    Validate {
        /// Document source: file path or URL (http:// or https://)
        doc: String,

        /// Schema declaration source: file path or URL
        #[arg(long)]
        schema: String,

        /// The document is an update modifier ($set, $push, ...)
        #[arg(long)]
        modifier: bool,

        /// Validate the modifier as an upsert
        #[arg(long, requires = "modifier")]
        upsert: bool,

        /// Only validate these keys (comma separated)
        #[arg(long, value_delimiter = ',')]
        keys: Option<Vec<String>>,

        /// Error kinds to ignore (repeatable)
        #[arg(long)]
        ignore: Vec<String>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Clean a document or modifier and print the result
    Clean {
        /// Document source: file path or URL (http:// or https://)
        doc: String,

        /// Schema declaration source: file path or URL
        #[arg(long)]
        schema: String,

        /// The document is an update modifier (detected from its shape if omitted)
        #[arg(long)]
        modifier: bool,

        /// Clean the modifier as an upsert
        #[arg(long)]
        upsert: bool,

        /// Keep keys the schema does not allow
        #[arg(long)]
        no_filter: bool,

        /// Do not convert values to their declared type
        #[arg(long)]
        no_auto_convert: bool,

        /// Keep empty strings
        #[arg(long)]
        keep_empty_strings: bool,

        /// Do not trim strings
        #[arg(long)]
        no_trim: bool,

        /// Do not run auto and default values
        #[arg(long)]
        no_auto_values: bool,

        /// Remove null array items
        #[arg(long)]
        remove_nulls: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Build a schema declaration and list its keys
    Check {
        /// Schema declaration source: file path or URL
        schema: String,

        /// Output the schema summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate {
            doc,
            schema,
            modifier,
            upsert,
            keys,
            ignore,
            json,
        } => {
            let mut options = ValidateOptions::new()
                .modifier(modifier)
                .upsert(upsert)
                .ignore(ignore.iter().map(|kind| ErrorType::from(kind.as_str())));
            if let Some(keys) = keys {
                options = options.keys(keys);
            }
            run_validate(&doc, &schema, &options, json)
        }

        Commands::Clean {
            doc,
            schema,
            modifier,
            upsert,
            no_filter,
            no_auto_convert,
            keep_empty_strings,
            no_trim,
            no_auto_values,
            remove_nulls,
            pretty,
            output,
        } => {
            let mut options = CleanOptions::new()
                .filter(!no_filter)
                .auto_convert(!no_auto_convert)
                .remove_empty_strings(!keep_empty_strings)
                .trim_strings(!no_trim)
                .get_auto_values(!no_auto_values)
                .remove_nulls_from_arrays(remove_nulls)
                .upsert(upsert);
            if modifier {
                options = options.modifier(true);
            }
            run_clean(&doc, &schema, &options, pretty, output)
        }

        Commands::Check { schema, json } => run_check(&schema, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn load_schema(source: &str, json_output: bool) -> Result<Schema, u8> {
    let declaration = load_json_auto(source).map_err(|e| {
        report_error(json_output, &format!("loading schema: {}", e));
        e.exit_code() as u8
    })?;
    Schema::from_json(&declaration).map_err(|e| {
        report_error(json_output, &format!("invalid schema: {}", e));
        e.exit_code() as u8
    })
}

fn load_doc(source: &str, json_output: bool) -> Result<Value, u8> {
    load_json_auto(source).map_err(|e| {
        report_error(json_output, &format!("loading document: {}", e));
        e.exit_code() as u8
    })
}

fn run_validate(doc_source: &str, schema_source: &str, options: &ValidateOptions, json_output: bool) -> Result<(), u8> {
    let schema = load_schema(schema_source, json_output)?;
    let doc = load_doc(doc_source, json_output)?;

    match schema.validate(&doc, options) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(ValidateError::Invalid { details, .. }) => {
            if json_output {
                let output = json!({
                    "valid": false,
                    "errors": details
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for detail in details {
                    eprintln!("  {}: {}", detail.error.name, detail.message);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

fn run_clean(
    doc_source: &str,
    schema_source: &str,
    options: &CleanOptions,
    pretty: bool,
    output: Option<PathBuf>,
) -> Result<(), u8> {
    let schema = load_schema(schema_source, false)?;
    let doc = load_doc(doc_source, false)?;
    let cleaned = schema.clean_with(&doc, options);

    let json_output = if pretty {
        serde_json::to_string_pretty(&cleaned)
    } else {
        serde_json::to_string(&cleaned)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_check(schema_source: &str, json_output: bool) -> Result<(), u8> {
    let schema = load_schema(schema_source, json_output)?;

    if json_output {
        println!("{}", json!({ "valid": true, "keys": schema.describe() }));
        return Ok(());
    }

    for key in schema.keys() {
        let Some(definition) = schema.definition(key) else {
            continue;
        };
        let types: Vec<&str> = definition.type_tags().map(|tag| tag.name()).collect();
        let requiredness = match definition.static_optional() {
            Some(true) => "optional",
            Some(false) => "required",
            None => "conditional",
        };
        println!("  {} {} ({})", key, types.join(" | "), requiredness);
    }
    println!("Schema OK: {} keys", schema.keys().len());
    Ok(())
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
