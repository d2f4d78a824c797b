//! Command-line interface for ooxml-schema

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::sync::Arc;

#[cfg(feature = "cli")]
use ooxml_schema::catalog::SchemaCatalog;
#[cfg(feature = "cli")]
use ooxml_schema::documents::Document;
#[cfg(feature = "cli")]
use ooxml_schema::packaging::{ApplicationType, MemoryPackage, Part};
#[cfg(feature = "cli")]
use ooxml_schema::validators::{OpenXmlValidator, Registry};
#[cfg(feature = "cli")]
use ooxml_schema::{FileFormatVersion, ValidationSettings};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "ooxml-schema")]
#[command(author, version, about = "OOXML schema validation tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the element registry built from a catalog
    Inspect {
        /// JSON schema catalog (defaults to the bundled WordprocessingML subset)
        #[arg(short, long, value_name = "CATALOG")]
        catalog: Option<PathBuf>,

        /// Show the descriptor and compiled content model of one element kind
        #[arg(short, long)]
        element: Option<String>,

        /// File format version (all versions when omitted)
        #[arg(short, long)]
        format: Option<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Validate XML parts against a catalog
    Validate {
        /// XML part files, validated as parts of one package
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// JSON schema catalog (defaults to the bundled WordprocessingML subset)
        #[arg(short, long, value_name = "CATALOG")]
        catalog: Option<PathBuf>,

        /// Target file format version
        #[arg(short, long, default_value = "Office2007")]
        format: String,

        /// Maximum number of errors reported (0 = unlimited)
        #[arg(short, long, default_value_t = 1000, allow_negative_numbers = true)]
        max_errors: i64,

        /// Document family: word, spreadsheet, presentation, all
        #[arg(short, long, default_value = "word")]
        application: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

#[cfg(feature = "cli")]
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect {
            catalog,
            element,
            format,
            json,
        } => cmd_inspect(catalog, element, format, json),
        Commands::Validate {
            files,
            catalog,
            format,
            max_errors,
            application,
            json,
        } => cmd_validate(files, catalog, format, max_errors, application, json),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

#[cfg(feature = "cli")]
fn load_catalog(path: Option<PathBuf>) -> ooxml_schema::Result<SchemaCatalog> {
    match path {
        Some(path) => SchemaCatalog::from_file(path),
        None => SchemaCatalog::wordprocessing_sample(),
    }
}

#[cfg(feature = "cli")]
fn parse_application(name: &str) -> Result<ApplicationType, Box<dyn std::error::Error>> {
    match name.to_lowercase().as_str() {
        "word" => Ok(ApplicationType::Word),
        "spreadsheet" | "excel" => Ok(ApplicationType::Spreadsheet),
        "presentation" | "powerpoint" => Ok(ApplicationType::Presentation),
        "all" => Ok(ApplicationType::All),
        _ => Err(format!(
            "Unknown application: {}. Use: word, spreadsheet, presentation, all",
            name
        )
        .into()),
    }
}

/// Returns whether the package is valid
#[cfg(feature = "cli")]
fn cmd_validate(
    files: Vec<PathBuf>,
    catalog: Option<PathBuf>,
    format: String,
    max_errors: i64,
    application: String,
    json_output: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let file_format: FileFormatVersion = format.parse()?;
    let application = parse_application(&application)?;
    let cache = Arc::new(load_catalog(catalog)?.into_cache());

    let mut validator = OpenXmlValidator::with_settings(
        cache,
        ValidationSettings::new().with_file_format(file_format),
    );
    validator.set_max_number_of_errors(max_errors)?;
    let registry = validator.registry()?;

    let mut package = MemoryPackage::new(application);
    for file in &files {
        let xml = fs::read_to_string(file)?;
        let document = Document::parse(&xml, &registry)?;
        package.add_part(Part::new(file.display().to_string(), document.into_root()));
    }

    let errors: Vec<_> = validator.validate_package(&package)?.collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&errors)?);
    } else if errors.is_empty() {
        println!("✓ {} part(s) valid for {}", files.len(), file_format);
    } else {
        println!("✗ {} error(s) for {}", errors.len(), file_format);
        println!();
        for error in &errors {
            println!("  - {}", error);
        }
    }

    Ok(errors.is_empty())
}

#[cfg(feature = "cli")]
fn cmd_inspect(
    catalog: Option<PathBuf>,
    element: Option<String>,
    format: Option<String>,
    json_output: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let cache = load_catalog(catalog)?.into_cache();
    let versions: Vec<FileFormatVersion> = match format {
        Some(format) => vec![format.parse()?],
        None => FileFormatVersion::ALL.to_vec(),
    };

    if let Some(name) = element {
        let version = versions[0];
        let registry = cache.get(version)?;
        print_element_details(&registry, &name, json_output)?;
        return Ok(true);
    }

    if json_output {
        let mut summary = serde_json::Map::new();
        for version in &versions {
            let registry = cache.get(*version)?;
            summary.insert(version.to_string(), serde_json::json!(registry.len()));
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "library": ooxml_schema::VERSION,
                "namespaces": cache.namespaces().len(),
                "descriptors": cache.descriptors().len(),
                "kinds": summary,
            }))?
        );
    } else {
        println!("ooxml-schema v{}", ooxml_schema::VERSION);
        println!();
        println!("Catalog:");
        println!("  Namespaces: {}", cache.namespaces().len());
        println!("  Descriptors: {}", cache.descriptors().len());
        println!();
        println!("Element kinds per version:");
        for version in &versions {
            let registry = cache.get(*version)?;
            println!("  {}: {}", version, registry.len());
        }
    }

    Ok(true)
}

#[cfg(feature = "cli")]
fn print_element_details(
    registry: &Registry,
    name: &str,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let descriptor = registry
        .lookup_name(name)
        .ok_or_else(|| format!("Element '{}' is not defined in {}", name, registry.version()))?;
    let lookup: Vec<(String, String)> = registry
        .compiled_particle(&descriptor.kind)
        .map(|particle| {
            particle
                .lookup()
                .iter()
                .map(|item| (item.kind.to_string(), item.path.to_string()))
                .collect()
        })
        .unwrap_or_default();

    if json_output {
        let json = serde_json::json!({
            "kind": descriptor.kind.as_str(),
            "identity": descriptor.identity.to_string(),
            "capability": descriptor.capability.to_string(),
            "since": descriptor.min_version.to_string(),
            "attributes": descriptor
                .attributes
                .iter()
                .map(|a| serde_json::json!({
                    "name": &*a.name,
                    "type": a.value_type.name(),
                    "required": a.required,
                }))
                .collect::<Vec<_>>(),
            "children": lookup
                .iter()
                .map(|(kind, path)| serde_json::json!({ "kind": kind, "path": path }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("Element: {}", descriptor.kind);
        println!("  Identity: {}", descriptor.identity);
        println!("  Capability: {}", descriptor.capability);
        println!("  Since: {}", descriptor.min_version);
        if !descriptor.attributes.is_empty() {
            println!("  Attributes:");
            for attribute in &descriptor.attributes {
                let required = if attribute.required { " (required)" } else { "" };
                println!(
                    "    {} : {}{}",
                    attribute.name,
                    attribute.value_type.name(),
                    required
                );
            }
        }
        if !lookup.is_empty() {
            println!("  Children:");
            for (kind, path) in &lookup {
                println!("    {} {}", path, kind);
            }
        }
    }
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
