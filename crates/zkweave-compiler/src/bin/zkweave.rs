//! zkWeave CLI
//!
//! Run the semantic checks over a parsed contract tree, or compile it into
//! the reconciled circuit program consumed by the code generators.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{fs, path::Path, path::PathBuf};
use tracing_subscriber::EnvFilter;
use zkweave_compiler::{analyse, compile, summarise, Ast, CompilerConfig, FunctionSummary};

#[derive(Parser)]
#[command(name = "zkweave")]
#[command(about = "Analyse and transform contracts with secret state", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the check pipeline and print how each function uses state
    Check {
        /// Path to the parsed contract tree (JSON)
        ast: PathBuf,

        /// Compiler configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run the checks and write the reconciled circuit program
    Transform {
        /// Path to the parsed contract tree (JSON)
        ast: PathBuf,

        /// Compiler configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file for the circuit program
        #[arg(short, long, default_value = "circuits.json")]
        output: PathBuf,
    },
}

fn load_ast(path: &Path) -> Result<Ast> {
    let content =
        fs::read_to_string(path).context(format!("Failed to read contract tree: {:?}", path))?;

    Ast::from_json_str(&content).context("Failed to parse contract tree JSON")
}

fn load_config(path: Option<&Path>) -> Result<CompilerConfig> {
    match path {
        Some(path) => CompilerConfig::from_file(path)
            .context(format!("Failed to load compiler config: {:?}", path)),
        None => Ok(CompilerConfig::default()),
    }
}

fn print_summary(functions: &[FunctionSummary]) {
    for function in functions {
        let kind = match (function.interacts_with_secret, function.interacts_with_public) {
            (true, true) => "secret + public",
            (true, false) => "secret",
            (false, true) => "public",
            (false, false) => "stateless",
        };
        println!("📋 {} ({})", function.name, kind);
        for state in &function.states {
            let mut flags = Vec::new();
            if state.is_whole {
                flags.push("whole");
            }
            if state.is_partitioned {
                flags.push("partitioned");
            }
            if state.is_incremented {
                flags.push("incremented");
            }
            if state.is_decremented {
                flags.push("decremented");
            }
            if state.is_accessed {
                flags.push("accessed");
            }
            if state.is_nullified {
                flags.push("nullified");
            }
            let secrecy = if state.is_secret { "secret" } else { "public" };
            println!("   {} [{}] {}", state.name, secrecy, flags.join(", "));
            if !state.mapping_keys.is_empty() {
                let keys: Vec<&str> = state.mapping_keys.iter().map(|k| k.key.as_str()).collect();
                println!("      keys: {}", keys.join(", "));
            }
        }
    }
}

fn init_tracing() {
    if let Ok(filter) = EnvFilter::try_from_env("ZKWEAVE_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("tracing initialized");
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { ast, config } => {
            let config = load_config(config.as_deref())?;
            let tree = load_ast(&ast)?;
            let cx = analyse(tree, config).context(format!("Checks failed for {:?}", ast))?;

            print_summary(&summarise(&cx));
            println!("✅ All checks passed");
        }
        Commands::Transform { ast, config, output } => {
            let config = load_config(config.as_deref())?;
            let tree = load_ast(&ast)?;
            let compiled = compile(tree, config).context(format!("Compilation failed for {:?}", ast))?;

            let json = serde_json::to_string_pretty(&compiled.program)
                .context("Failed to serialise circuit program")?;
            fs::write(&output, json).context(format!("Failed to write {:?}", output))?;

            println!("✅ Wrote {} circuit file(s)", compiled.program.files.len());
            println!("   Output: {:?}", output);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_defaults_without_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"knownTokenInterfaces": ["IToken"]}}"#).unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert!(config.is_known_token_interface("IToken"));
    }

    #[test]
    fn test_load_ast_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"invalid": json}}"#).unwrap();

        assert!(load_ast(file.path()).is_err());
    }

    #[test]
    fn test_load_ast_missing_file() {
        assert!(load_ast(Path::new("/nonexistent/tree.json")).is_err());
    }
}
