use clap::{Args, Subcommand, ValueEnum};

use plantsync::{Config, ConfigSource};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        print_value(
                            "database_path",
                            config.database_path.value.display(),
                            &config.database_path.source,
                        );
                        print_value(
                            "api_url",
                            config.api_url.value.as_deref().unwrap_or("(local database)"),
                            &config.api_url.source,
                        );
                        print_value(
                            "api_key",
                            if config.api_key.value.is_some() { "(set)" } else { "(not set)" },
                            &config.api_key.source,
                        );
                        print_value(
                            "storage_encoding",
                            config.storage_encoding.value,
                            &config.storage_encoding.source,
                        );
                        print_value(
                            "normalize_images",
                            config.normalize_images.value,
                            &config.normalize_images.source,
                        );
                        print_value("port", config.port.value, &config.port.source);
                    }
                }
                Ok(())
            }
        }
    }
}

fn print_value(name: &str, value: impl std::fmt::Display, source: &ConfigSource) {
    println!("{}: {}", name, value);
    println!("  source: {}", source);
    println!();
}
