use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use plantsync::models::is_reserved_field;
use plantsync::{LoadOptions, NewPlant, PlantPatch, PlantRecord, PlantSyncActions};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct PlantCommand {
    #[command(subcommand)]
    pub command: PlantSubcommand,
}

#[derive(Subcommand)]
pub enum PlantSubcommand {
    /// List all plants
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a plant's details
    Show {
        /// Plant GUID
        guid: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a new plant
    Add {
        /// Plant name
        #[arg(long)]
        name: Option<String>,

        /// Photo of the plant
        #[arg(long)]
        image: Option<PathBuf>,

        /// Extra field (can be repeated). Values are parsed as JSON when
        /// possible, otherwise kept as text.
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },

    /// Update an existing plant
    Update {
        /// Plant GUID
        guid: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// Replace the photo
        #[arg(long, conflicts_with = "remove_image")]
        image: Option<PathBuf>,

        /// Remove the photo
        #[arg(long)]
        remove_image: bool,

        /// Field to set (can be repeated)
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },

    /// Delete one or more plants
    Delete {
        /// Plant GUIDs
        #[arg(required = true)]
        guids: Vec<String>,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

/// JSON view of a plant; the image is summarized by its size.
#[derive(Serialize)]
struct PlantView<'a> {
    guid: &'a str,
    created: i64,
    modified: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_bytes: Option<usize>,
    #[serde(flatten)]
    fields: &'a Map<String, Value>,
}

impl<'a> From<&'a PlantRecord> for PlantView<'a> {
    fn from(plant: &'a PlantRecord) -> Self {
        Self {
            guid: &plant.guid,
            created: plant.created,
            modified: plant.modified,
            image_bytes: plant.blob.as_ref().map(Vec::len),
            fields: &plant.fields,
        }
    }
}

impl PlantCommand {
    pub async fn run(&self, actions: &PlantSyncActions) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            PlantSubcommand::List { format } => {
                actions.load_plants(LoadOptions::default()).await?;
                let plants = actions.store().plants().await;

                if plants.is_empty() {
                    println!("No plants found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        let views: Vec<PlantView> = plants.iter().map(PlantView::from).collect();
                        println!("{}", serde_json::to_string_pretty(&views)?);
                    }
                    OutputFormat::Text => {
                        println!("{:<36}  {:<30}  IMAGE", "GUID", "NAME");
                        println!("{}", "-".repeat(80));
                        for plant in &plants {
                            let name = plant.name().unwrap_or("-");
                            let name = if name.chars().count() > 30 {
                                format!("{}...", name.chars().take(27).collect::<String>())
                            } else {
                                name.to_string()
                            };
                            let image = match &plant.blob {
                                Some(blob) => format!("{} bytes", blob.len()),
                                None => "-".to_string(),
                            };
                            println!("{:<36}  {:<30}  {}", plant.guid, name, image);
                        }
                        println!("\nTotal: {} plant(s)", plants.len());
                    }
                }
                Ok(())
            }

            PlantSubcommand::Show { guid, format } => {
                actions.load_plants(LoadOptions::default()).await?;
                let plant = match actions.load_plant_item(guid).await {
                    Some(plant) => plant,
                    None => return Err(format!("Plant not found: {}", guid).into()),
                };

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&PlantView::from(&plant))?);
                    }
                    OutputFormat::Text => {
                        println!("{}", plant);
                    }
                }
                Ok(())
            }

            PlantSubcommand::Add {
                name,
                image,
                fields,
            } => {
                let mut input = NewPlant::new();
                if let Some(name) = name {
                    if name.trim().is_empty() {
                        return Err("Plant name cannot be empty".into());
                    }
                    input = input.with_field("name", name.trim());
                }
                for raw in fields {
                    let (key, value) = parse_field(raw)?;
                    input = input.with_field(key, value);
                }
                if let Some(path) = image {
                    input = input.with_blob(read_image(path)?);
                }

                let guid = actions.add_plant(input).await?;
                println!("Created plant: {}", guid);
                Ok(())
            }

            PlantSubcommand::Update {
                guid,
                name,
                image,
                remove_image,
                fields,
            } => {
                let mut patch = PlantPatch::new(guid);
                if let Some(name) = name {
                    patch = patch.set("name", name.clone());
                }
                for raw in fields {
                    let (key, value) = parse_field(raw)?;
                    patch = patch.set(key, value);
                }
                if let Some(path) = image {
                    patch = patch.with_blob(read_image(path)?);
                }
                if *remove_image {
                    patch = patch.clear_blob();
                }

                if patch.is_empty() {
                    return Err("Nothing to update. Provide at least one option.".into());
                }

                actions.load_plants(LoadOptions::default()).await?;
                if actions.store().find(guid).await.is_none() {
                    return Err(format!("Plant not found: {}", guid).into());
                }

                let updated = actions.update_plant(patch).await?;
                println!("Updated plant:");
                println!("{}", updated);
                Ok(())
            }

            PlantSubcommand::Delete { guids, force } => {
                actions.load_plants(LoadOptions::default()).await?;

                let mut known = Vec::with_capacity(guids.len());
                for guid in guids {
                    match actions.store().find(guid).await {
                        Some(plant) => known.push(plant),
                        None => eprintln!("Skipping unknown plant: {}", guid),
                    }
                }
                if known.is_empty() {
                    return Err("No matching plants to delete".into());
                }

                // Confirm deletion unless --force is used
                if !force {
                    let names: Vec<&str> = known
                        .iter()
                        .map(|p| p.name().unwrap_or(p.guid.as_str()))
                        .collect();
                    print!("Delete {} plant(s): {}? [y/N] ", known.len(), names.join(", "));
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                let batch: Vec<String> = known.into_iter().map(|p| p.guid).collect();
                actions.delete_plants(&batch).await?;
                println!("Deleted {} plant(s)", batch.len());
                Ok(())
            }
        }
    }
}

/// Parses `KEY=VALUE`. The value is read as JSON when it parses, so
/// `water_days=7` stores a number and `location=kitchen` a string.
fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Invalid field '{}', expected KEY=VALUE", raw))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Invalid field '{}', key is empty", raw));
    }
    if is_reserved_field(key) {
        return Err(format!("Field '{}' is managed by plantsync", key));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn read_image(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("Failed to read image '{}': {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_field_json_and_text() {
        assert_eq!(
            parse_field("water_days=7").unwrap(),
            ("water_days".to_string(), json!(7))
        );
        assert_eq!(
            parse_field("indoor=true").unwrap(),
            ("indoor".to_string(), json!(true))
        );
        assert_eq!(
            parse_field("location=kitchen window").unwrap(),
            ("location".to_string(), json!("kitchen window"))
        );
        assert_eq!(
            parse_field("note=a=b").unwrap(),
            ("note".to_string(), json!("a=b"))
        );
    }

    #[test]
    fn test_parse_field_errors() {
        assert!(parse_field("no-equals").is_err());
        assert!(parse_field("=value").is_err());
        assert!(parse_field("guid=abc").unwrap_err().contains("managed"));
    }

    #[test]
    fn test_plant_view_summarizes_image() {
        let plant = PlantRecord::create(
            NewPlant::new()
                .with_field("name", "Yucca")
                .with_blob(vec![0; 10]),
            5,
        );
        let value = serde_json::to_value(PlantView::from(&plant)).unwrap();
        assert_eq!(value["image_bytes"], json!(10));
        assert_eq!(value["name"], json!("Yucca"));
        assert!(value.get("blob").is_none());
    }
}
