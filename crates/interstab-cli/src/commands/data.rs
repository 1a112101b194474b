use crate::cli::{DataArgs, DataCommands};
use crate::data::DataManager;
use crate::error::Result;
use std::path::PathBuf;
use tracing::info;

pub fn run(args: DataArgs) -> Result<()> {
    match args.command {
        DataCommands::Path => {
            handle_path()?;
        }
        DataCommands::List => {
            handle_list()?;
        }
        DataCommands::SetPath { path } => {
            handle_set_path(path)?;
        }
        DataCommands::ResetPath => {
            handle_reset_path()?;
        }
    }
    Ok(())
}

fn handle_path() -> Result<()> {
    let manager = DataManager::new()?;
    println!("{}", manager.get_data_path().display());
    Ok(())
}

fn handle_list() -> Result<()> {
    let manager = DataManager::new()?;
    let systems = DataManager::list_chemical_systems(manager.get_data_path())?;
    if systems.is_empty() {
        println!(
            "No cached chemical systems found in {}",
            manager.get_data_path().display()
        );
    } else {
        println!("Cached chemical systems in {}:", manager.get_data_path().display());
        for system in systems {
            println!("  {system}");
        }
    }
    Ok(())
}

fn handle_set_path(path: PathBuf) -> Result<()> {
    info!("Setting custom data path to {:?}", &path);
    DataManager::set_custom_path(&path)?;
    println!("✓ Data path set to: {}", path.display());
    if !path.is_dir() {
        println!("  Note: the directory does not exist yet.");
    }
    Ok(())
}

fn handle_reset_path() -> Result<()> {
    info!("Resetting data path to default.");
    DataManager::reset_path()?;
    let manager = DataManager::new()?;
    println!(
        "✓ Data path reset to default: {}",
        manager.get_data_path().display()
    );
    Ok(())
}
