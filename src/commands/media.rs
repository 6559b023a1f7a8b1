use std::path::PathBuf;

use chrono::DateTime;
use clap::{Args, Subcommand, ValueEnum};

use crate::config::Config;
use crate::media::{unique_file_name, MediaClient, MediaFolder};

#[derive(Clone, Copy, ValueEnum)]
pub enum FolderArg {
    Audio,
    Images,
}

impl From<FolderArg> for MediaFolder {
    fn from(arg: FolderArg) -> Self {
        match arg {
            FolderArg::Audio => MediaFolder::Audio,
            FolderArg::Images => MediaFolder::Images,
        }
    }
}

/// Manage uploaded recordings and captures.
#[derive(Args)]
pub struct MediaCommand {
    #[command(subcommand)]
    pub command: MediaSubcommand,
}

#[derive(Subcommand)]
pub enum MediaSubcommand {
    /// Upload a local file
    Upload {
        /// File to upload
        file: PathBuf,

        /// Target folder
        #[arg(long, short, value_enum, default_value = "audio")]
        folder: FolderArg,

        /// Name to store under (default: unique name from the file's)
        #[arg(long)]
        name: Option<String>,
    },

    /// List stored files, newest first
    List {
        /// Folder to list
        #[arg(long, short, value_enum, default_value = "audio")]
        folder: FolderArg,
    },

    /// Delete a stored file
    Delete {
        /// File name within the folder
        name: String,

        /// Folder holding the file
        #[arg(long, short, value_enum, default_value = "audio")]
        folder: FolderArg,
    },
}

impl MediaCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let client = MediaClient::new(&config.hub_url);

        match &self.command {
            MediaSubcommand::Upload { file, folder, name } => {
                let name = match name {
                    Some(name) => name.clone(),
                    None => {
                        let stem = file
                            .file_stem()
                            .map(|s| s.to_string_lossy().into_owned())
                            .unwrap_or_else(|| "upload".to_string());
                        let extension = file
                            .extension()
                            .map(|e| e.to_string_lossy().into_owned())
                            .unwrap_or_else(|| "bin".to_string());
                        unique_file_name(&stem, &extension)
                    }
                };

                let url = client
                    .upload_with_progress((*folder).into(), &name, file, |percent| {
                        print!("\rUploading... {:>3}%", percent);
                        use std::io::Write;
                        let _ = std::io::stdout().flush();
                    })
                    .await?;
                println!("\nUploaded to {}", url);
            }

            MediaSubcommand::List { folder } => {
                let items = client.list((*folder).into()).await?;
                if items.is_empty() {
                    println!("No files.");
                    return Ok(());
                }
                for item in items {
                    let created = DateTime::from_timestamp_millis(item.created_ms)
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    println!("{:<40} {:>10} B  {}", item.name, item.size, created);
                }
            }

            MediaSubcommand::Delete { name, folder } => {
                client.delete((*folder).into(), name).await?;
                println!("Deleted {}", name);
            }
        }

        Ok(())
    }
}
