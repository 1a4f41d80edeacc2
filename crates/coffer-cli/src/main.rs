//! Coffer CLI: manage per-user file storage from the command line.
//!
//! Reads DATABASE_URL, UPLOAD_PATH, STORAGE_URL and MAX_FILE_SIZE from the
//! environment (or `.env`). With `--scratch` nothing is persisted.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use coffer_cli::{format_bytes, init_tracing, print_json, Backend};
use coffer_core::models::{FileQuery, NewUser, QuotaLimits, SortField, SortOrder, UserSettings};
use coffer_core::CofferConfig;
use coffer_db::UserRepository;
use coffer_services::UploadRequest;

#[derive(Parser)]
#[command(name = "coffer", about = "Per-user file storage")]
struct Cli {
    /// Acting user ID
    #[arg(long, global = true)]
    user: Option<i64>,

    /// Use in-memory metadata and a temporary upload directory
    #[arg(long, global = true)]
    scratch: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management
    User {
        #[command(subcommand)]
        sub: UserCommands,
    },
    /// Upload a file
    Upload {
        /// Path to the file to upload
        file: PathBuf,
        /// Logical folder to file it under
        #[arg(long)]
        folder: Option<String>,
        /// Treat the file as an image and normalize it
        #[arg(long)]
        image: bool,
        /// Name to store instead of the local file name
        #[arg(long)]
        name: Option<String>,
    },
    /// List files with pagination and sorting
    List {
        /// Only files directly in this folder ("" for root)
        #[arg(long)]
        folder: Option<String>,
        #[arg(long, default_value = "1")]
        page: i64,
        #[arg(long, default_value = "20")]
        page_size: i64,
        /// name, size, created or updated
        #[arg(long, default_value = "created")]
        sort: SortField,
        /// asc or desc
        #[arg(long, default_value = "desc")]
        order: SortOrder,
    },
    /// Show one file
    Get { id: i64 },
    /// Write a file's bytes to a path, or to stdout
    Download {
        id: i64,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Change a file's display name
    Rename { id: i64, name: String },
    /// Move a file to another folder
    Move { id: i64, folder: String },
    /// Delete a file
    Delete { id: i64 },
    /// Show image metadata and dimensions
    ImageInfo { id: i64 },
    /// Print a text file
    Cat { id: i64 },
    /// Replace a text file's contents from a path, or stdin with "-"
    Edit { id: i64, source: PathBuf },
    /// Folder operations
    Folder {
        #[command(subcommand)]
        sub: FolderCommands,
    },
    /// Usage against limits
    Stats,
    /// Show limits, or change them when any value is given
    Settings {
        #[arg(long)]
        max_files: Option<i64>,
        #[arg(long)]
        max_file_size: Option<i64>,
        #[arg(long)]
        max_storage: Option<i64>,
    },
    /// Report how an upload of the given file would be classified
    Inspect { file: PathBuf },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user
    Create {
        username: String,
        email: String,
        #[arg(long)]
        max_files: Option<i64>,
        #[arg(long)]
        max_file_size: Option<i64>,
        #[arg(long)]
        max_storage: Option<i64>,
    },
    /// Look a user up by name
    Show { username: String },
}

#[derive(Subcommand)]
enum FolderCommands {
    /// List folder paths
    List,
    /// Print the folder tree
    Tree,
    /// Count files in a folder and below
    Count { path: String },
    /// Rename the last segment of a folder
    Rename { path: String, name: String },
    /// Delete a folder and everything in it
    Delete { path: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if let Commands::Inspect { file } = &cli.command {
        return inspect(file).await;
    }

    let config = CofferConfig::from_env()?;
    config.validate()?;

    let (backend, default_user) = if cli.scratch {
        let (backend, user) = Backend::scratch(&config).await?;
        (backend, Some(user.id))
    } else {
        (Backend::connect(&config).await?, None)
    };
    let coffer = &backend.coffer;

    let user = cli.user;
    let acting_user = || {
        user.or(default_user)
            .context("--user <ID> is required for this command")
    };

    match cli.command {
        Commands::User { sub } => match sub {
            UserCommands::Create {
                username,
                email,
                max_files,
                max_file_size,
                max_storage,
            } => {
                let mut new_user = NewUser::new(username, email);
                new_user.limits = settings_from(max_files, max_file_size, max_storage)
                    .apply_to(QuotaLimits::default());
                let user = backend.users.create(new_user).await?;
                print_json(&user)?;
            }
            UserCommands::Show { username } => {
                let user = backend
                    .users
                    .find_by_username(&username)
                    .await?
                    .with_context(|| format!("No user named {}", username))?;
                print_json(&user)?;
            }
        },
        Commands::Upload {
            file,
            folder,
            image,
            name,
        } => {
            let user_id = acting_user()?;
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let filename = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("Path has no file name")?,
            };

            let mut request = UploadRequest::new(user_id, filename, data);
            request.folder_path = folder;

            let view = if image {
                coffer.uploads.upload_image(request).await?
            } else {
                coffer.uploads.upload_file(request).await?
            };
            print_json(&view)?;
        }
        Commands::List {
            folder,
            page,
            page_size,
            sort,
            order,
        } => {
            let query = FileQuery {
                folder_path: folder,
                page,
                page_size,
                sort_by: sort,
                sort_order: order,
            };
            let page = coffer.files.list(acting_user()?, query).await?;
            print_json(&page)?;
        }
        Commands::Get { id } => {
            print_json(&coffer.files.get(id, acting_user()?).await?)?;
        }
        Commands::Download { id, output } => {
            let download = coffer.files.download(id, acting_user()?).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &download.data)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!(
                        "Saved {} ({}) to {}",
                        download.file.original_name,
                        format_bytes(download.file.file_size),
                        path.display()
                    );
                }
                None => std::io::stdout()
                    .write_all(&download.data)
                    .context("Failed to write to stdout")?,
            }
        }
        Commands::Rename { id, name } => {
            print_json(&coffer.files.rename(id, acting_user()?, &name).await?)?;
        }
        Commands::Move { id, folder } => {
            print_json(&coffer.files.move_file(id, acting_user()?, &folder).await?)?;
        }
        Commands::Delete { id } => {
            coffer.files.delete(id, acting_user()?).await?;
            print_json(&serde_json::json!({ "success": true, "message": format!("File {} deleted", id) }))?;
        }
        Commands::ImageInfo { id } => {
            print_json(&coffer.files.image_info(id, acting_user()?).await?)?;
        }
        Commands::Cat { id } => {
            let content = coffer.editor.read_content(id, acting_user()?).await?;
            print!("{}", content);
        }
        Commands::Edit { id, source } => {
            let content = read_source(&source).await?;
            let view = coffer
                .editor
                .write_content(id, acting_user()?, &content)
                .await?;
            print_json(&view)?;
        }
        Commands::Folder { sub } => {
            let user_id = acting_user()?;
            match sub {
                FolderCommands::List => print_json(&coffer.folders.list(user_id).await?)?,
                FolderCommands::Tree => print_json(&coffer.folders.tree(user_id).await?)?,
                FolderCommands::Count { path } => {
                    let count = coffer.folders.count(user_id, &path).await?;
                    print_json(&serde_json::json!({ "folder_path": path, "files": count }))?;
                }
                FolderCommands::Rename { path, name } => {
                    let touched = coffer.folders.rename(user_id, &path, &name).await?;
                    print_json(&serde_json::json!({ "renamed_files": touched }))?;
                }
                FolderCommands::Delete { path } => {
                    let removed = coffer.folders.delete(user_id, &path).await?;
                    let ids: Vec<i64> = removed.iter().map(|f| f.id).collect();
                    print_json(&serde_json::json!({ "deleted_files": ids }))?;
                }
            }
        }
        Commands::Stats => {
            let stats = coffer.quota.stats(acting_user()?).await?;
            eprintln!(
                "{} of {} files, {} of {}",
                stats.total_files,
                stats.max_files,
                format_bytes(stats.total_size),
                format_bytes(stats.max_storage)
            );
            print_json(&stats)?;
        }
        Commands::Settings {
            max_files,
            max_file_size,
            max_storage,
        } => {
            let user_id = acting_user()?;
            let settings = if max_files.is_some() || max_file_size.is_some() || max_storage.is_some() {
                coffer
                    .quota
                    .update_settings(user_id, settings_from(max_files, max_file_size, max_storage))
                    .await?
            } else {
                coffer.quota.settings(user_id).await?
            };
            print_json(&settings)?;
        }
        Commands::Inspect { .. } => {}
    }

    Ok(())
}

fn settings_from(max_files: Option<i64>, max_file_size: Option<i64>, max_storage: Option<i64>) -> UserSettings {
    UserSettings {
        max_files: max_files.unwrap_or(0),
        max_file_size: max_file_size.unwrap_or(0),
        max_storage: max_storage.unwrap_or(0),
    }
}

async fn read_source(source: &Path) -> anyhow::Result<String> {
    if source.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read stdin")?;
        return Ok(content);
    }
    tokio::fs::read_to_string(source)
        .await
        .with_context(|| format!("Failed to read {}", source.display()))
}

/// Classify a local file without storing it.
async fn inspect(file: &Path) -> anyhow::Result<()> {
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let detected = coffer_processing::sniff(&data);
    let verdict = match coffer_processing::classify(&data, &name) {
        Ok(verified) => serde_json::json!({
            "accepted": true,
            "mime_type": verified.mime_type,
            "extension": verified.extension,
        }),
        Err(e) => serde_json::json!({
            "accepted": false,
            "detected_type": detected,
            "reason": e.to_string(),
        }),
    };
    print_json(&serde_json::json!({
        "file": name,
        "size": format_bytes(data.len() as i64),
        "classification": verdict,
    }))
}
