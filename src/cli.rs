use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::client::AuthoringClient;
use crate::config::{normalize_base_path, set_field, ConfigManager};
use crate::content::{ContentResolver, ContentState, HttpContentSource};
use crate::filesystem::{
    clean_folder_path, default_note_name, ensure_markdown_extension, initial_note_content,
};
use crate::index::IndexBuilder;
use crate::models::{Config, Theme, TreeNode};
use crate::preferences::FilePreferenceStore;
use crate::server::{self, AppState};
use crate::theme::ThemeController;
use crate::tree_state::TreeState;

#[derive(Debug, Parser)]
#[command(name = "notes-browser", version, about = "Browse and author a tree of markdown notes")]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Content root, overriding the config
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Regenerate the notes index once
    Index,
    /// Serve the content root with the local authoring endpoints
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Mount point, e.g. /notes/
        #[arg(long)]
        base_path: Option<String>,
        /// Do not expose the authoring endpoints
        #[arg(long)]
        no_authoring: bool,
    },
    /// Print the sidebar tree
    Tree {
        /// Navigation path of the open note; its folders are expanded
        #[arg(long)]
        open: Option<String>,
        #[arg(long)]
        expand_all: bool,
        /// Print the folder picker options instead of the tree
        #[arg(long)]
        folders: bool,
    },
    /// Resolve a navigation path and print the note
    Show {
        path: String,
        /// Content base URL, overriding the config
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Create a folder through the running dev server
    Mkdir {
        folder: String,
        name: String,
        #[arg(long)]
        server: Option<String>,
    },
    /// Create a note through the running dev server
    New {
        folder: String,
        /// File name; `.md` is appended when missing
        name: Option<String>,
        /// Note content (defaults to a heading named after the file)
        #[arg(long, conflicts_with = "stdin")]
        content: Option<String>,
        /// Read the note content from stdin
        #[arg(long)]
        stdin: bool,
        #[arg(long)]
        server: Option<String>,
    },
    /// Show or change the saved configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show or change the color theme
    Theme {
        #[command(subcommand)]
        action: ThemeAction,
        /// Current system preference (light or dark)
        #[arg(long, global = true)]
        system: Option<Theme>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as JSON
    Show,
    /// Set one field and save the config file
    Set { key: String, value: String },
    /// Print the config file location
    Path,
}

#[derive(Debug, Subcommand)]
pub enum ThemeAction {
    Get,
    Set { theme: Theme },
    Toggle,
    /// Forget the explicit choice and follow the system again
    Clear,
}

fn open_config(path: Option<PathBuf>) -> Result<ConfigManager, String> {
    let path = match path {
        Some(path) => path,
        None => ConfigManager::default_path()?,
    };
    let manager = ConfigManager::new(path)?;
    log::debug!("Loaded config from {}", manager.config_path().display());
    Ok(manager)
}

/// Applies a `config` subcommand to the config file.
fn run_config(manager: &ConfigManager, action: ConfigAction) -> Result<(), String> {
    match action {
        ConfigAction::Show => {
            let json = serde_json::to_string_pretty(&manager.get())
                .map_err(|e| format!("Failed to serialize config: {}", e))?;
            println!("{}", json);
        }
        ConfigAction::Set { key, value } => {
            let mut next = manager.get();
            set_field(&mut next, &key, &value)?;
            manager.update(|config| *config = next);
            manager.save_sync()?;
            log::info!("Saved {} to {}", key, manager.config_path().display());
        }
        ConfigAction::Path => println!("{}", manager.config_path().display()),
    }
    Ok(())
}

/// Runs one CLI command to completion.
pub async fn execute(cli: Cli) -> Result<(), String> {
    let manager = open_config(cli.config)?;
    let mut config = manager.get();
    if let Some(root) = cli.root {
        config.content_root = root;
    }

    match cli.command {
        Command::Index => {
            let builder = IndexBuilder::new(&config.content_root, &config.index_file);
            let notes = builder.regenerate().map_err(|e| e.to_string())?;
            println!("Indexed {} notes into {}", notes, builder.index_file().display());
        }
        Command::Serve {
            host,
            port,
            base_path,
            no_authoring,
        } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(base_path) = base_path {
                config.base_path = normalize_base_path(&base_path);
            }
            if no_authoring {
                config.authoring_enabled = false;
            }

            let state = AppState::new(config).map_err(|e| e.to_string())?;
            // Serve an up to date index from the start
            if let Err(e) = state.index.regenerate() {
                log::warn!("Initial index generation failed: {}", e);
            }
            server::serve(state).await.map_err(|e| e.to_string())?;
        }
        Command::Tree {
            open,
            expand_all,
            folders,
        } => {
            let builder = IndexBuilder::new(&config.content_root, &config.index_file);
            let mut state = TreeState::new(builder.build().map_err(|e| e.to_string())?);
            if folders {
                for option in state.folder_options() {
                    println!("{}", option.label);
                }
                return Ok(());
            }

            let current = open.unwrap_or_else(|| "/".to_string());
            state.expand_ancestors_of(&current);
            if expand_all {
                state.expand_all();
            }
            print_tree(&state, &current);
        }
        Command::Show { path, base_url } => {
            let base_url = base_url.unwrap_or(config.content_base_url);
            let resolver = ContentResolver::new(Arc::new(HttpContentSource::new(base_url)));
            resolver.navigate(&path).await;
            match resolver.state() {
                ContentState::Loaded { content, .. } => println!("{}", content),
                state => {
                    let error = state
                        .error()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| format!("Unexpected state {:?}", state));
                    return Err(format!("{} (path: {})", error, path));
                }
            }
        }
        Command::Mkdir {
            folder,
            name,
            server,
        } => {
            let client = authoring_client(&config, server);
            let folder = clean_folder_path(&folder);
            client
                .create_directory(&folder, name.trim())
                .await
                .map_err(|e| e.to_string())?;
            client.regenerate_index().await.map_err(|e| e.to_string())?;
            println!("Created folder {}", join_path(&folder, name.trim()));
        }
        Command::New {
            folder,
            name,
            content,
            stdin,
            server,
        } => {
            let prefix = if stdin { "clip" } else { "note" };
            let file_name = match name {
                Some(name) if !name.trim().is_empty() => ensure_markdown_extension(&name),
                _ => default_note_name(prefix, Utc::now()),
            };
            let content = if stdin {
                let mut buffer = String::new();
                std::io::stdin()
                    .read_to_string(&mut buffer)
                    .map_err(|e| format!("Failed to read stdin: {}", e))?;
                if buffer.trim().is_empty() {
                    return Err("Refusing to create a note from empty input".to_string());
                }
                buffer
            } else {
                content.unwrap_or_else(|| initial_note_content(&file_name))
            };

            let client = authoring_client(&config, server);
            let folder = clean_folder_path(&folder);
            client
                .write_file(&folder, &file_name, &content)
                .await
                .map_err(|e| e.to_string())?;
            client.regenerate_index().await.map_err(|e| e.to_string())?;
            println!("Created note {}", join_path(&folder, &file_name));
        }
        Command::Config { action } => run_config(&manager, action)?,
        Command::Theme { action, system } => {
            let store = FilePreferenceStore::open(FilePreferenceStore::default_path()?)?;
            let controller = ThemeController::new(Box::new(store), system);
            let theme = match action {
                ThemeAction::Get => controller.effective_theme(),
                ThemeAction::Set { theme } => {
                    controller.set_theme(theme);
                    theme
                }
                ThemeAction::Toggle => controller.toggle_theme(),
                ThemeAction::Clear => {
                    controller.clear_preference();
                    controller.effective_theme()
                }
            };
            let explicit = controller.state().explicit;
            println!("{}{}", theme, if explicit { "" } else { " (system)" });
        }
    }

    Ok(())
}

fn authoring_client(config: &Config, server: Option<String>) -> AuthoringClient {
    let base_url = server.unwrap_or_else(|| {
        format!(
            "http://localhost:{}{}",
            config.port,
            normalize_base_path(&config.base_path)
        )
    });
    AuthoringClient::new(base_url, config.index_file.clone())
}

fn join_path(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder, name)
    }
}

fn print_tree(state: &TreeState, current_path: &str) {
    for row in state.visible_rows(current_path) {
        let indent = "  ".repeat(row.depth);
        let line = match row.node {
            TreeNode::Directory { name, .. } => {
                let marker = if row.open { "▾ 📂" } else { "▸ 📁" };
                format!("{}{} {}", indent, marker, name)
            }
            node @ TreeNode::File { .. } => {
                let marker = if row.active { ">" } else { " " };
                format!("{}{} 📝 {}", indent, marker, node.display_label())
            }
        };
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from(["notes-browser", "--root", "docs", "tree", "--open", "/go/a.md"]).unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("docs")));
        assert!(matches!(cli.command, Command::Tree { open: Some(ref p), .. } if p == "/go/a.md"));

        let cli = Cli::try_parse_from(["notes-browser", "theme", "set", "light", "--system", "dark"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Theme { action: ThemeAction::Set { theme: Theme::Light }, system: Some(Theme::Dark) }
        ));

        assert!(Cli::try_parse_from(["notes-browser", "theme", "set", "purple"]).is_err());
        assert!(Cli::try_parse_from(["notes-browser", "new", "go", "--stdin", "--content", "x"]).is_err());
    }

    #[test]
    fn test_authoring_client_default_url() {
        let config = Config::default();
        let client = authoring_client(&config, None);
        assert_eq!(
            client.control_url("write"),
            "http://localhost:5173/notes/__notes/write"
        );

        let client = authoring_client(&config, Some("http://127.0.0.1:4000/docs".to_string()));
        assert_eq!(
            client.control_url("refresh"),
            "http://127.0.0.1:4000/docs/__notes/refresh"
        );
    }

    #[tokio::test]
    async fn test_config_set_saves_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let path_arg = config_path.to_str().unwrap();

        let cli = Cli::try_parse_from(["notes-browser", "--config", path_arg, "config", "set", "port", "8080"]).unwrap();
        execute(cli).await.unwrap();
        let cli = Cli::try_parse_from(["notes-browser", "--config", path_arg, "config", "set", "base_path", "docs"]).unwrap();
        execute(cli).await.unwrap();

        let saved = ConfigManager::new(config_path.clone()).unwrap().get();
        assert_eq!(saved.port, 8080);
        assert_eq!(saved.base_path, "/docs/");

        let cli = Cli::try_parse_from(["notes-browser", "--config", path_arg, "config", "set", "port", "nope"]).unwrap();
        assert!(execute(cli).await.is_err());
        assert_eq!(ConfigManager::new(config_path).unwrap().get().port, 8080);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "a.md"), "a.md");
        assert_eq!(join_path("go", "a.md"), "go/a.md");
    }
}
