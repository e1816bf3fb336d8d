use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use overlay_editor::controller::display_layers;
use overlay_editor::{Editor, EditorConfig, FileStorage, StaticFontCatalog, TextProperty};

/// Text overlay editor, headless session tool
#[derive(Parser, Debug)]
#[command(name = "overlay-editor")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding the autosaved design
    #[arg(long, value_name = "DIR")]
    storage_dir: Option<PathBuf>,

    /// Config file (defaults to the user config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Discard the saved design and start over
    #[arg(long)]
    reset: bool,

    /// Image to use as the background
    #[arg(long, value_name = "FILE")]
    background: Option<PathBuf>,

    /// Append a text layer with this content
    #[arg(long, value_name = "TEXT")]
    add_text: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EditorConfig::load_from(path),
        None => EditorConfig::load(),
    };
    if let Some(dir) = args.storage_dir {
        config.storage_dir = Some(dir);
    }
    let storage = FileStorage::new(config.storage_dir());
    tracing::debug!("Using storage directory {:?}", storage.dir());

    let mut editor = Editor::new(config, Arc::new(storage), Arc::new(StaticFontCatalog::default()));

    if args.reset {
        editor.reset_design();
    } else if !editor.restore().await {
        // Only a reset racing the restore can get here
        editor.reset_design();
    }

    if let Some(path) = &args.background {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read background {:?}", path))?;
        editor
            .load_background(bytes)
            .await
            .with_context(|| format!("Failed to load background {:?}", path))?;
    }

    for text in args.add_text {
        let id = editor.add_text_layer(None);
        editor.update_text_property(id, TextProperty::Content(text)).await?;
    }

    let (width, height) = editor.document().size();
    println!("Canvas {width}x{height}");
    for (display, entry) in display_layers(&editor).iter().enumerate() {
        let mut flags = String::new();
        if !entry.visible {
            flags.push_str(" hidden");
        }
        if entry.locked {
            flags.push_str(" locked");
        }
        println!("{display:>3}  {}{flags}", entry.name);
    }
    let (index, len) = editor.history_position();
    println!("History {index} / {len}");

    editor.flush_pending();
    editor.flush_autosave().await;
    editor.dispose();
    Ok(())
}
