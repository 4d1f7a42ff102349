//! VPrompt - story prompt, image and voice generation
//!
//! With no subcommand the desktop window opens; subcommands run the same
//! page model from the terminal.

mod app;
mod clipboard;
mod gui;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use app::{parse_emotion, parse_key_val, App};

#[derive(Parser)]
#[command(
    name = "vprompt",
    version,
    about = "VPrompt client - story prompts, images and voice",
    long_about = "Drives a VPrompt backend: submit the story form, regenerate images \
                  from prompt JSON, synthesize narration and preview uploads.\n\n\
                  Run without a subcommand to open the desktop window.\n\n\
                  The backend URL comes from ~/.vprompt/config.json or VPROMPT_BASE_URL."
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Submit the story form and print the generated prompt
    Prompt {
        /// Form field as name=value (prompt_type, output_lang, time, scene, ...)
        #[arg(short, long = "field", value_parser = parse_key_val)]
        fields: Vec<(String, String)>,

        /// Reference photo to upload
        #[arg(long)]
        image: Option<PathBuf>,

        /// Leave out the time field; remembered for later runs
        #[arg(long)]
        bypass_time: Option<bool>,

        /// Copy the result to the clipboard
        #[arg(long)]
        copy: bool,
    },

    /// Generate images from prompt JSON
    Regenerate {
        /// Prompt JSON file, or - for stdin
        json: PathBuf,

        /// Seed in 0..=4294967295; random when omitted
        #[arg(long)]
        seed: Option<String>,

        #[arg(long)]
        modified_text: Option<String>,
    },

    /// Synthesize speech
    Voice {
        text: String,

        /// Voice sample filename; defaults to the last one used
        #[arg(long)]
        sample: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Emotion level as name=value (angry, sad, happy, afraid, disgust, melancholic, surprised, calm)
        #[arg(short, long = "emotion", value_parser = parse_emotion)]
        emotions: Vec<(String, f32)>,
    },

    /// List the voice samples the backend offers
    Voices,

    /// Validate an image and render its upload preview
    Preview {
        path: PathBuf,

        /// Allow server-side HEIC conversion
        #[arg(long)]
        server: bool,

        /// Name of the same file already stored on the server, for HEIC details
        #[arg(long)]
        stored: Option<String>,
    },

    /// Show the UI language, or switch it
    Lang {
        #[arg(long)]
        toggle: bool,
    },

    /// Copy text to the clipboard
    Copy { text: String },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let Some(command) = args.command else {
        log::info!("Starting VPrompt");
        gui::app_main();
        return Ok(());
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let mut app = App::load();
    let result = runtime.block_on(run(&mut app, command));
    app.flush_toasts();
    result
}

async fn run(app: &mut App, command: Commands) -> Result<()> {
    match command {
        Commands::Prompt {
            fields,
            image,
            bypass_time,
            copy,
        } => app.prompt(fields, image, bypass_time, copy).await,
        Commands::Regenerate {
            json,
            seed,
            modified_text,
        } => app.regenerate(&json, seed, modified_text).await,
        Commands::Voice {
            text,
            sample,
            description,
            emotions,
        } => app.voice(text, sample, description, emotions).await,
        Commands::Voices => app.voices().await,
        Commands::Preview {
            path,
            server,
            stored,
        } => app.preview(&path, server, stored).await,
        Commands::Lang { toggle } => app.lang(toggle),
        Commands::Copy { text } => {
            app.copy(&text);
            Ok(())
        }
    }
}
