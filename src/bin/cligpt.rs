//! Command-line client for OpenAI chat models.
//!
//! # Usage
//!
//! ```bash
//! # Store the API token once
//! cligpt init
//!
//! # Ask a single question
//! cligpt prompt "what does the borrow checker do?"
//!
//! # Start an interactive chat, optionally with a first message
//! cligpt chat explain lifetimes
//!
//! # Continue one of the ten most recent chats
//! cligpt chat list
//! ```
//!
//! Logging goes to stderr and is controlled with `CLIGPT_LOG` (default
//! `warn`).

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use cligpt::chat::{
    ChatArgs, ChatConfig, ChatSession, ImageArgs, Interrupt, PlainTextRenderer, PromptArgs,
    prompt_once, select_session,
};
use cligpt::settings::{self, NO_PERSONA, Settings};
use cligpt::store::DEFAULT_LIST_LIMIT;
use cligpt::{Error, ImageRequest, ImageSize, KnownModel, OpenAi, SessionStore};

const LOG_ENV: &str = "CLIGPT_LOG";

const USAGE: &str = "USAGE: cligpt <COMMAND> [ARGS]

Commands:
    chat [--prompt P] [--no-color] [WORDS...]   start an interactive chat
    chat list [--no-color]                      resume one of the last 10 chats
    prompt [--json] [--no-color] WORDS...       ask a single question
    image [--n N] [--size S] WORDS...           generate images
    init                                        create the config and set the token
    token [TOKEN]                               set the API token
    model [NAME]                                set the model (chatgpt, gpt4)
    temp [T]                                    set the temperature (0 to 1)
    maxt [N]                                    set max tokens per reply (0: no limit)
    persona [NAME]                              activate a persona (none: deactivate)
    persona add [NAME] [CONTEXT...]             add a persona
    persona list                                list personas
    help                                        show this message

In a chat, type exit, quit or q (or press Ctrl+D) to leave.";

type BoxError = Box<dyn std::error::Error>;

#[tokio::main]
async fn main() {
    init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    if let Err(err) = run(&args).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    use tracing_subscriber::prelude::*;
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(filter),
        )
        .init();
}

async fn run(args: &[&str]) -> Result<(), BoxError> {
    let Some((command, rest)) = args.split_first() else {
        println!("{USAGE}");
        return Ok(());
    };
    match *command {
        "chat" => chat(rest).await,
        "prompt" => prompt(rest).await,
        "image" => image(rest).await,
        "init" => init(),
        "token" => token(rest),
        "model" => model(rest),
        "temp" => temperature(rest),
        "maxt" => max_tokens(rest),
        "persona" => persona(rest),
        "help" | "--help" | "-h" => {
            println!("{USAGE}");
            Ok(())
        }
        other => Err(format!("unknown command {other:?}; run `cligpt help`").into()),
    }
}

/// Settings location, loaded settings, and the path they came from.
fn load_settings() -> Result<(PathBuf, PathBuf, Settings), Error> {
    let dir = settings::config_dir()?;
    let path = settings::config_path(&dir);
    let loaded = Settings::load(&path)?;
    Ok((dir, path, loaded))
}

fn client(settings: &Settings) -> Result<OpenAi, Error> {
    OpenAi::new(settings.require_token()?)
}

/// Read one line, treating end of input and Ctrl+C as a cancellation.
fn read_line(editor: &mut DefaultEditor, prompt: &str) -> Result<Option<String>, Error> {
    match editor.readline(prompt) {
        Ok(line) => Ok(Some(line)),
        Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => Ok(None),
        Err(err) => Err(Error::io("failed to read input", io::Error::other(err))),
    }
}

/// Use `given` when present, otherwise ask for a value.
fn value_or_ask(given: Option<String>, prompt: &str) -> Result<String, BoxError> {
    if let Some(value) = given {
        return Ok(value);
    }
    let mut editor = DefaultEditor::new()?;
    read_line(&mut editor, prompt)?
        .map(|line| line.trim().to_string())
        .ok_or_else(|| Error::abort("no value entered").into())
}

fn first_arg(rest: &[&str]) -> Option<String> {
    rest.first().map(|s| s.to_string())
}

async fn chat(rest: &[&str]) -> Result<(), BoxError> {
    let (resume, rest) = match rest.split_first() {
        Some((&"list", rest)) => (true, rest),
        _ => (false, rest),
    };
    let (args, free) =
        ChatArgs::from_arguments_relaxed("USAGE: cligpt chat [list] [OPTIONS] [WORDS...]", rest);

    let (dir, _, settings) = load_settings()?;
    let backend = client(&settings)?;
    let store = SessionStore::open(settings::database_path(&dir));
    let mut config = ChatConfig::from(&settings);
    if args.no_color {
        config = config.without_color();
    }
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut editor = DefaultEditor::new()?;

    // Ctrl+C cancels the turn in flight instead of killing the process
    let interrupt = Arc::new(Interrupt::new());
    let handler = interrupt.clone();
    ctrlc::set_handler(move || handler.trigger())?;

    let mut session = ChatSession::new(backend, config, store.clone());
    if resume {
        let recent = store.list_recent_sessions(DEFAULT_LIST_LIMIT)?;
        match select_session(recent, &mut renderer, |prompt| {
            read_line(&mut editor, prompt)
        })? {
            Some(chosen) => {
                session.resume(chosen);
                session.echo_history(&mut renderer);
            }
            None => return Ok(()),
        }
    }

    let initial = if free.is_empty() {
        args.prompt
    } else {
        Some(free.join(" "))
    };
    session
        .converse(initial, &mut renderer, &interrupt, |prompt| {
            let line = read_line(&mut editor, prompt)?;
            if let Some(line) = line.as_deref().filter(|l| !l.trim().is_empty()) {
                let _ = editor.add_history_entry(line);
            }
            Ok(line)
        })
        .await?;
    Ok(())
}

async fn prompt(rest: &[&str]) -> Result<(), BoxError> {
    let (args, free) =
        PromptArgs::from_arguments_relaxed("USAGE: cligpt prompt [OPTIONS] WORDS...", rest);
    let text = free.join(" ");
    if text.trim().is_empty() {
        return Err(Error::configuration("a prompt is required", None).into());
    }

    let (_, _, settings) = load_settings()?;
    let backend = client(&settings)?;
    let mut config = ChatConfig::from(&settings);
    if args.no_color || args.json {
        config = config.without_color();
    }
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    prompt_once(&backend, &config, &text, &mut renderer, args.json).await?;
    Ok(())
}

async fn image(rest: &[&str]) -> Result<(), BoxError> {
    let (args, free) = ImageArgs::from_arguments_relaxed("USAGE: cligpt image [OPTIONS] WORDS...", rest);
    let mut request = ImageRequest::new(free.join(" "));
    if let Some(n) = args.n {
        request = request.with_count(n);
    }
    if let Some(size) = args.size {
        request = request.with_size(size.parse::<ImageSize>()?);
    }
    request.validate()?;

    let (_, _, settings) = load_settings()?;
    let response = client(&settings)?.generate_image(&request).await?;
    for url in response.urls() {
        println!("{url}");
    }
    Ok(())
}

fn init() -> Result<(), BoxError> {
    let (_, path, mut settings) = load_settings()?;
    println!("Config file at {}", path.display());
    if !settings.token.is_empty() {
        println!("A token is already set; use `cligpt token` to replace it.");
        return Ok(());
    }
    let token = value_or_ask(None, "OpenAI API token: ")?;
    settings.set_token(&token)?;
    settings.save(&path)?;
    println!("Token saved.");
    Ok(())
}

fn token(rest: &[&str]) -> Result<(), BoxError> {
    let (_, path, mut settings) = load_settings()?;
    let token = value_or_ask(first_arg(rest), "OpenAI API token: ")?;
    settings.set_token(&token)?;
    settings.save(&path)?;
    println!("Token saved to {}", path.display());
    Ok(())
}

fn model(rest: &[&str]) -> Result<(), BoxError> {
    let (_, path, mut settings) = load_settings()?;
    let given = first_arg(rest);
    if given.is_none() {
        println!("Current model: {}", settings.model);
        for known in KnownModel::ALL {
            println!("    {} ({known})", known.alias());
        }
    }
    let name = value_or_ask(given, "Model: ")?;
    settings.set_model(&name)?;
    settings.save(&path)?;
    println!("Model set to {}", settings.model);
    Ok(())
}

fn temperature(rest: &[&str]) -> Result<(), BoxError> {
    let (_, path, mut settings) = load_settings()?;
    let given = first_arg(rest);
    if given.is_none() {
        println!("Current temperature: {}", settings.temperature);
    }
    let value = value_or_ask(given, "Temperature (0 to 1): ")?;
    let value: f32 = value.parse().map_err(|_| {
        Error::configuration(
            format!("{value:?} is not a number"),
            Some("temperature".to_string()),
        )
    })?;
    settings.set_temperature(value)?;
    settings.save(&path)?;
    println!("Temperature set to {}", settings.temperature);
    Ok(())
}

fn max_tokens(rest: &[&str]) -> Result<(), BoxError> {
    let (_, path, mut settings) = load_settings()?;
    let given = first_arg(rest);
    if given.is_none() {
        println!("Current max tokens: {}", settings.max_tokens);
    }
    let value = value_or_ask(given, "Max tokens (0 for no limit): ")?;
    let value: u32 = value.parse().map_err(|_| {
        Error::configuration(
            format!("{value:?} is not a non-negative integer"),
            Some("max_tokens".to_string()),
        )
    })?;
    settings.set_max_tokens(value);
    settings.save(&path)?;
    println!("Max tokens set to {}", settings.max_tokens);
    Ok(())
}

fn persona(rest: &[&str]) -> Result<(), BoxError> {
    let (_, path, mut settings) = load_settings()?;
    match rest.split_first() {
        Some((&"list", _)) => {
            print_personas(&settings);
            Ok(())
        }
        Some((&"add", args)) => {
            let name = value_or_ask(first_arg(args), "Persona name: ")?;
            let context = if args.len() > 1 {
                Some(args[1..].join(" "))
            } else {
                None
            };
            let context = value_or_ask(context, "Persona context: ")?;
            settings.add_persona(&name, &context)?;
            settings.save(&path)?;
            println!("Persona {name} added.");
            Ok(())
        }
        first => {
            let given = first.map(|(name, _)| name.to_string());
            if given.is_none() {
                print_personas(&settings);
            }
            let name = value_or_ask(given, &format!("Persona to activate ({NO_PERSONA} to clear): "))?;
            settings.activate_persona(&name)?;
            settings.save(&path)?;
            match settings.active_persona() {
                Some(active) => println!("Persona {} is active.", active.name),
                None => println!("No persona is active."),
            }
            Ok(())
        }
    }
}

fn print_personas(settings: &Settings) {
    for persona in &settings.personas {
        let marker = if persona.active { "*" } else { " " };
        println!("{marker} {}: {}", persona.name, persona.context);
    }
}
