//! Terminal rendering of the chat widget, talking to a running relay.

use std::time::Duration;

use ai_receptionist::widget::{
    self, DEFAULT_API_BASE, DEFAULT_BUSINESS_ID, KeyHandling, Patch, Renderer, Sender, Widget,
    WidgetConfig,
};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "receptionist-chat", about = "Chat with the AI receptionist from a terminal")]
struct Args {
    /// Relay base URL.
    #[arg(long, env = "RECEPTIONIST_API", default_value = DEFAULT_API_BASE)]
    api: String,

    /// Business identifier sent with every message.
    #[arg(long, env = "RECEPTIONIST_BUSINESS_ID", default_value = DEFAULT_BUSINESS_ID)]
    business_id: String,

    /// Seconds to wait for the relay before giving up on a message.
    #[arg(long, default_value_t = widget::DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = WidgetConfig::new(args.api, args.business_id);
    let chat = Widget::connect(config, Duration::from_secs(args.timeout_secs))?;
    chat.toggle();

    println!("== {} ==  ({}, Ctrl-D to quit)", widget::TITLE, chat.config().api_base);
    println!("{}", widget::PLACEHOLDER);

    let mut updates = chat.subscribe();
    let renderer = tokio::spawn(async move {
        let mut renderer = Renderer::new();
        while updates.changed().await.is_ok() {
            let view = updates.borrow_and_update().clone();
            for patch in renderer.patch(&view) {
                match patch {
                    Patch::Append(msg) if msg.sender == Sender::Bot => println!("bot> {}", msg.text),
                    Patch::ShowTyping => println!("    {}", widget::TYPING_TEXT),
                    // The terminal already echoes user lines and scrolls on its own.
                    _ => {}
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        chat.set_input(line);
        if let KeyHandling::Submitted(outcome) = chat.key_down("Enter").await {
            tracing::debug!(?outcome, "submit finished");
        }
    }

    drop(chat);
    let _ = renderer.await;
    Ok(())
}
