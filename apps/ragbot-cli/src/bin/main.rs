use std::io::{self, BufRead, Write};

use clap::Parser;

use ragbot_chat::{build_chatbot, ChatResponse, RagChatbot};
use ragbot_cli::{init_logging, load_settings, open_backends, override_index};

#[derive(Parser, Debug)]
#[command(name = "ragbot", about = "Answer questions from your ingested documents")]
struct Args {
    /// Ask a single question
    #[arg(short, long)]
    query: Option<String>,

    /// Prompt for questions until `quit`
    #[arg(short, long)]
    interactive: bool,

    /// Index (Pinecone) or table (LanceDB) name
    #[arg(long)]
    index: Option<String>,
}

fn print_response(resp: &ChatResponse) {
    println!("\n🤖 {}", resp.answer);
    if !resp.sources.is_empty() {
        println!("\n📚 Sources:");
        for (i, s) in resp.sources.iter().enumerate() {
            println!("  {}. {} (chunk {}, score {:.3})", i + 1, s.source, s.chunk_index, s.score);
        }
    }
}

async fn interactive(bot: &RagChatbot) -> anyhow::Result<()> {
    println!("💬 RAG chatbot ready. Type 'quit', 'exit' or 'q' to leave.");
    let stdin = io::stdin();
    loop {
        print!("\n❓ You: ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 { break; }
        let query = line.trim();
        if query.is_empty() { continue; }
        if matches!(query.to_lowercase().as_str(), "quit" | "exit" | "q") { break; }
        match bot.chat(query).await {
            Ok(resp) => print_response(&resp),
            Err(e) => eprintln!("❌ Error: {}", e),
        }
    }
    println!("👋 Goodbye!");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    let mut settings = load_settings()?;
    override_index(&mut settings, args.index.as_deref());

    let (embedder, store) = open_backends(&settings).await?;
    let bot = build_chatbot(&settings, embedder, store)?;

    if let Some(query) = &args.query {
        println!("❓ {}", query);
        print_response(&bot.chat(query).await?);
    } else if args.interactive {
        interactive(&bot).await?;
    } else {
        eprintln!("Usage: ragbot --query \"<question>\" | --interactive [--index <name>]");
        std::process::exit(2);
    }
    Ok(())
}
