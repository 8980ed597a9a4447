//! `mercy chat`: interactive or single-message terminal chat.
//!
//! Every line is attributed to the local user, so commands such as
//! `/save` and `/tasks` work here the same way they do on Telegram.

use mercy_channels::CliChannel;
use mercy_channels::cli::LOCAL_USER_ID;
use mercy_core::channel::Channel;
use std::io::Write;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let (config, router) = super::build_router().await?;

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let reply = router.handle(LOCAL_USER_ID, &msg).await;
        eprint!("\r              \r");
        println!("{reply}");
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Mercy: your companion, in a shell      ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Name:      {}", config.bot.name);
    println!("  Model:     {}", config.ollama.model);
    println!("  Ollama:    {}", config.ollama.url);
    println!("  Database:  {}", config.storage.database_path().display());
    println!();
    println!("  Type your message and press Enter. /help lists commands.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let channel = CliChannel::new();
    let mut rx = channel.start().await.map_err(|e| format!("Channel error: {e}"))?;

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(result) = rx.recv().await {
        match result {
            Ok(chan_msg) => {
                eprint!("  ...");
                let reply = router.handle(&chan_msg.sender_id, &chan_msg.content).await;
                eprint!("\r     \r");
                println!();
                for line in reply.lines() {
                    println!("  {} > {line}", config.bot.name);
                }
                println!();

                print!("  You > ");
                std::io::stdout().flush()?;
            }
            Err(e) => {
                eprintln!("  [Channel Error] {e}");
                break;
            }
        }
    }

    println!();
    println!("  Take care! 💜");
    println!();

    Ok(())
}
