//! `parley ask`: One-shot question.

use parley_core::message::ConversationId;

pub async fn run(message: String, user: String) -> Result<(), Box<dyn std::error::Error>> {
    let (_, engine) = super::build_engine()?;

    eprint!("  Thinking...");
    let reply = engine
        .respond(&ConversationId::new(), &user, &message)
        .await;
    eprint!("\r              \r");
    println!("{reply}");

    Ok(())
}
