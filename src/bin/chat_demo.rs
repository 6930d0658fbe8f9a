//! Demo that plays a scripted conversation through the chat service
//! (fixed sentiments, canned replies; no network).

use std::sync::Arc;

use review_sentiment_desk::chat::Sender;
use review_sentiment_desk::chat_service::ChatService;
use review_sentiment_desk::knowledge::KnowledgeBase;
use review_sentiment_desk::responder::{CannedResponder, SafeResponder};
use review_sentiment_desk::sentiment::{ScriptedClassifier, Sentiment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let script = [
        ("What is your return policy?", Sentiment::Neutral),
        ("The blender arrived cracked.", Sentiment::Negative),
        ("Thanks, the warranty info helps.", Sentiment::Positive),
        ("Now the replacement is broken too.", Sentiment::Negative),
        ("This is unacceptable, I want a human.", Sentiment::Negative),
        ("Hello? Anyone there?", Sentiment::Neutral),
    ];

    let classifier = Arc::new(ScriptedClassifier::new(script.iter().map(|(_, s)| *s)));
    let chat = ChatService::new(
        classifier,
        SafeResponder::new(Arc::new(CannedResponder)),
        Arc::new(KnowledgeBase::default()),
    );

    for (text, _) in script {
        let report = chat.submit(None, text).await?;
        println!(
            "> {text:<42} {:<9} streak={} escalated={}",
            report.outcome.label(),
            report.state.negative_streak,
            report.state.escalated,
        );
    }

    println!("\n--- transcript ---");
    for turn in chat.snapshot(None).await?.turns {
        let who = match turn.sender {
            Sender::User => "user",
            Sender::Bot => "bot ",
        };
        match turn.status {
            Some(s) => println!("[{who}] {} ({s})", turn.message),
            None => println!("[{who}] {}", turn.message),
        }
    }

    println!("chat-demo done");
    Ok(())
}
