use anyhow::{bail, Result};
use bold::consumer::{AskClient, AskHandle, AskState};
use bold::models::message::Message;
use console::style;
use std::io::{self, Write};

pub async fn execute(
    endpoint: String,
    video: String,
    subdomain: String,
    question: String,
) -> Result<()> {
    let client = AskClient::new(endpoint, video, subdomain)?;
    let handle = AskHandle::new();

    let mut stdout = io::stdout();
    let mut sink = |chunk: &str| {
        let _ = stdout.write_all(chunk.as_bytes());
        let _ = stdout.flush();
    };

    let history = history(&question);
    let answer = client.ask(question.trim(), &history, &handle, &mut sink);
    tokio::pin!(answer);

    // Ctrl-C stops the answer but still lets the request settle
    let result = tokio::select! {
        result = &mut answer => result,
        _ = tokio::signal::ctrl_c() => {
            handle.abort();
            answer.await
        }
    };
    println!();

    match result? {
        AskState::Completed => Ok(()),
        AskState::Cancelled => {
            eprintln!("{}", style("answer cancelled").dim());
            Ok(())
        }
        state => bail!("answer ended in state {:?}", state),
    }
}

// Same wire shape as a chat turn: the history ends with the question
fn history(question: &str) -> Vec<Message> {
    vec![Message::user(question.trim())]
}
