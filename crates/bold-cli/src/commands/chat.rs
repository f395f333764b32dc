use anyhow::Result;
use bold::consumer::{AskClient, AskHandle};
use bold::models::message::Message;
use bold::models::role::Role;
use bold::session::ChatSession;
use cliclack::input;
use console::style;
use std::io::{self, Write};

pub async fn execute(endpoint: String, video: String, subdomain: String) -> Result<()> {
    let client = AskClient::new(endpoint, video.clone(), subdomain)?;
    let mut session = ChatSession::new();

    cliclack::intro(style(format!(" bold chat: {} ", video)).on_cyan().black())?;
    println!("{}", style("type \"exit\" to end the session").dim());

    loop {
        let question: String = input("Question:").placeholder("").interact()?;
        if question.trim().eq_ignore_ascii_case("exit") {
            break;
        }

        let mut updates = session.subscribe();
        let mut printed = 0;
        let handle = AskHandle::new();
        let turn = session.ask(&client, &question, &handle);
        tokio::pin!(turn);

        loop {
            tokio::select! {
                _ = &mut turn => break,
                Ok(()) = updates.changed() => {
                    printed = echo(&updates.borrow_and_update(), printed);
                }
                _ = tokio::signal::ctrl_c() => {
                    handle.abort();
                }
            }
        }
        // The failure message lands in the transcript after the last chunk
        echo(&updates.borrow_and_update(), printed);
        println!("\n");
    }

    cliclack::outro("bye")?;
    Ok(())
}

/// Print the part of the current answer not shown yet, returning the new length
fn echo(messages: &[Message], printed: usize) -> usize {
    let Some(last) = messages.last().filter(|last| last.role == Role::Assistant) else {
        return printed;
    };
    if let Some(delta) = new_text(&last.content, printed) {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(delta.as_bytes());
        let _ = stdout.flush();
    }
    last.content.len()
}

// Answers only grow, except when a failure replaces the empty placeholder
fn new_text(text: &str, printed: usize) -> Option<&str> {
    text.get(printed..).filter(|delta| !delta.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_text() {
        assert_eq!(new_text("This video", 5), Some("video"));
        assert_eq!(new_text("This", 4), None);
        assert_eq!(
            new_text("Error: boom. Please try again.", 0),
            Some("Error: boom. Please try again.")
        );
    }

    #[test]
    fn test_echo_skips_user_messages() {
        let messages = vec![Message::user("What is this about?")];
        assert_eq!(echo(&messages, 0), 0);

        let messages = vec![Message::user("q"), Message::assistant("abc")];
        assert_eq!(echo(&messages, 1), 3);
    }
}
