use anyhow::Result;
use cliclack::{input, spinner};
use console::style;
use std::path::PathBuf;

use muse::conversation::Conversation;
use muse::engine::{Engine, ReasoningMode};
use muse::models::Role;
use muse::protocol::clean_display;

use crate::session_file::persist_messages;

pub struct Session {
    engine: Engine,
    conversation: Conversation,
    session_file: PathBuf,
    mode: ReasoningMode,
}

impl Session {
    pub fn new(engine: Engine, conversation: Conversation, session_file: PathBuf) -> Self {
        Session {
            engine,
            conversation,
            session_file,
            mode: ReasoningMode::Normal,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        println!(
            "muse {}",
            style("- /regenerate, /mode <normal|search|deep>, /quit").dim()
        );

        for message in self.conversation.messages() {
            render(message.role, &message.content);
        }

        loop {
            let line: String = input("You:").placeholder("").interact()?;
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }

            match line.as_str() {
                "/quit" | "/exit" => break,
                "/regenerate" => {
                    let spin = spinner();
                    spin.start("regenerating");
                    let id = self.engine.regenerate(&mut self.conversation, self.mode).await;
                    spin.stop("");
                    match id.and_then(|id| self.conversation.get(id)) {
                        Some(message) => render(message.role, &message.content),
                        None => println!("{}", style("Nothing to regenerate.").dim()),
                    }
                }
                _ if line.starts_with("/mode") => {
                    self.mode = match line.trim_start_matches("/mode").trim() {
                        "search" => ReasoningMode::Search,
                        "deep" => ReasoningMode::Deep,
                        _ => ReasoningMode::Normal,
                    };
                    println!("{}", style(format!("mode set to {:?}", self.mode)).dim());
                    continue;
                }
                _ => {
                    let spin = spinner();
                    spin.start("thinking");
                    let id = self.engine.respond(&mut self.conversation, &line, self.mode).await;
                    spin.stop("");
                    if let Some(message) = self.conversation.get(id) {
                        render(message.role, &message.content);
                    }
                }
            }

            persist_messages(&self.session_file, self.conversation.messages())?;
        }

        persist_messages(&self.session_file, self.conversation.messages())?;
        Ok(())
    }
}

fn render(role: Role, content: &str) {
    let cleaned = clean_display(content);
    match role {
        Role::User => println!("{} {}", style("you >").cyan().bold(), cleaned),
        Role::Assistant => println!("{} {}", style("muse >").magenta().bold(), cleaned),
    }
}
