use anyhow::Result;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use muse::models::Message;

pub fn ensure_session_dir() -> Result<PathBuf> {
    let home_dir =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    let config_dir = home_dir.join(".config").join("muse").join("sessions");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn session_path(name: &str) -> Result<PathBuf> {
    Ok(ensure_session_dir()?.join(format!("{}.jsonl", name)))
}

/// One JSON-encoded message per line.
pub fn persist_messages(session_file: &Path, messages: &[Message]) -> Result<()> {
    let file = File::create(session_file)?;
    let mut writer = std::io::BufWriter::new(file);

    for message in messages {
        serde_json::to_writer(&mut writer, &message)?;
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn load_messages(session_file: &Path) -> Result<Vec<Message>> {
    if !session_file.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(session_file)?);
    let mut messages = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        messages.push(serde_json::from_str(&line)?);
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("chat.jsonl");

        let messages = vec![Message::user("hello"), Message::assistant("hi there")];
        persist_messages(&path, &messages)?;

        let loaded = load_messages(&path)?;
        assert_eq!(loaded, messages);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_empty_session() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("never-written.jsonl");
        assert!(load_messages(&path)?.is_empty());
        Ok(())
    }
}
