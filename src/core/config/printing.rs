use crate::core::config::data::Config;
use std::io::{self, Write};

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

impl Config {
    pub fn print_all(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.write_summary(&mut out)
    }

    pub fn write_summary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Current configuration:")?;
        writeln!(out, "  backend-url: {}", self.backend_url())?;
        writeln!(out, "  bind: {}", self.bind_address())?;
        writeln!(out, "  relay-url: {}", self.relay_url())?;
        writeln!(out, "  upstream: {}", self.upstream().as_str())?;
        writeln!(out, "  openai:")?;
        writeln!(out, "    base-url: {}", self.openai.base_url())?;
        match &self.openai.api_key {
            Some(key) => writeln!(out, "    api-key: {}", mask_secret(key))?,
            None => writeln!(out, "    api-key: (unset)")?,
        }
        match &self.openai.model {
            Some(model) => writeln!(out, "    model: {model}")?,
            None => writeln!(out, "    model: (unset)")?,
        }
        writeln!(out, "    max-tokens: {}", self.openai.max_tokens())?;
        writeln!(out, "    temperature: {}", self.openai.temperature())?;
        writeln!(out, "    top-p: {}", self.openai.top_p())?;
        Ok(())
    }
}
