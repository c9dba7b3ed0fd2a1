use std::io::{self, Write};

use serde::Serialize;

use crate::domain::RetrievalAction;
use crate::retriever::{ClearResult, InfoResult, ListResult, Retrieval};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &Retrieval) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_info(result: &InfoResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_clear(result: &ClearResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn fetch_line(result: &Retrieval) -> String {
        match result.action {
            RetrievalAction::Download => format!("Downloaded files to: {}", result.path),
            RetrievalAction::Cache => format!("Using cached files at: {}", result.path),
        }
    }

    pub fn print_fetch(result: &Retrieval) {
        println!("{}", Self::fetch_line(result));
    }

    pub fn print_list(result: &ListResult) {
        if result.datasets.is_empty() {
            println!("No gold datasets cached under {}", result.cache_root);
            return;
        }
        for dataset in &result.datasets {
            println!(
                "{}\t{} files\t{}",
                dataset.id,
                dataset.files,
                dataset.modified.as_deref().unwrap_or("-")
            );
        }
    }

    pub fn print_info(result: &InfoResult) {
        println!("{} ({})", result.dataset_id, result.path);
        for file in &result.files {
            println!("  {file}");
        }
    }

    pub fn print_clear(result: &ClearResult) {
        if result.cleared {
            println!("Removed {}", result.target);
        } else {
            println!("Nothing to remove at {}", result.target);
        }
    }
}
