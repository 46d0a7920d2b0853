//! Event rendering.
//!
//! Turns the engine's event stream into terminal output, standing in for the
//! web front-end's forms, tables and progress bar. Fetched artifacts are
//! written under the output directory. The completion and failure cues of
//! the original client map to the terminal bell.

use simflex_core::{ClientEvent, ServerStatus};
use std::io;
use std::path::{Path, PathBuf};

const BELL: &str = "\x07";

pub struct Renderer {
    json: bool,
    out_dir: PathBuf,
    /// Last rendered activity line, to keep the 1 Hz status poll quiet when
    /// nothing changed.
    last_activity: Option<String>,
}

impl Renderer {
    pub fn new(json: bool, out_dir: PathBuf) -> Self {
        Renderer {
            json,
            out_dir,
            last_activity: None,
        }
    }

    pub fn render(&mut self, event: &ClientEvent) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(error) => eprintln!("failed to serialize event: {error}"),
            }
            return;
        }
        match event {
            ClientEvent::Connected => println!("connected"),
            ClientEvent::Disconnected => {
                self.last_activity = None;
                println!("disconnected, server status unknown");
            }
            ClientEvent::ConnectFailed { message } => println!("connection failed: {message}"),
            ClientEvent::TransportError { message } => {
                self.last_activity = None;
                println!("connection error: {message}");
            }
            ClientEvent::UnexpectedMessage { preview } => {
                println!("unexpected message received:\n\t{preview}");
            }
            ClientEvent::InstanceList { records } => {
                println!("instances:");
                println!("  New...");
                for record in records {
                    println!("  {}", record.display_label());
                }
            }
            ClientEvent::BlankInstanceLoaded => println!("blank instance template loaded"),
            ClientEvent::InstanceFetched { hash, data } => {
                match self.write_artifact(&format!("{hash}.xml"), data) {
                    Ok(path) => println!("instance \"{hash}\" written to {}", path.display()),
                    Err(error) => println!("could not write instance \"{hash}\": {error}"),
                }
            }
            ClientEvent::InstanceNotFound { hash, message } => {
                println!("instance \"{hash}\" not found: {message}");
            }
            ClientEvent::InstanceDeleted { hash } => println!("instance \"{hash}\" deleted"),
            ClientEvent::InstanceReset { hash } => println!("instance \"{hash}\" reset"),
            ClientEvent::InstanceGenerated { hash } => {
                println!("instance generated: \"{hash}\"");
            }
            ClientEvent::SimulationProgress {
                hash,
                progress,
                advanced,
            } => {
                if *advanced {
                    println!("simulation of \"{hash}\": {:.2} %", progress * 100.0);
                }
            }
            ClientEvent::SimulationCompleted { hash } => {
                println!("instance \"{hash}\" simulated{BELL}");
            }
            ClientEvent::SimulationFailed { hash, message } => {
                println!("simulation of \"{hash}\" failed: {message}{BELL}");
            }
            ClientEvent::RunDetached { hash } => {
                println!("detached from the simulation of \"{hash}\"; it keeps running server-side");
            }
            ClientEvent::DailyResult { hash, day, data } => {
                match self.write_artifact(&format!("result-{hash}-d{day}.zip"), data) {
                    Ok(path) => println!("daily result written to {}", path.display()),
                    Err(error) => println!("could not write daily result: {error}"),
                }
            }
            ClientEvent::GlobalResults { hash, data } => {
                match self.write_artifact(&format!("globalResults-{hash}.xml"), data) {
                    Ok(path) => println!("global results written to {}", path.display()),
                    Err(error) => println!("could not write global results: {error}"),
                }
            }
            ClientEvent::ServerActivity { status } => self.render_activity(status),
            ClientEvent::OperationFailed { operation, message } => {
                println!("{operation} failed:\n\t{message}");
            }
        }
    }

    fn render_activity(&mut self, status: &ServerStatus) {
        let line = match status {
            ServerStatus::Computing {
                progress,
                queued_jobs,
                ..
            } => format!(
                "server computing: {:.2} %, {queued_jobs} queued job(s)",
                progress * 100.0
            ),
            ServerStatus::Waiting => "server waiting for simulation requests".to_string(),
        };
        // Re-print only on change, or when the progression advanced.
        let advanced = matches!(status, ServerStatus::Computing { advanced: true, .. });
        if advanced || self.last_activity.as_deref() != Some(line.as_str()) {
            println!("{line}");
            self.last_activity = Some(line);
        }
    }

    fn write_artifact(&self, name: &str, data: &[u8]) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(name);
        std::fs::write(&path, data)?;
        Ok(path)
    }
}

/// Read an instance parameter document for the `generate` command.
pub fn read_document(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|error| anyhow::anyhow!("could not read {}: {error}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_artifacts_are_written_under_the_output_dir() {
        let dir = TempDir::new().unwrap();
        let mut renderer = Renderer::new(false, dir.path().to_path_buf());
        renderer.render(&ClientEvent::DailyResult {
            hash: "ab12cd34".into(),
            day: 3,
            data: vec![1u8, 2, 3].into(),
        });
        let written = std::fs::read(dir.path().join("result-ab12cd34-d3.zip")).unwrap();
        assert_eq!(written, vec![1, 2, 3]);
    }

    #[test]
    fn test_global_results_filename() {
        let dir = TempDir::new().unwrap();
        let mut renderer = Renderer::new(false, dir.path().to_path_buf());
        renderer.render(&ClientEvent::GlobalResults {
            hash: "ab12cd34".into(),
            data: b"<xml/>".to_vec().into(),
        });
        assert!(dir.path().join("globalResults-ab12cd34.xml").exists());
    }

    #[test]
    fn test_read_document_missing_file() {
        let result = read_document(Path::new("/definitely/not/here.xml"));
        assert!(result.is_err());
    }
}
