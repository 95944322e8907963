use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::app_config::Config;
use crate::archive::EpubArchive;
use crate::database::{DatabaseConnection, Repository};
use crate::events::{EventLog, LogEntry};
use crate::file_utils::FileManager;
use crate::pipeline::{ChunkTally, Pipeline, PipelineSettings, build_translator};
use crate::providers::{self, Provider};
use crate::store::{StateStore, StoreStats};

// @module: Application controller for book translation

/// File the run issues are appended to, next to the output
pub const ISSUES_LOG_FILE: &str = "epubtrans.issues.log";

/// What happened to one input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The book was translated and written to `output_path`
    Translated { output_path: PathBuf, chunks: ChunkTally },
    /// An output already existed and overwriting was not requested
    Skipped { output_path: PathBuf },
}

/// Counters of a folder run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Main application controller for book translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Durable progress and chunk state
    store: Arc<Repository>,
    // @field: Remote translation service
    provider: Arc<dyn Provider>,
    // @field: Progress bars of the current invocation
    multi_progress: MultiProgress,
}

impl Controller {
    // @method: Create a controller over the configured database
    pub fn with_config(config: Config) -> Result<Self> {
        let connection = match &config.storage.database_path {
            Some(path) => DatabaseConnection::open(path)?,
            None => DatabaseConnection::open_default()?,
        };
        info!("Using translation state at {:?}", connection.path());
        Ok(Self::with_store(config, Arc::new(Repository::new(connection))))
    }

    // @method: Create a controller over an existing store
    pub fn with_store(config: Config, store: Arc<Repository>) -> Self {
        let provider = providers::from_config(&config.translation);
        Self {
            config,
            store,
            provider,
            multi_progress: MultiProgress::new(),
        }
    }

    /// Replace the translation provider
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Translate one book into `output_dir`
    pub async fn run(&self, input_file: PathBuf, output_dir: PathBuf, force_overwrite: bool) -> Result<FileOutcome> {
        let start_time = Instant::now();

        if !FileManager::file_exists(&input_file) {
            return Err(anyhow::anyhow!("Input file does not exist: {:?}", input_file));
        }

        FileManager::ensure_dir(&output_dir)?;

        let output_path = FileManager::generate_output_path(&input_file, &output_dir, &self.config.target_language);
        if output_path.exists() && !force_overwrite {
            warn!(
                "Skipping {:?}, translation already exists (use -f to force overwrite)",
                input_file
            );
            return Ok(FileOutcome::Skipped { output_path });
        }

        let document_name = input_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| input_file.to_string_lossy().to_string());

        let mut archive = EpubArchive::open(&input_file)
            .with_context(|| format!("Failed to open book: {:?}", input_file))?;
        info!(
            "Translating {} ({} chapters) from {} to {}",
            document_name,
            archive.chapter_count(),
            self.config.source_language,
            self.config.target_language
        );

        let events = EventLog::new();
        let progress_bar = self.chapter_progress_bar();
        let bar = progress_bar.clone();

        let translator = build_translator(&self.config, self.provider.clone(), events.clone())?;
        let pipeline = Pipeline::new(
            translator,
            self.store.clone(),
            PipelineSettings::from_config(&self.config),
            events.clone(),
        )
        .with_progress(move |percent, status| {
            bar.set_position(u64::from(percent));
            bar.set_message(status.to_string());
        });

        let result = pipeline.run(&mut archive, &document_name).await;

        let issues = events.issues();
        if !issues.is_empty() {
            let log_path = output_dir.join(ISSUES_LOG_FILE);
            match Self::write_issues(&issues, &log_path, &document_name) {
                Ok(()) => warn!("{} issue(s) written to {:?}", issues.len(), log_path),
                Err(e) => warn!("Failed to write issues log: {}", e),
            }
        }

        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                progress_bar.abandon_with_message("Translation aborted");
                return Err(e).with_context(|| format!("Failed to translate {}", document_name));
            }
        };

        FileManager::write_bytes_atomic(&output_path, &summary.artifact)?;
        progress_bar.finish_with_message("Translation complete");

        info!(
            "Wrote {:?} in {} ({} chunks: {} translated, {} cached, {} untranslated)",
            output_path,
            Self::format_duration(start_time.elapsed()),
            summary.chunks.total(),
            summary.chunks.translated,
            summary.chunks.cached,
            summary.chunks.fallbacks
        );

        Ok(FileOutcome::Translated {
            output_path,
            chunks: summary.chunks,
        })
    }

    /// Run the workflow in folder mode, processing every book in a directory
    /// Books that already have a translation are skipped
    pub async fn run_folder(&self, input_dir: PathBuf, force_overwrite: bool) -> Result<FolderSummary> {
        let start_time = Instant::now();

        if !FileManager::dir_exists(&input_dir) {
            return Err(anyhow::anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let books: Vec<PathBuf> = FileManager::find_files(&input_dir, "epub")?
            .into_iter()
            .filter(|path| !FileManager::is_translated_output(path, &self.config.target_language))
            .collect();

        if books.is_empty() {
            return Err(anyhow::anyhow!("No EPUB files found in directory: {:?}", input_dir));
        }

        let folder_pb = self.multi_progress.add(ProgressBar::new(books.len() as u64));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} books ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        folder_pb.set_style(style.progress_chars("█▓▒░"));

        let mut summary = FolderSummary::default();

        for book in &books {
            let file_name = book
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            let output_dir = book.parent().map(Path::to_path_buf).unwrap_or_else(|| input_dir.clone());

            match self.run(book.clone(), output_dir, force_overwrite).await {
                Ok(FileOutcome::Translated { .. }) => summary.processed += 1,
                Ok(FileOutcome::Skipped { .. }) => summary.skipped += 1,
                Err(e) => {
                    error!("Error processing {}: {:#}", file_name, e);
                    summary.failed += 1;
                }
            }

            folder_pb.inc(1);
        }

        folder_pb.finish_with_message("Folder processing complete");

        let summary_message = format!(
            "Folder processing completed: {} processed, {} skipped, {} errors - Duration: {}",
            summary.processed,
            summary.skipped,
            summary.failed,
            Self::format_duration(start_time.elapsed())
        );
        info!("{}", summary_message);

        if let Err(e) = FileManager::append_to_log_file(input_dir.join(ISSUES_LOG_FILE), &summary_message) {
            warn!("Failed to write folder summary: {}", e);
        }

        Ok(summary)
    }

    /// Remove the progress record and every cached chunk
    pub async fn clear_state(&self) -> Result<()> {
        self.store.clear_all().await?;
        info!("Cleared all translation progress and cached chunks");
        Ok(())
    }

    /// Summary of the persisted state
    pub async fn stats(&self) -> Result<StoreStats> {
        self.store.stats().await
    }

    fn chapter_progress_bar(&self) -> ProgressBar {
        let pb = self.multi_progress.add(ProgressBar::new(100));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style.progress_chars("█▓▒░"));
        pb
    }

    /// Append the warnings and errors of a run to the issues log
    fn write_issues(issues: &[LogEntry], path: &Path, document_name: &str) -> Result<()> {
        FileManager::append_to_log_file(path, &format!("Translation issues - {}", document_name))?;
        for entry in issues {
            FileManager::append_to_log_file(path, &entry.to_string())?;
        }
        Ok(())
    }

    // @formats: Duration as "1h 2m 3s", "2m 3s" or "3.250s"
    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
