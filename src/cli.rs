// SPDX-License-Identifier: GPL-3.0-only

//! Headless CLI commands
//!
//! - Listing available cameras
//! - Camera scanning without the terminal UI
//! - Decoding an image file or a manual entry
//! - Remote store health check and config delivery

use paxibox::Config;
use paxibox::capture::{FrameScanner, NoLayout, enumerate_cameras};
use paxibox::decoder::DecoderAdapter;
use paxibox::constants::{file_formats, messages};
use paxibox::errors::{AppError, AppResult, CaptureError, ConfigError, DecodeError};
use paxibox::intake::{Confirmation, InputNormalizer, ScanEvent, ScanSource};
use paxibox::remote::{ConfigDelivery, ConnectionReport, RemoteLogger};
use paxibox::session::{
    Collaborators, DismissReason, KioskView, Session, SessionHandle, SessionSettings, SessionView,
    Tab,
};
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::warn;

type CliResult = AppResult<()>;

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

/// List all available cameras
pub fn list_cameras() -> CliResult {
    let cameras = enumerate_cameras()?;

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        println!("      Path: {}", camera.path);
        if let Some(location) = &camera.location {
            println!("      Location: {}", location);
        }
    }

    Ok(())
}

/// Prints session output to the console
///
/// Confirmations are dismissed straight away so scanning resumes after the
/// settle delay; with `once` the first one ends the session instead.
struct ConsoleView {
    once: bool,
    handle: OnceLock<SessionHandle>,
}

impl ConsoleView {
    fn with_handle(&self, f: impl FnOnce(&SessionHandle)) {
        if let Some(handle) = self.handle.get() {
            f(handle);
        }
    }
}

impl KioskView for ConsoleView {
    fn show_view(&self, view: SessionView, _tab: Tab) {
        if view == SessionView::Scanning {
            println!("Scanning... (press Ctrl+C to stop)");
        }
    }

    fn show_confirmation(&self, confirmation: &Confirmation) {
        print_confirmation(confirmation);
        if self.once {
            self.with_handle(|h| {
                h.shutdown();
            });
        } else {
            self.with_handle(|h| {
                h.dismiss(DismissReason::CloseButton);
            });
        }
    }

    fn hide_confirmation(&self) {}

    fn camera_started(&self, device: &str) {
        println!("Using camera: {}", device);
    }

    fn show_camera_retry(&self, error: &CaptureError) {
        eprintln!("Camera unavailable: {}", error);
        self.with_handle(|h| {
            h.shutdown();
        });
    }

    fn notify(&self, message: &str) {
        println!("{}", message);
    }

    fn connection_report(&self, report: &ConnectionReport) {
        print_report(report);
    }
}

/// Scan with the camera until interrupted (or the first code with `once`)
pub fn scan(config: Config, once: bool) -> CliResult {
    let runtime = runtime()?;

    runtime.block_on(async move {
        let logger = RemoteLogger::from_config(config.resolve_firebase().await.as_ref());
        let view = Arc::new(ConsoleView {
            once,
            handle: OnceLock::new(),
        });
        let parts = Collaborators::from_config(&config, Arc::new(NoLayout), logger, view.clone());
        let session = Session::create(SessionSettings::from(&config), parts);

        let handle = session.handle();
        let _ = view.handle.set(handle.clone());

        ctrlc::set_handler(move || {
            println!();
            println!("Stopping...");
            handle.shutdown();
        })
        .map_err(|e| AppError::Other(format!("Failed to install Ctrl+C handler: {}", e)))?;

        session.run().await;
        Ok::<(), AppError>(())
    })
}

/// Decode the first code in an image file
pub fn decode(config: Config, image_path: &Path, log: bool) -> CliResult {
    let supported = image_path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(file_formats::is_image_extension);
    if !supported {
        return Err(AppError::Other(messages::UNSUPPORTED_IMAGE.to_string()));
    }
    let runtime = runtime()?;

    runtime.block_on(async move {
        let owned = image_path.to_path_buf();
        let image = tokio::task::spawn_blocking(move || image::open(&owned))
            .await
            .map_err(|e| DecodeError::Image(e.to_string()))?
            .map_err(|e| DecodeError::Image(e.to_string()))?;

        let decoder = DecoderAdapter::platform_default(
            config.decoder.prefer_native,
            config.decoder.max_dimension,
        );
        let mut scanner = FrameScanner::new(decoder);
        let Some(code) = scanner.scan_image(&image).await.into_iter().next() else {
            println!("{}", messages::NO_CODE_IN_IMAGE);
            return Ok::<(), AppError>(());
        };

        let meta = json!({
            "file": image_path.file_name().map(|n| n.to_string_lossy().into_owned()),
            "decoder": scanner.decoder_kind().as_str(),
        });
        let event = InputNormalizer::new(config.min_code_len).normalize_with_meta(
            &code,
            ScanSource::File,
            Some(meta),
        );
        print_confirmation(&Confirmation::for_event(&event));

        if log {
            log_event(&config, &event).await;
        }
        Ok(())
    })
}

/// Validate and confirm a manual entry
pub fn manual(config: Config, resi: &str, recipient: &str, log: bool) -> CliResult {
    let event = InputNormalizer::new(config.min_code_len).normalize_manual(resi, recipient)?;
    print_confirmation(&Confirmation::for_event(&event));

    if log {
        runtime()?.block_on(log_event(&config, &event));
    }
    Ok(())
}

/// Write a health-check entry and print the report
pub fn test_connection(config: Config, timeout_ms: Option<u64>) -> CliResult {
    let timeout = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.health_timeout());

    let report = runtime()?.block_on(async move {
        let logger = RemoteLogger::from_config(config.resolve_firebase().await.as_ref());
        logger.test_connection(timeout).await
    });

    print_report(&report);
    if report.ok {
        Ok(())
    } else {
        Err(AppError::Other(
            report
                .error
                .unwrap_or_else(|| "connection test failed".to_string()),
        ))
    }
}

/// Print the config delivery response built from the environment
pub fn print_config(check: bool) -> CliResult {
    let response = ConfigDelivery::respond_from_env("GET");

    println!("Status: {}", response.status);
    for (name, value) in &response.headers {
        println!("{}: {}", name, value);
    }
    println!();
    let body = serde_json::to_string_pretty(&response.body)
        .map_err(|e| ConfigError::Parse(e.to_string()))?;
    println!("{}", body);

    if check && response.status != 200 {
        return Err(ConfigError::Delivery(format!("answered {}", response.status)).into());
    }
    Ok(())
}

async fn log_event(config: &Config, event: &ScanEvent) {
    let logger = RemoteLogger::from_config(config.resolve_firebase().await.as_ref());
    if !logger.is_enabled() {
        println!("Remote logging is not configured.");
        return;
    }
    match logger.log_scan(event, config.log_timeout()).await {
        Ok(receipt) => {
            if let Some(key) = receipt.scan_key {
                println!("Logged: {}", key);
            }
        }
        Err(e) => {
            warn!(error = %e, "Scan not logged");
            println!("Not logged: {}", e);
        }
    }
}

fn print_confirmation(confirmation: &Confirmation) {
    let mark = if confirmation.success { "✓" } else { "✗" };
    println!();
    println!("{} {}", mark, confirmation.title);
    println!("  {}", confirmation.message);
    println!("  Code: {}", confirmation.payload);
    println!("  Source: {}", confirmation.source);
}

fn print_report(report: &ConnectionReport) {
    match (report.ok, &report.id, &report.error) {
        (true, Some(id), _) => println!("Connection OK (id: {})", id),
        (true, None, _) => println!("Connection OK"),
        (false, _, Some(error)) => println!("Connection failed: {}", error),
        (false, _, None) => println!("Connection failed"),
    }
}
