//! One model turn end to end: generate, parse, apply, persist.

use crate::action::{run_batch, BatchOptions, BatchReport};
use crate::error::AppError;
use crate::grid::Sheet;
use crate::prompt::render_tables;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// In-flight guard allowing one batch at a time.
///
/// A second caller is rejected with [`AppError::Busy`], never queued.
#[derive(Debug, Default)]
pub struct BatchGate {
    busy: AtomicBool,
}

/// Held while a batch runs; dropping it reopens the gate.
#[derive(Debug)]
pub struct BatchPermit<'a> {
    gate: &'a BatchGate,
}

impl BatchGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate.
    ///
    /// # Errors
    /// Returns [`AppError::Busy`] while another permit is alive.
    pub fn try_begin(&self) -> Result<BatchPermit<'_>, AppError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| BatchPermit { gate: self })
            .map_err(|_| AppError::Busy("another edit batch is in progress".to_string()))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for BatchPermit<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

/// Result of one generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Text(String),
    /// The provider stopped on the user's request.
    Suspended,
}

/// Language model backend producing edit text.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a reply for `system` and `user` prompts.
    ///
    /// # Errors
    /// Returns [`AppError::Generation`] when the provider call fails.
    async fn generate(&self, system: &str, user: &str) -> Result<Generation, AppError>;
}

/// Durable store for sheet snapshots keyed by turn.
pub trait SheetPersistence: Send + Sync {
    /// Store `sheet` as of `turn_id`.
    ///
    /// # Errors
    /// Returns an [`AppError`] when the snapshot cannot be written.
    fn save(&self, turn_id: u64, sheet: &Sheet) -> Result<(), AppError>;

    /// Load the snapshot of `sheet_uid` stored at `turn_id`.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when no such snapshot exists.
    fn load(&self, turn_id: u64, sheet_uid: &str) -> Result<Sheet, AppError>;
}

/// Inputs of one rebuild.
#[derive(Debug, Clone)]
pub struct RebuildRequest {
    /// Turn the resulting snapshots are saved under.
    pub turn_id: u64,
    /// Instructions placed before the rendered tables.
    pub instructions: String,
    pub user_prompt: String,
    pub options: BatchOptions,
}

/// How a rebuild ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// Cancelled before parsing; no sheet was touched.
    Cancelled,
    Applied {
        report: BatchReport,
        /// Persistence failures; the in-memory sheets keep the batch.
        warnings: Vec<String>,
    },
}

/// Ask the model for edits to `sheets`, apply them, and save every sheet.
///
/// Cancellation through `cancel` or a [`Generation::Suspended`] reply returns
/// [`RebuildOutcome::Cancelled`] before any parsing happens.
///
/// # Errors
/// Returns [`AppError::Busy`] when `gate` is held, [`AppError::Generation`] when
/// the client fails, and [`AppError::Parse`] or [`AppError::Validation`] when the
/// reply is rejected as a whole.
pub async fn rebuild<C, P>(
    gate: &BatchGate,
    client: &C,
    store: &P,
    request: &RebuildRequest,
    sheets: &mut [Sheet],
    cancel: &CancellationToken,
) -> Result<RebuildOutcome, AppError>
where
    C: LlmClient + ?Sized,
    P: SheetPersistence + ?Sized,
{
    let _permit = gate.try_begin()?;
    let system = format!("{}\n\n{}", request.instructions, render_tables(sheets));

    let generation = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        generation = client.generate(&system, &request.user_prompt) => Some(generation?),
    };
    let text = match generation {
        Some(Generation::Text(text)) if !cancel.is_cancelled() => text,
        _ => {
            tracing::info!(turn = request.turn_id, "rebuild cancelled before parsing");
            return Ok(RebuildOutcome::Cancelled);
        }
    };

    let report = run_batch(&text, sheets, request.options)?;

    let mut warnings = Vec::new();
    for sheet in sheets.iter() {
        if let Err(err) = store.save(request.turn_id, sheet) {
            tracing::warn!(
                sheet = %sheet.uid,
                turn = request.turn_id,
                error = %err,
                "failed to persist sheet after batch"
            );
            warnings.push(format!("sheet '{}' was not saved: {}", sheet.name, err));
        }
    }
    Ok(RebuildOutcome::Applied { report, warnings })
}
