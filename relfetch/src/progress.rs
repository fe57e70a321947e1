use relfetch_lib::logging::{progress_bar_style, transfer_spinner_style};
use relfetch_lib::supervisor::{ProgressReporter, SupervisorState};
use relfetch_lib::transfer::{ProgressSnapshot, TransferJob};
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt;

/// Drives the progress bar attached to a tracing span.
///
/// Shows a spinner until the server announces a size, then a byte bar.
pub struct SpanProgress {
    span: Span,
    sized: bool,
}

impl SpanProgress {
    pub fn new(span: Span) -> Self {
        Self { span, sized: false }
    }
}

impl ProgressReporter for SpanProgress {
    fn on_state(&mut self, state: SupervisorState, job: &TransferJob) {
        match state {
            SupervisorState::Starting => {
                if let Ok(style) = transfer_spinner_style() {
                    self.span.pb_set_style(&style);
                }
                self.span
                    .pb_set_message(&format!("Downloading {}...", job.asset.name()));
            }
            SupervisorState::Finished(outcome) => {
                tracing::debug!(?outcome, "progress bar finished");
            }
            SupervisorState::Idle | SupervisorState::Running => {}
        }
    }

    fn on_progress(&mut self, snapshot: ProgressSnapshot) {
        if snapshot.ratio().is_some() && !self.sized {
            if let Ok(style) = progress_bar_style() {
                self.span.pb_set_style(&style);
            }
            self.span.pb_set_length(snapshot.bytes_total);
            self.sized = true;
        }
        self.span.pb_set_position(snapshot.bytes_transferred);
    }
}
