use crate::{
    alert::Alert,
    api::{request::WithdrawRequest, Backend},
    config::MIN_WITHDRAWAL,
    display::Display,
    error::ValidationError,
};
use std::sync::Arc;

/// Enabled/disabled state and label of a trigger control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonState {
    label: &'static str,
    busy_label: &'static str,
    pending: bool,
}

impl ButtonState {
    pub const fn new(label: &'static str, busy_label: &'static str) -> Self {
        Self { label, busy_label, pending: false }
    }

    pub fn start() -> Self {
        Self::new("▶ Start Mining", "Starting...")
    }

    pub fn stop() -> Self {
        Self::new("⏹ Stop Mining", "Stopping...")
    }

    pub fn submit() -> Self {
        Self::new("Withdraw", "Processing...")
    }

    /// Disable the control for an in-flight call. Returns `false` if a call is
    /// already in flight.
    pub fn begin(&mut self) -> bool {
        if self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    pub fn finish(&mut self) {
        self.pending = false;
    }

    pub fn is_enabled(&self) -> bool {
        !self.pending
    }

    pub fn label(&self) -> &'static str {
        if self.pending {
            self.busy_label
        } else {
            self.label
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Address,
    Amount,
}

/// The withdrawal form as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithdrawForm {
    pub to_address: String,
    pub amount: String,
}

impl WithdrawForm {
    pub fn new(to_address: impl Into<String>, amount: impl Into<String>) -> Self {
        Self { to_address: to_address.into(), amount: amount.into() }
    }

    pub fn field_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::Address => &mut self.to_address,
            FormField::Amount => &mut self.amount,
        }
    }

    pub fn reset(&mut self) {
        self.to_address.clear();
        self.amount.clear();
    }

    pub fn validate(&self) -> Result<WithdrawRequest, ValidationError> {
        let to = self.to_address.trim();
        let amount = self
            .amount
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|a| a.is_finite() && *a > 0.0);
        let (Some(amount), false) = (amount, to.is_empty()) else {
            return Err(ValidationError::MissingInput);
        };
        if amount < MIN_WITHDRAWAL {
            return Err(ValidationError::BelowMinimum);
        }
        Ok(WithdrawRequest::new(amount, to))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Withdraw(WithdrawForm),
}

/// What the UI should do after a command finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub alert: Option<Alert>,
    /// New value for the running indicator, if the command changed it.
    pub running: Option<bool>,
    pub clear_form: bool,
}

impl Outcome {
    fn alert(alert: Alert) -> Self {
        Self { alert: Some(alert), ..Default::default() }
    }

    pub fn is_success(&self) -> bool {
        self.running.is_some() || self.clear_form
    }
}

/// Turns user intents into backend calls and backend replies into UI outcomes.
pub struct Controller<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: ?Sized> Clone for Controller<B> {
    fn clone(&self) -> Self {
        Self { backend: Arc::clone(&self.backend) }
    }
}

impl<B: Backend + ?Sized> Controller<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn run(&self, command: &Command) -> Outcome {
        match command {
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::Withdraw(form) => self.withdraw(form),
        }
    }

    pub fn start(&self) -> Outcome {
        match self.backend.start() {
            Ok(reply) if reply.ok => {
                tracing::info!(msg = reply.msg.as_deref().unwrap_or_default(), "Mining started.");
                Outcome { running: Some(true), ..Default::default() }
            }
            Ok(reply) => Outcome::alert(Alert::error(format!(
                "Error: {}",
                reply.error.as_deref().unwrap_or("Failed to start mining")
            ))),
            Err(e) => {
                tracing::error!("Error starting mining: {}", e);
                Outcome::alert(Alert::error(format!("Error starting mining: {}", e)))
            }
        }
    }

    pub fn stop(&self) -> Outcome {
        match self.backend.stop() {
            Ok(reply) if reply.ok => {
                tracing::info!(msg = reply.msg.as_deref().unwrap_or_default(), "Mining stopped.");
                Outcome { running: Some(false), ..Default::default() }
            }
            Ok(reply) => Outcome::alert(Alert::error(format!(
                "Error: {}",
                reply.error.as_deref().unwrap_or("Failed to stop mining")
            ))),
            Err(e) => {
                tracing::error!("Error stopping mining: {}", e);
                Outcome::alert(Alert::error(format!("Error stopping mining: {}", e)))
            }
        }
    }

    pub fn withdraw(&self, form: &WithdrawForm) -> Outcome {
        let request = match form.validate() {
            Ok(request) => request,
            Err(e) => return Outcome::alert(Alert::error(e.to_string())),
        };

        match self.backend.withdraw(&request) {
            Ok(reply) if reply.ok => {
                let message = match reply.broadcast_txid() {
                    Some(txid) => format!(
                        "Withdrawal successful! Transaction ID: {}",
                        Display::truncate_id(txid, 16)
                    ),
                    None => format!(
                        "Withdrawal requested. ID: {} (Pending admin processing)",
                        Display::truncate_id(reply.id.as_deref().unwrap_or_default(), 8)
                    ),
                };
                tracing::info!(note = reply.note.as_deref().unwrap_or_default(), "{}", message);
                Outcome { alert: Some(Alert::success(message)), running: None, clear_form: true }
            }
            Ok(reply) => Outcome::alert(Alert::error(format!(
                "Error: {}",
                reply.error.as_deref().unwrap_or("Failed to process withdrawal")
            ))),
            Err(e) => {
                tracing::error!("Error submitting withdrawal: {}", e);
                Outcome::alert(Alert::error(format!("Error submitting withdrawal: {}", e)))
            }
        }
    }
}
