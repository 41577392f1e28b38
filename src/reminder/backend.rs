use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::process::Command;
use thiserror::Error;
use tracing::warn;

/// Format used when a reminder time is shown to the user
pub const REMINDER_TIME_FORMAT: &str = "%c";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to spawn notifier: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("notifier exited with {0}")]
    Exited(std::process::ExitStatus),
    #[error("no notifier available on this platform")]
    Unavailable,
    #[error("{0}")]
    Other(String),
}

/// What a backend is told about a due reminder
#[derive(Debug, Clone)]
pub struct DueReminder {
    pub text: String,
    pub due_at: DateTime<Local>,
}

impl DueReminder {
    pub fn due_at_string(&self) -> String {
        self.due_at.format(REMINDER_TIME_FORMAT).to_string()
    }
}

/// A pluggable way of delivering a due reminder to the user. Exactly
/// one backend is active at a time (see [`BackendSlot`]).
pub trait NotificationBackend {
    fn initialize(&mut self) -> Result<(), BackendError>;
    fn notify(&mut self, due: &DueReminder) -> Result<(), BackendError>;
    fn shutdown(&mut self) -> Result<(), BackendError>;
}

/// Compile-time selected backend strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Print the reminder to stdout
    #[default]
    Console,
    /// Hand the reminder to the OS notification service
    Desktop,
}

impl BackendKind {
    pub fn create(self) -> Box<dyn NotificationBackend> {
        match self {
            BackendKind::Console => Box::new(ConsoleBackend),
            BackendKind::Desktop => Box::new(DesktopBackend),
        }
    }
}

/// Prints reminders to stdout; always available
pub struct ConsoleBackend;

impl NotificationBackend for ConsoleBackend {
    fn initialize(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn notify(&mut self, due: &DueReminder) -> Result<(), BackendError> {
        println!("It's {} - don't forget: {}", due.due_at_string(), due.text);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Delivers reminders through the platform notification service
/// (`osascript` on macOS, `notify-send` elsewhere on freedesktop)
pub struct DesktopBackend;

impl NotificationBackend for DesktopBackend {
    fn initialize(&mut self) -> Result<(), BackendError> {
        #[cfg(any(target_os = "macos", target_os = "linux"))]
        {
            Ok(())
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            Err(BackendError::Unavailable)
        }
    }

    fn notify(&mut self, due: &DueReminder) -> Result<(), BackendError> {
        #[cfg(target_os = "macos")]
        {
            let script = format!(
                r#"display notification "{}" with title "Lista reminder""#,
                due.text.replace('"', "\\\"")
            );
            run_checked(Command::new("osascript").arg("-e").arg(&script))
        }
        #[cfg(target_os = "linux")]
        {
            run_checked(
                Command::new("notify-send")
                    .arg("Lista reminder")
                    .arg(&due.text),
            )
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            let _ = due;
            Err(BackendError::Unavailable)
        }
    }

    fn shutdown(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[allow(dead_code)] // unreferenced on platforms without a notifier
fn run_checked(cmd: &mut Command) -> Result<(), BackendError> {
    let status = cmd.status()?;
    if status.success() {
        Ok(())
    } else {
        Err(BackendError::Exited(status))
    }
}

/// Holds the single active notification backend. Initialized lazily
/// on first use; switching kinds shuts the previous backend down
/// first. If initialization fails the slot stays empty and reminders
/// simply accumulate un-notified.
#[derive(Default)]
pub struct BackendSlot {
    active: Option<(BackendKind, Box<dyn NotificationBackend>)>,
}

impl BackendSlot {
    pub fn new() -> Self {
        Self { active: None }
    }

    pub fn active_kind(&self) -> Option<BackendKind> {
        self.active.as_ref().map(|(kind, _)| *kind)
    }

    /// Return the active backend of the requested kind, initializing
    /// or switching as needed. None means initialization failed.
    pub fn get_or_init(&mut self, kind: BackendKind) -> Option<&mut dyn NotificationBackend> {
        if !matches!(&self.active, Some((active, _)) if *active == kind) {
            let backend = kind.create();
            if !self.install(kind, backend) {
                return None;
            }
        }
        self.active
            .as_mut()
            .map(|(_, backend)| backend.as_mut() as &mut dyn NotificationBackend)
    }

    /// Make `backend` the active backend, shutting down any previous
    /// one. Returns false and leaves the slot empty if `initialize`
    /// fails.
    pub fn install(&mut self, kind: BackendKind, mut backend: Box<dyn NotificationBackend>) -> bool {
        self.shutdown();
        if let Err(e) = backend.initialize() {
            warn!("could not initialize {kind:?} notification backend: {e}");
            return false;
        }
        self.active = Some((kind, backend));
        true
    }

    /// Shut down and drop the active backend, if any
    pub fn shutdown(&mut self) {
        if let Some((kind, mut backend)) = self.active.take() {
            if let Err(e) = backend.shutdown() {
                warn!("error shutting down {kind:?} notification backend: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Probe {
        inits: Cell<usize>,
        notifies: Cell<usize>,
        shutdowns: Cell<usize>,
        fail_init: Cell<bool>,
    }

    struct FakeBackend(Rc<Probe>);

    impl NotificationBackend for FakeBackend {
        fn initialize(&mut self) -> Result<(), BackendError> {
            self.0.inits.set(self.0.inits.get() + 1);
            if self.0.fail_init.get() {
                Err(BackendError::Other("init refused".to_string()))
            } else {
                Ok(())
            }
        }

        fn notify(&mut self, _due: &DueReminder) -> Result<(), BackendError> {
            self.0.notifies.set(self.0.notifies.get() + 1);
            Ok(())
        }

        fn shutdown(&mut self) -> Result<(), BackendError> {
            self.0.shutdowns.set(self.0.shutdowns.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_install_initializes_once() {
        let probe = Rc::new(Probe::default());
        let mut slot = BackendSlot::new();
        assert!(slot.install(BackendKind::Console, Box::new(FakeBackend(probe.clone()))));
        assert_eq!(probe.inits.get(), 1);
        assert_eq!(slot.active_kind(), Some(BackendKind::Console));

        // Same kind is reused, not re-initialized
        assert!(slot.get_or_init(BackendKind::Console).is_some());
        assert_eq!(probe.inits.get(), 1);
    }

    #[test]
    fn test_switching_shuts_down_previous_backend() {
        let probe = Rc::new(Probe::default());
        let mut slot = BackendSlot::new();
        slot.install(BackendKind::Desktop, Box::new(FakeBackend(probe.clone())));

        let other = Rc::new(Probe::default());
        slot.install(BackendKind::Console, Box::new(FakeBackend(other.clone())));

        assert_eq!(probe.shutdowns.get(), 1);
        assert_eq!(other.inits.get(), 1);
        assert_eq!(slot.active_kind(), Some(BackendKind::Console));
    }

    #[test]
    fn test_failed_init_leaves_slot_empty() {
        let probe = Rc::new(Probe::default());
        probe.fail_init.set(true);
        let mut slot = BackendSlot::new();
        assert!(!slot.install(BackendKind::Console, Box::new(FakeBackend(probe.clone()))));
        assert!(slot.active_kind().is_none());
    }

    #[test]
    fn test_shutdown_empties_slot() {
        let probe = Rc::new(Probe::default());
        let mut slot = BackendSlot::new();
        slot.install(BackendKind::Console, Box::new(FakeBackend(probe.clone())));
        slot.shutdown();
        assert_eq!(probe.shutdowns.get(), 1);
        assert!(slot.active_kind().is_none());
    }

    #[test]
    fn test_backend_kind_serializes_lowercase() {
        let json = serde_json::to_string(&BackendKind::Desktop).unwrap();
        assert_eq!(json, "\"desktop\"");
        let kind: BackendKind = serde_json::from_str("\"console\"").unwrap();
        assert_eq!(kind, BackendKind::Console);
    }
}
