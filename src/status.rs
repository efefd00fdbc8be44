use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

/// Operator-visible run state. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Running = 0,
    Paused = 1,
    Stopped = 2,
}

impl Status {
    /// The operator command word that selects this state.
    pub fn command_word(self) -> &'static str {
        match self {
            Status::Running => "ok",
            Status::Paused => "stop",
            Status::Stopped => "quit",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Status::Running,
            1 => Status::Paused,
            _ => Status::Stopped,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown status command {0:?}")]
pub struct InvalidStatus(pub String);

impl FromStr for Status {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Status::Running),
            "stop" => Ok(Status::Paused),
            "quit" => Ok(Status::Stopped),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

/// The status flag shared between the scheduler, the operator-command task
/// and the kill signal. A single scalar read once per tick; transitions into
/// `Stopped` are idempotent and no transition leaves it.
pub struct StatusCell(AtomicU8);

impl StatusCell {
    pub fn new(initial: Status) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn get(&self) -> Status {
        Status::from_u8(self.0.load(Ordering::Relaxed))
    }

    /// Apply a transition. Returns `false` when the cell is already
    /// `Stopped` and the write was discarded.
    pub fn set(&self, next: Status) -> bool {
        let mut cur = self.0.load(Ordering::Relaxed);
        loop {
            if cur == Status::Stopped as u8 {
                return false;
            }
            match self
                .0
                .compare_exchange_weak(cur, next as u8, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return true,
                Err(now) => cur = now,
            }
        }
    }

    pub fn stop(&self) {
        self.set(Status::Stopped);
    }

    pub fn is_stopped(&self) -> bool {
        self.get() == Status::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_command_words() {
        assert_eq!("ok".parse::<Status>().unwrap(), Status::Running);
        assert_eq!("stop".parse::<Status>().unwrap(), Status::Paused);
        assert_eq!("quit".parse::<Status>().unwrap(), Status::Stopped);
    }

    #[test]
    fn parse_rejects_anything_else() {
        assert!("go".parse::<Status>().is_err());
        assert!("OK".parse::<Status>().is_err());
        assert!("".parse::<Status>().is_err());
        let err = "resume".parse::<Status>().unwrap_err();
        assert!(err.to_string().contains("resume"));
    }

    #[test]
    fn cell_transitions_between_running_and_paused() {
        let cell = StatusCell::new(Status::Running);
        assert!(cell.set(Status::Paused));
        assert_eq!(cell.get(), Status::Paused);
        assert!(cell.set(Status::Running));
        assert_eq!(cell.get(), Status::Running);
    }

    #[test]
    fn stopped_is_terminal() {
        let cell = StatusCell::new(Status::Running);
        cell.stop();
        assert!(cell.is_stopped());
        assert!(!cell.set(Status::Running));
        assert!(!cell.set(Status::Paused));
        assert_eq!(cell.get(), Status::Stopped);
    }

    #[test]
    fn stop_is_idempotent() {
        let cell = StatusCell::new(Status::Paused);
        cell.stop();
        cell.stop();
        assert!(cell.is_stopped());
    }
}
