use std::io;

use crate::pty::handle::PtyError;

/// Termination (and flow-control) signals a controller may name in a
/// `/kill` payload. Names are matched case-insensitively, with or without
/// the `SIG` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Hup,
    Int,
    Quit,
    Kill,
    Term,
    Usr1,
    Usr2,
    Cont,
    Stop,
    Winch,
}

impl Signal {
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let short = upper.strip_prefix("SIG").unwrap_or(&upper);
        Some(match short {
            "HUP" => Signal::Hup,
            "INT" => Signal::Int,
            "QUIT" => Signal::Quit,
            "KILL" => Signal::Kill,
            "TERM" => Signal::Term,
            "USR1" => Signal::Usr1,
            "USR2" => Signal::Usr2,
            "CONT" => Signal::Cont,
            "STOP" => Signal::Stop,
            "WINCH" => Signal::Winch,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Signal::Hup => "SIGHUP",
            Signal::Int => "SIGINT",
            Signal::Quit => "SIGQUIT",
            Signal::Kill => "SIGKILL",
            Signal::Term => "SIGTERM",
            Signal::Usr1 => "SIGUSR1",
            Signal::Usr2 => "SIGUSR2",
            Signal::Cont => "SIGCONT",
            Signal::Stop => "SIGSTOP",
            Signal::Winch => "SIGWINCH",
        }
    }

    fn number(self) -> libc::c_int {
        match self {
            Signal::Hup => libc::SIGHUP,
            Signal::Int => libc::SIGINT,
            Signal::Quit => libc::SIGQUIT,
            Signal::Kill => libc::SIGKILL,
            Signal::Term => libc::SIGTERM,
            Signal::Usr1 => libc::SIGUSR1,
            Signal::Usr2 => libc::SIGUSR2,
            Signal::Cont => libc::SIGCONT,
            Signal::Stop => libc::SIGSTOP,
            Signal::Winch => libc::SIGWINCH,
        }
    }

    pub(crate) fn send(self, pid: u32) -> Result<(), PtyError> {
        let rc = unsafe { libc::kill(pid as libc::pid_t, self.number()) };
        if rc != 0 {
            return Err(PtyError::Kill {
                signal: self.name(),
                pid,
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Signal;

    #[test]
    fn parses_with_and_without_prefix() {
        assert_eq!(Signal::from_name("SIGTERM"), Some(Signal::Term));
        assert_eq!(Signal::from_name("TERM"), Some(Signal::Term));
        assert_eq!(Signal::from_name("term"), Some(Signal::Term));
        assert_eq!(Signal::from_name(" sighup "), Some(Signal::Hup));
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(Signal::from_name("SIGBOGUS"), None);
        assert_eq!(Signal::from_name(""), None);
    }

    #[test]
    fn round_trips_names() {
        for signal in [
            Signal::Hup,
            Signal::Int,
            Signal::Quit,
            Signal::Kill,
            Signal::Term,
            Signal::Usr1,
            Signal::Usr2,
            Signal::Cont,
            Signal::Stop,
            Signal::Winch,
        ] {
            assert_eq!(Signal::from_name(signal.name()), Some(signal));
        }
    }
}
