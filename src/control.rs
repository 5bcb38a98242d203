use std::fmt;
use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use serialport::SerialPort;

use crate::config::SerialConfig;

/// Line commands understood by the door controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Open,
    LedOff,
    LedOn,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Open => "OPEN",
            Command::LedOff => "LED_OFF",
            Command::LedOn => "LED_ON",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait CommandSink {
    fn send(&mut self, cmd: Command) -> Result<()>;
}

impl<T: CommandSink + ?Sized> CommandSink for &mut T {
    fn send(&mut self, cmd: Command) -> Result<()> {
        (**self).send(cmd)
    }
}

/// Records commands instead of sending them.
impl CommandSink for Vec<Command> {
    fn send(&mut self, cmd: Command) -> Result<()> {
        self.push(cmd);
        Ok(())
    }
}

/// Newline-terminated ASCII over a serial port. Nothing is read back.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn open(cfg: &SerialConfig) -> Result<Self> {
        let port = serialport::new(&cfg.port, cfg.baud_rate)
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .open()
            .with_context(|| format!("opening serial port {}", cfg.port))?;
        std::thread::sleep(Duration::from_millis(cfg.settle_ms));
        info!("Serial open on {} @ {}", cfg.port, cfg.baud_rate);
        Ok(Self { port })
    }
}

impl CommandSink for SerialLink {
    fn send(&mut self, cmd: Command) -> Result<()> {
        write_line(&mut self.port, cmd)
    }
}

fn write_line<W: Write + ?Sized>(out: &mut W, cmd: Command) -> Result<()> {
    out.write_all(cmd.as_str().as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Best-effort command channel. Without a sink every command is dropped.
pub struct Controller<'a> {
    sink: Option<Box<dyn CommandSink + 'a>>,
}

impl<'a> Controller<'a> {
    pub fn new(sink: impl CommandSink + 'a) -> Self {
        Self {
            sink: Some(Box::new(sink)),
        }
    }

    pub fn disconnected() -> Self {
        Self { sink: None }
    }

    pub fn is_connected(&self) -> bool {
        self.sink.is_some()
    }

    pub fn send(&mut self, cmd: Command) {
        match self.sink.as_mut() {
            Some(sink) => match sink.send(cmd) {
                Ok(()) => info!("Sent command: {}", cmd),
                Err(e) => warn!("Failed to send {}: {:#}", cmd, e),
            },
            None => log::debug!("Serial unavailable, dropped {}", cmd),
        }
    }
}

impl Controller<'static> {
    /// Open the configured port, degrading to a disconnected controller on failure.
    pub fn connect(cfg: &SerialConfig) -> Self {
        match SerialLink::open(cfg) {
            Ok(link) => Controller::new(link),
            Err(e) => {
                warn!(
                    "Serial unavailable, continuing without device control: {:#}",
                    e
                );
                Controller::disconnected()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_newline_terminated() {
        let mut out: Vec<u8> = Vec::new();
        write_line(&mut out, Command::Open).unwrap();
        write_line(&mut out, Command::LedOff).unwrap();
        write_line(&mut out, Command::LedOn).unwrap();
        assert_eq!(out, b"OPEN\nLED_OFF\nLED_ON\n");
    }

    #[test]
    fn controller_forwards_to_sink() {
        let mut sent: Vec<Command> = Vec::new();
        {
            let mut ctl = Controller::new(&mut sent);
            assert!(ctl.is_connected());
            ctl.send(Command::LedOn);
        }
        assert_eq!(sent, vec![Command::LedOn]);
    }

    #[test]
    fn disconnected_controller_drops_commands() {
        let mut ctl = Controller::disconnected();
        assert!(!ctl.is_connected());
        ctl.send(Command::Open);
    }

    #[test]
    fn unopenable_port_degrades_to_disconnected() {
        let mut ctl = Controller::connect(&SerialConfig {
            port: "/nonexistent/facegate-tty".into(),
            settle_ms: 0,
            ..Default::default()
        });
        assert!(!ctl.is_connected());
        ctl.send(Command::Open);
        ctl.send(Command::LedOn);
    }

    struct Broken;

    impl CommandSink for Broken {
        fn send(&mut self, _cmd: Command) -> Result<()> {
            anyhow::bail!("port gone")
        }
    }

    #[test]
    fn write_failures_do_not_escape() {
        let mut ctl = Controller::new(Broken);
        ctl.send(Command::Open);
        assert!(ctl.is_connected());
    }
}
