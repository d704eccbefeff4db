use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use ssh2::{ErrorCode, KeyboardInteractivePrompt, Prompt, Session};
use tracing::{debug, info, warn};

use crate::config::InventoryConfig;
use crate::error::{InventoryError, Result};

// libssh2's LIBSSH2_ERROR_TIMEOUT
const SSH_ERROR_TIMEOUT: i32 = -9;

/// Something that can run a command on the hypervisor and hand back its output.
pub trait RemoteShell {
    fn exec(&mut self, command: &str) -> Result<CommandOutput>;

    /// End the session. Called exactly once, after the last command.
    fn close(&mut self);
}

impl<T: RemoteShell + ?Sized> RemoteShell for &mut T {
    fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        (**self).exec(command)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl CommandOutput {
    #[cfg(test)]
    pub fn success(stdout: impl Into<String>) -> Self {
        CommandOutput {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_status: 0,
        }
    }

    /// Stdout of a successful command, otherwise a command execution error.
    pub fn into_stdout(self, command: &str) -> Result<String> {
        if self.exit_status == 0 {
            return Ok(self.stdout);
        }
        let stderr = self.stderr.trim();
        Err(InventoryError::CommandExecution {
            command: command.to_string(),
            message: if stderr.is_empty() {
                format!("exit status {}", self.exit_status)
            } else {
                format!("exit status {}: {}", self.exit_status, stderr)
            },
        })
    }
}

/// SSH session to the ESXi shell.
pub struct SshShell {
    session: Session,
    host: String,
}

impl SshShell {
    /// Connect and authenticate. Any failure here is fatal for the run.
    pub fn connect(config: &InventoryConfig) -> Result<Self> {
        let host = format!("{}:{}", config.hostname, config.port);
        let connection_error = |message: String| InventoryError::Connection {
            host: host.clone(),
            message,
        };

        info!("connecting to {} as {}", host, config.username);

        let stream = open_stream(&config.hostname, config.port, config.connect_timeout)
            .map_err(connection_error)?;

        let mut session = Session::new()
            .map_err(|e| connection_error(format!("failed to create session: {}", e)))?;
        session.set_tcp_stream(stream);
        session.set_timeout(timeout_millis(config.command_timeout));
        session
            .handshake()
            .map_err(|e| connection_error(format!("SSH handshake failed: {}", e)))?;

        authenticate(&session, &config.username, &config.password).map_err(connection_error)?;
        debug!("authenticated to {}", host);

        Ok(SshShell { session, host })
    }
}

fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

fn open_stream(
    hostname: &str,
    port: u16,
    timeout: Duration,
) -> std::result::Result<TcpStream, String> {
    let addrs = (hostname, port)
        .to_socket_addrs()
        .map_err(|e| format!("failed to resolve {}: {}", hostname, e))?;

    let mut last_error = format!("no addresses found for {}", hostname);
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true).ok();
                return Ok(stream);
            }
            Err(e) => {
                debug!("connect to {} failed: {}", addr, e);
                last_error = format!("TCP connect to {} failed: {}", addr, e);
            }
        }
    }
    Err(last_error)
}

/// Answers every keyboard-interactive prompt with the password; ESXi asks
/// for nothing else.
struct PasswordPrompt<'a> {
    password: &'a str,
}

impl KeyboardInteractivePrompt for PasswordPrompt<'_> {
    fn prompt<'p>(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[Prompt<'p>],
    ) -> Vec<String> {
        prompts.iter().map(|_| self.password.to_string()).collect()
    }
}

fn authenticate(
    session: &Session,
    username: &str,
    password: &str,
) -> std::result::Result<(), String> {
    match session.userauth_password(username, password) {
        Ok(()) if session.authenticated() => return Ok(()),
        Ok(()) => {}
        Err(e) => debug!("password authentication refused: {}", e),
    }

    let mut prompt = PasswordPrompt { password };
    match session.userauth_keyboard_interactive(username, &mut prompt) {
        Ok(()) if session.authenticated() => Ok(()),
        Ok(()) => Err(format!("authentication failed for user {}", username)),
        Err(e) => Err(format!("authentication failed for user {}: {}", username, e)),
    }
}

impl RemoteShell for SshShell {
    fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        let command_error = |message: String| InventoryError::CommandExecution {
            command: command.to_string(),
            message,
        };
        let ssh_error = |e: ssh2::Error| {
            if matches!(e.code(), ErrorCode::Session(SSH_ERROR_TIMEOUT)) {
                command_error("timed out".to_string())
            } else {
                command_error(e.to_string())
            }
        };

        debug!("exec on {}: {}", self.host, command);

        let mut channel = self.session.channel_session().map_err(ssh_error)?;
        channel.exec(command).map_err(ssh_error)?;

        let mut stdout = Vec::new();
        channel
            .read_to_end(&mut stdout)
            .map_err(|e| command_error(format!("failed to read output: {}", e)))?;
        let mut stderr = Vec::new();
        channel
            .stderr()
            .read_to_end(&mut stderr)
            .map_err(|e| command_error(format!("failed to read stderr: {}", e)))?;

        channel.wait_close().map_err(ssh_error)?;
        let exit_status = channel.exit_status().map_err(ssh_error)?;

        let stdout = String::from_utf8(stdout)
            .map_err(|e| command_error(format!("invalid UTF-8 output: {}", e)))?;
        debug!("{} bytes of output, exit status {}", stdout.len(), exit_status);

        Ok(CommandOutput {
            stdout,
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status,
        })
    }

    fn close(&mut self) {
        if let Err(e) = self.session.disconnect(None, "inventory complete", None) {
            warn!("failed to close session to {}: {}", self.host, e);
        }
    }
}
