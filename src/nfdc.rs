// src/nfdc.rs
//! [`ForwardingControl`] backed by the forwarder's `nfdc` management tool.
//!
//! Each call spawns one `nfdc` process. A non-zero exit status is reported
//! as [`ControlError::CommandFailed`] with the captured stderr. Wrap in
//! [`crate::control::Retrying`] to get retries.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::control::{ControlError, ForwardingControl};
use crate::name::Name;

/// Default UDP port of the forwarder.
pub const NFD_PORT: u16 = 6363;

#[derive(Debug, Clone)]
pub struct Nfdc {
    program: String,
    port: u16,
}

impl Default for Nfdc {
    fn default() -> Self {
        Nfdc {
            program: "nfdc".to_string(),
            port: NFD_PORT,
        }
    }
}

impl Nfdc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another executable in place of `nfdc`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Select the forwarding strategy for `prefix`.
    pub async fn set_strategy(&self, prefix: &Name, strategy: &str) -> Result<(), ControlError> {
        let prefix = prefix.to_string();
        self.exec(&["strategy", "set", "prefix", &prefix, "strategy", strategy])
            .await
            .map(drop)
    }

    /// Run the tool and return its stdout.
    async fn exec(&self, args: &[&str]) -> Result<String, ControlError> {
        debug!(program = %self.program, ?args, "exec");
        let out = Command::new(&self.program).args(args).output().await?;
        if !out.status.success() {
            return Err(ControlError::CommandFailed {
                command: format!("{} {}", self.program, args.join(" ")),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

/// Pull the face id out of `face create` output, e.g.
/// `face-created id=302 local=udp4://10.0.0.1:6363 ...`.
pub fn parse_face_id(output: &str) -> Result<u64, ControlError> {
    output
        .split_whitespace()
        .find_map(|tok| tok.strip_prefix("id="))
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| ControlError::Parse(output.trim().to_string()))
}

#[async_trait]
impl ForwardingControl for Nfdc {
    async fn create_link(&self, address: &str) -> Result<u64, ControlError> {
        let remote = format!("udp4://{address}:{}", self.port);
        let out = self
            .exec(&["face", "create", "remote", &remote, "persistency", "permanent"])
            .await?;
        parse_face_id(&out)
    }

    async fn install_route(&self, prefix: &Name, face: u64, cost: u64) -> Result<(), ControlError> {
        let (prefix, face, cost) = (prefix.to_string(), face.to_string(), cost.to_string());
        self.exec(&[
            "route", "add", "prefix", &prefix, "nexthop", &face, "cost", &cost,
        ])
        .await
        .map(drop)
    }

    async fn withdraw_route(&self, prefix: &Name, face: u64) -> Result<(), ControlError> {
        let (prefix, face) = (prefix.to_string(), face.to_string());
        self.exec(&["route", "remove", "prefix", &prefix, "nexthop", &face])
            .await
            .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_id_is_parsed() {
        let out = "face-created id=302 local=udp4://10.0.0.1:6363 remote=udp4://10.0.0.2:6363 \
                   persistency=permanent";
        assert_eq!(parse_face_id(out).unwrap(), 302);
        assert_eq!(parse_face_id("face-exists id=7\n").unwrap(), 7);
    }

    #[test]
    fn missing_face_id_is_an_error() {
        assert!(matches!(
            parse_face_id("face-created local=x"),
            Err(ControlError::Parse(_))
        ));
        assert!(parse_face_id("id=abc").is_err());
    }

    #[tokio::test]
    async fn successful_command_is_ok() {
        // `echo` exits 0 whatever the arguments
        let ctl = Nfdc::new().with_program("echo");
        ctl.install_route(&"/app".parse().unwrap(), 300, 2)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn echo_output_has_no_face_id() {
        let ctl = Nfdc::new().with_program("echo");
        assert!(matches!(
            ctl.create_link("10.0.0.2").await,
            Err(ControlError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn failing_command_reports_command_line() {
        let ctl = Nfdc::new().with_program("false");
        match ctl.withdraw_route(&"/app".parse().unwrap(), 300).await {
            Err(ControlError::CommandFailed { command, .. }) => {
                assert_eq!(command, "false route remove prefix /app nexthop 300");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_io_error() {
        let ctl = Nfdc::new().with_program("/nonexistent/nfdc");
        assert!(matches!(
            ctl.set_strategy(&"/dv".parse().unwrap(), "/localhost/nfd/strategy/multicast")
                .await,
            Err(ControlError::Io(_))
        ));
    }
}
