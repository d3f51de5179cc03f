use std::fmt;

use zeroize::Zeroize;

use super::DiskError;

/// Captured result of a finished child process
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turns a non-zero exit into `DiskError::Execution`
    pub fn check(self, program: &str) -> Result<CommandOutput, DiskError> {
        if self.success() {
            return Ok(self);
        }
        Err(DiskError::Execution {
            program: program.to_string(),
            exit_code: self.exit_code,
            stderr: self.stderr.trim().to_string(),
        })
    }
}

/// Password handed to the elevation tool.
///
/// Never empty. The buffer is zeroed when the value is dropped and the
/// `Debug` output never shows the secret.
pub struct Credential {
    secret: String,
}

impl Credential {
    pub fn new(mut secret: String) -> Result<Self, DiskError> {
        if secret.is_empty() {
            secret.zeroize();
            return Err(DiskError::Authentication(
                "no credential supplied".to_string(),
            ));
        }
        Ok(Self { secret })
    }

    /// Raw secret, only for writing into the elevation tool's stdin
    pub(crate) fn expose(&self) -> &str {
        &self.secret
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Answer from whoever was asked for the password
#[derive(Debug)]
pub enum CredentialPrompt {
    Provided(Credential),
    Cancelled,
}

impl CredentialPrompt {
    /// Empty input counts as the operator backing out
    pub fn from_input(input: String) -> Self {
        match Credential::new(input) {
            Ok(credential) => CredentialPrompt::Provided(credential),
            Err(_) => CredentialPrompt::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_credential_is_rejected() {
        let err = Credential::new(String::new()).unwrap_err();
        assert!(matches!(err, DiskError::Authentication(_)));
    }

    #[test]
    fn test_debug_is_redacted() {
        let credential = Credential::new("hunter2".to_string()).unwrap();
        let shown = format!("{credential:?}");
        assert!(!shown.contains("hunter2"));
        assert_eq!(credential.expose(), "hunter2");
    }

    #[test]
    fn test_prompt_from_input() {
        assert!(matches!(
            CredentialPrompt::from_input(String::new()),
            CredentialPrompt::Cancelled
        ));
        assert!(matches!(
            CredentialPrompt::from_input("x".to_string()),
            CredentialPrompt::Provided(_)
        ));
    }

    #[test]
    fn test_check_non_zero_exit() {
        let output = CommandOutput {
            stdout: String::new(),
            stderr: "mkfs.exfat: device busy\n".to_string(),
            exit_code: 1,
        };
        match output.check("mkfs.exfat") {
            Err(DiskError::Execution {
                program,
                exit_code,
                stderr,
            }) => {
                assert_eq!(program, "mkfs.exfat");
                assert_eq!(exit_code, 1);
                assert_eq!(stderr, "mkfs.exfat: device busy");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
