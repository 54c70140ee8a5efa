use crate::common::types::{Result, StravaError};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Keys understood in the `Key:Value` credentials file, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKey {
    Id,
    SecretClient,
    Token,
    Code,
    RefreshCode,
    Email,
    Password,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 7] = [
        CredentialKey::Id,
        CredentialKey::SecretClient,
        CredentialKey::Token,
        CredentialKey::Code,
        CredentialKey::RefreshCode,
        CredentialKey::Email,
        CredentialKey::Password,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::Id => "ID",
            CredentialKey::SecretClient => "SecretClient",
            CredentialKey::Token => "Token",
            CredentialKey::Code => "Code",
            CredentialKey::RefreshCode => "RefreshCode",
            CredentialKey::Email => "Email",
            CredentialKey::Password => "Password",
        }
    }

    fn lookup(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

/// Application and account credentials read from a flat text file.
///
/// ```text
/// ID:12345
/// SecretClient:abcdef
/// RefreshCode:0123abcd
/// Email:me@example.com
/// Password:hunter2
/// ```
///
/// `access_token` is filled in by a token refresh and never written back.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: Option<u64>,
    pub client_secret: Option<String>,
    pub token: Option<String>,
    pub code: Option<String>,
    pub refresh_code: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub access_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(value: &Option<String>) -> &'static str {
            if value.is_some() { "<redacted>" } else { "<unset>" }
        }

        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("token", &redact(&self.token))
            .field("code", &redact(&self.code))
            .field("refresh_code", &redact(&self.refresh_code))
            .field("email", &self.email)
            .field("password", &redact(&self.password))
            .field("access_token", &redact(&self.access_token))
            .finish()
    }
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| StravaError::file_io(path, e))?;
        let credentials = Self::parse(&contents)?;
        debug!(path = %path.display(), "credentials loaded");
        Ok(credentials)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut credentials = Self::default();

        for (index, line) in contents.lines().enumerate() {
            let Some((key, value)) = split_line(line) else {
                continue;
            };
            match CredentialKey::lookup(key) {
                Some(key) => credentials.set(key, value, index + 1)?,
                None => debug!(line = index + 1, key, "ignoring unknown credentials key"),
            }
        }

        Ok(credentials)
    }

    /// Write the credentials back to `path`.
    ///
    /// Lines of an existing file are kept in place; recognized keys get their
    /// current value and keys set here but absent from the file are appended.
    pub fn save(&self, path: &Path) -> Result<()> {
        let existing = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(StravaError::file_io(path, e)),
        };

        fs::write(path, self.render(&existing)).map_err(|e| StravaError::file_io(path, e))?;
        debug!(path = %path.display(), "credentials saved");
        Ok(())
    }

    fn render(&self, existing: &str) -> String {
        let mut written = Vec::new();
        let mut output = String::new();

        for line in existing.lines() {
            let known = split_line(line).and_then(|(key, _)| CredentialKey::lookup(key));
            match known {
                Some(key) if !written.contains(&key) => {
                    if let Some(value) = self.get(key) {
                        output.push_str(&format!("{}:{}\n", key.as_str(), value));
                    }
                    written.push(key);
                }
                // Later duplicates of a rewritten key would override it on the next load.
                Some(_) => {}
                None => {
                    output.push_str(line);
                    output.push('\n');
                }
            }
        }

        for key in CredentialKey::ALL {
            if written.contains(&key) {
                continue;
            }
            if let Some(value) = self.get(key) {
                output.push_str(&format!("{}:{}\n", key.as_str(), value));
            }
        }

        output
    }

    pub fn get(&self, key: CredentialKey) -> Option<String> {
        match key {
            CredentialKey::Id => self.client_id.map(|id| id.to_string()),
            CredentialKey::SecretClient => self.client_secret.clone(),
            CredentialKey::Token => self.token.clone(),
            CredentialKey::Code => self.code.clone(),
            CredentialKey::RefreshCode => self.refresh_code.clone(),
            CredentialKey::Email => self.email.clone(),
            CredentialKey::Password => self.password.clone(),
        }
    }

    fn set(&mut self, key: CredentialKey, value: &str, line: usize) -> Result<()> {
        if value.is_empty() {
            debug!(line, key = key.as_str(), "blank credentials value treated as unset");
            self.clear(key);
            return Ok(());
        }

        let value = value.to_string();
        match key {
            CredentialKey::Id => {
                let id = value.parse().map_err(|_| StravaError::Credentials {
                    line,
                    message: format!("ID must be a positive integer, got `{value}`"),
                })?;
                self.client_id = Some(id);
            }
            CredentialKey::SecretClient => self.client_secret = Some(value),
            CredentialKey::Token => self.token = Some(value),
            CredentialKey::Code => self.code = Some(value),
            CredentialKey::RefreshCode => self.refresh_code = Some(value),
            CredentialKey::Email => self.email = Some(value),
            CredentialKey::Password => self.password = Some(value),
        }
        Ok(())
    }

    fn clear(&mut self, key: CredentialKey) {
        match key {
            CredentialKey::Id => self.client_id = None,
            CredentialKey::SecretClient => self.client_secret = None,
            CredentialKey::Token => self.token = None,
            CredentialKey::Code => self.code = None,
            CredentialKey::RefreshCode => self.refresh_code = None,
            CredentialKey::Email => self.email = None,
            CredentialKey::Password => self.password = None,
        }
    }

    pub fn require_client_id(&self) -> Result<u64> {
        self.client_id.ok_or(StravaError::MissingCredential("ID"))
    }

    pub fn require_client_secret(&self) -> Result<&str> {
        require(&self.client_secret, CredentialKey::SecretClient)
    }

    pub fn require_refresh_code(&self) -> Result<&str> {
        require(&self.refresh_code, CredentialKey::RefreshCode)
    }

    pub fn require_email(&self) -> Result<&str> {
        require(&self.email, CredentialKey::Email)
    }

    pub fn require_password(&self) -> Result<&str> {
        require(&self.password, CredentialKey::Password)
    }

    pub fn require_access_token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .ok_or(StravaError::MissingAccessToken)
    }
}

fn require(value: &Option<String>, key: CredentialKey) -> Result<&str> {
    value
        .as_deref()
        .ok_or(StravaError::MissingCredential(key.as_str()))
}

/// Split a `Key:Value` line on its first colon, dropping comments and blanks.
fn split_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once(':')?;
    Some((key.trim(), value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    const SAMPLE: &str = "ID:12345\r\nSecretClient : s3cr3t\nToken:tok\nCode:c0de\n\n\
        RefreshCode:refresh\nEmail:me@example.com\nPassword:pa:ss\n";

    #[test]
    fn test_each_recognized_key_populates_its_field() {
        let creds = Credentials::parse(SAMPLE).unwrap();

        assert_eq!(creds.client_id, Some(12345));
        assert_eq!(creds.client_secret.as_deref(), Some("s3cr3t"));
        assert_eq!(creds.token.as_deref(), Some("tok"));
        assert_eq!(creds.code.as_deref(), Some("c0de"));
        assert_eq!(creds.refresh_code.as_deref(), Some("refresh"));
        assert_eq!(creds.email.as_deref(), Some("me@example.com"));
        assert_eq!(creds.password.as_deref(), Some("pa:ss"));
        assert_eq!(creds.access_token, None);
    }

    #[test]
    fn test_unknown_keys_comments_and_junk_are_skipped() {
        let creds = Credentials::parse("# my app\nNickname:bob\nnot a pair\nID: 7\n").unwrap();
        assert_eq!(creds.client_id, Some(7));
        assert_eq!(creds.client_secret, None);
    }

    #[test]
    fn test_last_occurrence_wins() {
        let creds = Credentials::parse("Token:first\nToken:second\n").unwrap();
        assert_eq!(creds.token.as_deref(), Some("second"));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let creds = Credentials::parse("Email:me@example.com\nPassword:   \nID:\n").unwrap();
        assert_eq!(creds.password, None);
        assert_eq!(creds.client_id, None);
        assert!(matches!(
            creds.require_password(),
            Err(StravaError::MissingCredential("Password"))
        ));

        let creds = Credentials::parse("Password:hunter2\nPassword:\n").unwrap();
        assert_eq!(creds.password, None);
    }

    #[test]
    fn test_non_numeric_id_reports_line() {
        let err = Credentials::parse("Email:a@b.c\nID:abc\n").unwrap_err();
        assert!(matches!(err, StravaError::Credentials { line: 2, .. }));
    }

    #[test]
    fn test_missing_fields_surface_key_name() {
        let creds = Credentials::parse("ID:1\n").unwrap();
        assert!(matches!(
            creds.require_refresh_code(),
            Err(StravaError::MissingCredential("RefreshCode"))
        ));
        assert!(matches!(
            creds.require_access_token(),
            Err(StravaError::MissingAccessToken)
        ));
        assert_eq!(creds.require_client_id().unwrap(), 1);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut creds = Credentials::parse(SAMPLE).unwrap();
        creds.access_token = Some("live-token".to_string());
        let printed = format!("{creds:?}");

        assert!(!printed.contains("s3cr3t"));
        assert!(!printed.contains("pa:ss"));
        assert!(!printed.contains("live-token"));
        assert!(printed.contains("12345"));
    }

    #[test]
    fn test_save_keeps_layout_and_updates_values() {
        let dir = TempDir::new("strava_creds").unwrap();
        let path = dir.path().join("credentials.txt");
        fs::write(&path, "# strava app\nID:1\nRefreshCode:old\nRefreshCode:older\n").unwrap();

        let mut creds = Credentials::load(&path).unwrap();
        creds.refresh_code = Some("new".to_string());
        creds.email = Some("me@example.com".to_string());
        creds.access_token = Some("not-persisted".to_string());
        creds.save(&path).unwrap();

        let saved = fs::read_to_string(&path).unwrap();
        assert_eq!(
            saved,
            "# strava app\nID:1\nRefreshCode:new\nEmail:me@example.com\n"
        );
        let reloaded = Credentials::load(&path).unwrap();
        assert_eq!(reloaded.refresh_code.as_deref(), Some("new"));
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let err = Credentials::load(Path::new("/nonexistent/credentials.txt")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/credentials.txt"));
        assert!(matches!(
            err,
            StravaError::FileIo { ref path, .. } if path == Path::new("/nonexistent/credentials.txt")
        ));
    }
}
