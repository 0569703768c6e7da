//! Reading credentials from a netrc file

use std::{collections::HashMap, iter::Peekable, path::Path, str::Chars};

use crate::error::CredentialsError;

/// A single `machine` or `default` entry
#[derive(Clone, Default, PartialEq, Eq)]
pub struct NetrcEntry {
    /// The login name
    pub login: String,
    /// The account, if any
    pub account: Option<String>,
    /// The password
    pub password: String,
}

impl std::fmt::Debug for NetrcEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetrcEntry")
            .field("login", &self.login)
            .field("account", &self.account)
            .field("password", &"***PASSWORD***")
            .finish()
    }
}

/// A parsed netrc file
#[derive(Clone, Debug, Default)]
pub struct Netrc {
    hosts: HashMap<String, NetrcEntry>,
    default: Option<NetrcEntry>,
}

impl Netrc {
    /// Reads and parses the netrc file at `path`
    pub async fn from_file(path: &Path) -> Result<Self, CredentialsError> {
        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CredentialsError::NetrcRead {
                path: path.to_owned(),
                source,
            })?;

        Self::parse(&data).map_err(|reason| CredentialsError::NetrcSyntax {
            path: path.to_owned(),
            reason,
        })
    }

    /// Parses the contents of a netrc file
    ///
    /// Values may be quoted with `"`, and a backslash escapes the character
    /// that follows it. A `#` in place of a keyword starts a comment that
    /// runs to the end of the line. When a host appears more than once, the
    /// first entry wins.
    pub fn parse(data: &str) -> Result<Self, String> {
        let mut netrc = Self::default();
        let mut lexer = Lexer::new(data);
        let mut current: Option<(Option<String>, NetrcEntry)> = None;

        while let Some(token) = lexer.next_keyword()? {
            if matches!(token.as_str(), "machine" | "default" | "macdef") {
                if let Some((host, entry)) = current.take() {
                    netrc.insert(host, entry);
                }
            }

            match token.as_str() {
                "machine" => {
                    let host = lexer
                        .next_value()?
                        .ok_or_else(|| "missing host name after 'machine'".to_owned())?;
                    current = Some((Some(host), NetrcEntry::default()));
                }
                "default" => {
                    current = Some((None, NetrcEntry::default()));
                }
                "macdef" => {
                    lexer
                        .next_value()?
                        .ok_or_else(|| "missing macro name after 'macdef'".to_owned())?;
                    lexer.skip_macro();
                }
                "login" | "user" | "account" | "password" => {
                    let value = lexer
                        .next_value()?
                        .ok_or_else(|| format!("missing value after '{}'", token))?;
                    let (_, entry) = current
                        .as_mut()
                        .ok_or_else(|| format!("'{}' outside of a machine entry", token))?;
                    match token.as_str() {
                        "account" => entry.account = Some(value),
                        "password" => entry.password = value,
                        _ => entry.login = value,
                    }
                }
                other => return Err(format!("unexpected token '{}'", other)),
            }
        }

        if let Some((host, entry)) = current.take() {
            netrc.insert(host, entry);
        }

        Ok(netrc)
    }

    fn insert(&mut self, host: Option<String>, entry: NetrcEntry) {
        match host {
            Some(host) => {
                self.hosts.entry(host).or_insert(entry);
            }
            None => {
                if self.default.is_none() {
                    self.default = Some(entry);
                }
            }
        }
    }

    /// Looks up the entry for `host`, falling back to the `default` entry
    pub fn authenticators(&self, host: &str) -> Option<&NetrcEntry> {
        self.hosts.get(host).or(self.default.as_ref())
    }
}

/// Splits a netrc file into tokens, across line boundaries
struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    fn new(data: &'a str) -> Self {
        Self {
            chars: data.chars().peekable(),
            at_line_start: true,
        }
    }

    /// The next token in keyword position, skipping comments
    fn next_keyword(&mut self) -> Result<Option<String>, String> {
        loop {
            match self.next_token()? {
                Some((token, false)) if token.starts_with('#') => self.skip_line(),
                other => return Ok(other.map(|(token, _)| token)),
            }
        }
    }

    /// The next token in value position, where `#` carries no meaning
    fn next_value(&mut self) -> Result<Option<String>, String> {
        Ok(self.next_token()?.map(|(token, _)| token))
    }

    /// Reads a token, reporting whether it was quoted
    fn next_token(&mut self) -> Result<Option<(String, bool)>, String> {
        while let Some(&ch) = self.chars.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.chars.next();
        }

        let quoted = match self.chars.peek() {
            None => return Ok(None),
            Some('"') => {
                self.chars.next();
                true
            }
            Some(_) => false,
        };

        self.at_line_start = false;
        let mut token = String::new();
        loop {
            match self.chars.next() {
                Some('"') if quoted => return Ok(Some((token, true))),
                Some('\\') => match self.chars.next() {
                    Some(escaped) => token.push(escaped),
                    None => return Err("dangling escape at end of file".to_owned()),
                },
                Some(ch) if !quoted && ch.is_whitespace() => {
                    self.at_line_start = ch == '\n';
                    return Ok(Some((token, false)));
                }
                Some(ch) => token.push(ch),
                None if quoted => return Err("unterminated quoted value".to_owned()),
                None => return Ok(Some((token, false))),
            }
        }
    }

    /// Discards the remainder of the current line
    fn skip_line(&mut self) {
        if self.at_line_start {
            return;
        }
        for ch in self.chars.by_ref() {
            if ch == '\n' {
                break;
            }
        }
        self.at_line_start = true;
    }

    /// Discards a macro body, which ends at the first blank line
    fn skip_macro(&mut self) {
        self.skip_line();
        loop {
            let mut blank = true;
            let mut ended = false;
            for ch in self.chars.by_ref() {
                if ch == '\n' {
                    ended = true;
                    break;
                }
                blank &= ch.is_whitespace();
            }
            if blank || !ended {
                break;
            }
        }
        self.at_line_start = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# personal credentials
machine cas.example.com
    login jdoe
    password s3cret

machine other.example.com login alice account ops password pw2

macdef init
cd /pub
ls

default login anonymous password guest
";

    #[test]
    fn finds_machine_entry() {
        let netrc = Netrc::parse(SAMPLE).unwrap();
        let entry = netrc.authenticators("cas.example.com").unwrap();
        assert_eq!(entry.login, "jdoe");
        assert_eq!(entry.password, "s3cret");
        assert_eq!(entry.account, None);
    }

    #[test]
    fn parses_single_line_entries() {
        let netrc = Netrc::parse(SAMPLE).unwrap();
        let entry = netrc.authenticators("other.example.com").unwrap();
        assert_eq!(entry.login, "alice");
        assert_eq!(entry.account.as_deref(), Some("ops"));
        assert_eq!(entry.password, "pw2");
    }

    #[test]
    fn falls_back_to_default_entry() {
        let netrc = Netrc::parse(SAMPLE).unwrap();
        let entry = netrc.authenticators("unknown.example.com").unwrap();
        assert_eq!(entry.login, "anonymous");
        assert_eq!(entry.password, "guest");
    }

    #[test]
    fn missing_host_without_default_is_none() {
        let netrc = Netrc::parse("machine a.example login x password y").unwrap();
        assert!(netrc.authenticators("b.example").is_none());
    }

    #[test]
    fn first_entry_for_a_host_wins() {
        let netrc =
            Netrc::parse("machine a.example login first password 1\nmachine a.example login second password 2")
                .unwrap();
        assert_eq!(netrc.authenticators("a.example").unwrap().login, "first");
    }

    #[test]
    fn rejects_dangling_keyword() {
        assert!(Netrc::parse("machine a.example login").is_err());
    }

    #[test]
    fn rejects_credentials_outside_entry() {
        assert!(Netrc::parse("login x password y").is_err());
    }

    #[test]
    fn ignores_trailing_comment_after_entry() {
        let netrc =
            Netrc::parse("machine cas.example.com login jdoe password s3cret # work account\n")
                .unwrap();
        let entry = netrc.authenticators("cas.example.com").unwrap();
        assert_eq!(entry.login, "jdoe");
        assert_eq!(entry.password, "s3cret");
    }

    #[test]
    fn comment_does_not_swallow_the_next_line() {
        let netrc = Netrc::parse("machine cas.example.com # work\n login jdoe password s3cret\n")
            .unwrap();
        assert_eq!(netrc.authenticators("cas.example.com").unwrap().login, "jdoe");
    }

    #[test]
    fn accepts_quoted_values_with_escapes() {
        let netrc = Netrc::parse(
            r#"machine cas.example.com login jdoe password "two words \"quoted\"""#,
        )
        .unwrap();
        let entry = netrc.authenticators("cas.example.com").unwrap();
        assert_eq!(entry.password, r#"two words "quoted""#);
    }

    #[test]
    fn hash_in_value_position_is_part_of_the_value() {
        let netrc = Netrc::parse("machine cas.example.com login jdoe password #s3cret").unwrap();
        assert_eq!(netrc.authenticators("cas.example.com").unwrap().password, "#s3cret");
    }

    #[test]
    fn host_may_follow_machine_on_the_next_line() {
        let netrc = Netrc::parse("machine\ncas.example.com login jdoe password s3cret\n").unwrap();
        let entry = netrc.authenticators("cas.example.com").unwrap();
        assert_eq!(entry.login, "jdoe");
        assert_eq!(entry.password, "s3cret");
    }

    #[test]
    fn rejects_unterminated_quote() {
        assert!(Netrc::parse(r#"machine a.example login x password "open"#).is_err());
    }

    #[test]
    fn debug_output_hides_password() {
        let netrc = Netrc::parse(SAMPLE).unwrap();
        let entry = netrc.authenticators("cas.example.com").unwrap();
        assert!(!format!("{:?}", entry).contains("s3cret"));
    }
}
