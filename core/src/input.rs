/*
 * SPDX-FileCopyrightText: 2025 Drydock Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use git_url_parse::GitUrl;
use std::fmt;

use super::consts::*;

#[derive(Debug)]
pub enum InputError {
    InvalidName(String),
    InvalidUrl(String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::InvalidName(msg) => write!(f, "Invalid name: {}", msg),
            InputError::InvalidUrl(msg) => write!(f, "Invalid repository URL: {}", msg),
        }
    }
}

impl std::error::Error for InputError {}

pub fn port_in_range(s: &str) -> Result<u16, String> {
    let port: usize = s
        .parse()
        .map_err(|_| format!("`{s}` is not a port number"))?;

    if PORT_RANGE.contains(&port) {
        Ok(port as u16)
    } else {
        Err(format!(
            "port not in range {}-{}",
            PORT_RANGE.start(),
            PORT_RANGE.end()
        ))
    }
}

pub fn greater_than_zero<
    T: std::str::FromStr + std::cmp::PartialOrd + std::fmt::Display + Default,
>(
    s: &str,
) -> Result<T, String> {
    let num: T = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid number", s))?;

    if num > T::default() {
        Ok(num)
    } else {
        Err(format!("`{}` is not larger than 0", s))
    }
}

pub fn hex_to_vec(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err("invalid hex string".to_string());
    }

    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}

pub fn vec_to_hex(v: &[u8]) -> String {
    v.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn check_index_name(s: &str) -> Result<(), InputError> {
    if s.is_empty() {
        return Err(InputError::InvalidName("Name cannot be empty".to_string()));
    }

    if s != s.to_lowercase() {
        return Err(InputError::InvalidName("Name must be lowercase".to_string()));
    }

    if s.contains(|c: char| !c.is_ascii_alphanumeric() && c != '-') {
        return Err(InputError::InvalidName(
            "Name can only contain letters, numbers, and dashes".to_string(),
        ));
    }

    if s.starts_with('-') || s.ends_with('-') {
        return Err(InputError::InvalidName(
            "Name can only start and end with letters or numbers".to_string(),
        ));
    }

    Ok(())
}

/// Canonical `host/owner/repo` form of a repository URL, so the https and ssh
/// spellings of the same repository compare equal.
pub fn normalize_repository_url(url: &str) -> Result<String, InputError> {
    let parsed = GitUrl::parse(url).map_err(|e| InputError::InvalidUrl(e.to_string()))?;

    let host = parsed
        .host
        .ok_or_else(|| InputError::InvalidUrl(format!("no host in `{}`", url)))?;

    Ok(format!(
        "{}/{}",
        host.to_lowercase(),
        parsed.fullname.to_lowercase()
    ))
}

pub fn load_secret(f: &str) -> String {
    let s = std::fs::read_to_string(f).unwrap_or_default();
    s.trim().replace(char::from(25), "")
}

/// At most the first `n` characters of `s`, without slicing inside a
/// multibyte character. Commit hashes and container ids are usually ascii,
/// but webhook payloads are not trusted to be.
pub fn short_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let bytes = vec![0xde, 0xad, 0xbe, 0xef];
        let hex = vec_to_hex(&bytes);
        assert_eq!(hex, "deadbeef");
        assert_eq!(hex_to_vec(&hex).unwrap(), bytes);
    }

    #[test]
    fn test_hex_to_vec_rejects_invalid() {
        assert!(hex_to_vec("abc").is_err());
        assert!(hex_to_vec("zz").is_err());
    }

    #[test]
    fn test_normalize_repository_url_equates_https_and_ssh() {
        let https = normalize_repository_url("https://github.com/Example/App.git").unwrap();
        let ssh = normalize_repository_url("git@github.com:example/app.git").unwrap();
        assert_eq!(https, "github.com/example/app");
        assert_eq!(https, ssh);
    }

    #[test]
    fn test_check_index_name() {
        assert!(check_index_name("my-app").is_ok());
        assert!(check_index_name("").is_err());
        assert!(check_index_name("My-App").is_err());
        assert!(check_index_name("-app").is_err());
        assert!(check_index_name("my app").is_err());
    }

    #[test]
    fn test_short_prefix_respects_char_boundaries() {
        assert_eq!(short_prefix("0123abcd0123abcd", 8), "0123abcd");
        assert_eq!(short_prefix("abc", 8), "abc");
        assert_eq!(short_prefix("日本語のコミットです", 8), "日本語のコミット");
        assert_eq!(short_prefix("", 8), "");
    }

    #[test]
    fn test_load_secret_trims_and_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        std::fs::write(&path, "s3cret\n").unwrap();

        assert_eq!(load_secret(path.to_str().unwrap()), "s3cret");
        assert_eq!(load_secret("/nonexistent/secret"), "");
    }

    #[test]
    fn test_port_in_range() {
        assert_eq!(port_in_range("3000").unwrap(), 3000);
        assert!(port_in_range("0").is_err());
        assert!(port_in_range("70000").is_err());
    }
}
