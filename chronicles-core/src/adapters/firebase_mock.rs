//! Mock Identity Toolkit server for testing
//!
//! Simulates the Firebase Auth emulator closely enough to exercise the
//! Firebase adapter without a real project:
//! - POST /identitytoolkit.googleapis.com/v1/accounts:signUp
//! - POST /identitytoolkit.googleapis.com/v1/accounts:signInWithPassword
//! - POST /identitytoolkit.googleapis.com/v1/accounts:update
//!
//! Errors use the real shape: `{ "error": { "code": 400, "message": "EMAIL_EXISTS" } }`.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use serde::{Deserialize, Serialize};
use serde_json::json;

const PATH_PREFIX: &str = "/identitytoolkit.googleapis.com/v1";

/// Configuration for the mock server
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Accounts that exist when the server starts (email, password)
    pub accounts: Vec<(String, String)>,
    /// Whether `accounts:update` should fail
    pub fail_update: bool,
    /// Whether every call answers 503
    pub unavailable: bool,
    /// Delay in milliseconds before responding
    pub delay_ms: u64,
}

impl MockConfig {
    pub fn with_account(mut self, email: &str, password: &str) -> Self {
        self.accounts.push((email.to_string(), password.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
struct MockAccount {
    uid: String,
    password: String,
    display_name: Option<String>,
}

#[derive(Default)]
struct MockState {
    accounts: HashMap<String, MockAccount>,
    next_uid: AtomicU64,
}

impl MockState {
    fn insert(&mut self, email: &str, password: &str) -> MockAccount {
        let n = self.next_uid.fetch_add(1, Ordering::SeqCst) + 1;
        let account = MockAccount {
            uid: format!("mock-uid-{n:04}"),
            password: password.to_string(),
            display_name: None,
        };
        self.accounts.insert(email.to_string(), account.clone());
        account
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    #[serde(default)]
    id_token: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthBody<'a> {
    local_id: &'a str,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    id_token: String,
    refresh_token: String,
    expires_in: &'static str,
}

/// Mock Identity Toolkit server for testing
pub struct MockIdentityServer {
    port: u16,
    running: Arc<AtomicBool>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl MockIdentityServer {
    /// Start a new mock server on a random available port
    pub fn start(config: MockConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let mut state = MockState::default();
        for (email, password) in &config.accounts {
            state.insert(email, password);
        }
        let state = Arc::new(Mutex::new(state));

        // Non-blocking so stop() is noticed
        listener.set_nonblocking(true)?;

        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let cfg = config.clone();
                        let state = Arc::clone(&state);
                        thread::spawn(move || {
                            handle_connection(stream, &cfg, &state);
                        });
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            thread_handle: Some(thread_handle),
        })
    }

    /// `host:port`, as an emulator host setting would carry it
    pub fn host(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Identity Toolkit base URL served by this mock
    pub fn base_url(&self) -> String {
        format!("http://{}{}", self.host(), PATH_PREFIX)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockIdentityServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read headers and the full body (reqwest may send them in separate writes)
fn read_request(stream: &mut TcpStream) -> Option<(String, String)> {
    stream.set_nonblocking(false).ok()?;
    let mut data = Vec::new();
    let mut buffer = [0; 4096];

    let header_end = loop {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buffer[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while data.len() < header_end + content_length {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..n]);
    }

    let body = String::from_utf8_lossy(&data[header_end..]).to_string();
    Some((head, body))
}

fn handle_connection(mut stream: TcpStream, config: &MockConfig, state: &Mutex<MockState>) {
    let Some((head, body)) = read_request(&mut stream) else {
        return;
    };

    if config.delay_ms > 0 {
        thread::sleep(std::time::Duration::from_millis(config.delay_ms));
    }

    let first_line = head.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        send_error(&mut stream, 400, "INVALID_REQUEST");
        return;
    }
    let (method, path) = (parts[0], parts[1]);

    if config.unavailable {
        send_response(&mut stream, 503, "Service Unavailable", "Service Unavailable");
        return;
    }

    let (route, query) = path.split_once('?').unwrap_or((path, ""));
    let has_valid_key = query
        .split('&')
        .any(|pair| pair.starts_with("key=test_"));
    if !has_valid_key {
        send_error(&mut stream, 400, "API key not valid. Please pass a valid API key.");
        return;
    }

    if method != "POST" {
        send_response(&mut stream, 405, "Method Not Allowed", "");
        return;
    }

    let mut state = state.lock().unwrap();
    match route.strip_prefix(PATH_PREFIX) {
        Some("/accounts:signInWithPassword") => {
            let Ok(req) = serde_json::from_str::<PasswordBody>(&body) else {
                send_error(&mut stream, 400, "INVALID_REQUEST");
                return;
            };
            match state.accounts.get(&req.email) {
                Some(account) if account.password == req.password => {
                    send_auth(&mut stream, &req.email, account);
                }
                _ => send_error(&mut stream, 400, "INVALID_LOGIN_CREDENTIALS"),
            }
        }
        Some("/accounts:signUp") => {
            let Ok(req) = serde_json::from_str::<PasswordBody>(&body) else {
                send_error(&mut stream, 400, "INVALID_REQUEST");
                return;
            };
            if !req.email.contains('@') {
                send_error(&mut stream, 400, "INVALID_EMAIL");
            } else if state.accounts.contains_key(&req.email) {
                send_error(&mut stream, 400, "EMAIL_EXISTS");
            } else if req.password.chars().count() < 6 {
                send_error(
                    &mut stream,
                    400,
                    "WEAK_PASSWORD : Password should be at least 6 characters",
                );
            } else {
                let account = state.insert(&req.email, &req.password);
                send_auth(&mut stream, &req.email, &account);
            }
        }
        Some("/accounts:update") => {
            if config.fail_update {
                send_error(&mut stream, 500, "INTERNAL_ERROR");
                return;
            }
            let Ok(req) = serde_json::from_str::<UpdateBody>(&body) else {
                send_error(&mut stream, 400, "INVALID_REQUEST");
                return;
            };
            let uid = req.id_token.strip_prefix("id-token-").unwrap_or_default();
            let found = state.accounts.values_mut().find(|a| a.uid == uid);
            match found {
                Some(account) => {
                    account.display_name = req.display_name.clone();
                    let json = json!({
                        "localId": account.uid,
                        "displayName": account.display_name,
                    });
                    send_response(&mut stream, 200, "OK", &json.to_string());
                }
                None => send_error(&mut stream, 400, "INVALID_ID_TOKEN"),
            }
        }
        _ => send_error(&mut stream, 404, "NOT_FOUND"),
    }
}

fn send_auth(stream: &mut TcpStream, email: &str, account: &MockAccount) {
    let body = AuthBody {
        local_id: &account.uid,
        email,
        display_name: account.display_name.as_deref(),
        id_token: format!("id-token-{}", account.uid),
        refresh_token: format!("refresh-token-{}", account.uid),
        expires_in: "3600",
    };
    let json = serde_json::to_string(&body).unwrap();
    send_response(stream, 200, "OK", &json);
}

fn send_error(stream: &mut TcpStream, status: u16, message: &str) {
    let body = json!({ "error": { "code": status, "message": message } });
    let status_text = match status {
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Internal Server Error",
    };
    send_response(stream, status, status_text, &body.to_string());
}

fn send_response(stream: &mut TcpStream, status: u16, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::firebase::FirebaseBackend;
    use crate::config::FirebaseConfig;
    use crate::ports::IdentityBackend;

    #[test]
    fn test_mock_server_starts() {
        let server = MockIdentityServer::start(MockConfig::default()).unwrap();
        assert!(server.base_url().ends_with(PATH_PREFIX));
    }

    #[tokio::test]
    async fn test_backend_via_emulator_host() {
        let server = MockIdentityServer::start(
            MockConfig::default().with_account("user@example.com", "correct-pw"),
        )
        .unwrap();

        let config = FirebaseConfig {
            api_key: Some("test_key".to_string()),
            emulator_host: Some(server.host()),
            ..Default::default()
        };
        let backend = FirebaseBackend::new(&config, None).unwrap();
        assert_eq!(backend.base_url(), server.base_url());

        let identity = backend.sign_in("user@example.com", "correct-pw").await.unwrap();
        assert!(identity.uid.starts_with("mock-uid-"));
    }

    #[tokio::test]
    async fn test_signup_visible_to_later_sign_in() {
        let server = MockIdentityServer::start(MockConfig::default()).unwrap();
        let backend =
            FirebaseBackend::new_with_base_url("test_key", &server.base_url(), None).unwrap();

        let created = backend.create_account("new@example.com", "StrongPass1").await.unwrap();
        let signed_in = backend.sign_in("new@example.com", "StrongPass1").await.unwrap();
        assert_eq!(created.uid, signed_in.uid);
    }
}
