//! Local HTTP listener for the OAuth redirect
//!
//! A short-lived server bound to 127.0.0.1 that exists for one login
//! attempt: it captures the provider redirect (`?code=` or `?error=`),
//! answers the browser with a confirmation page, and hands the result
//! to the waiting login flow exactly once. Instances are not reused;
//! a second login constructs a fresh server.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};

const SUCCESS_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <!DOCTYPE html><html><body style='font-family: sans-serif; padding: 40px; text-align: center;'>\
    <h1>Authentication complete</h1><p>You can close this tab and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <!DOCTYPE html><html><body style='font-family: sans-serif; padding: 40px; text-align: center;'>\
    <h1>Authentication failed</h1><p>You can close this tab; check the terminal for details.</p></body></html>";

const NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Ephemeral listener that captures the OAuth redirect.
///
/// State machine: Idle → `start` → Listening → first code/error
/// redirect, timeout, or cancellation → terminal, socket closed.
#[async_trait]
pub trait CallbackServer: Send {
    /// Redirect URI to register with the provider. After `start` this
    /// reflects the actually bound port.
    fn redirect_uri(&self) -> String;

    /// Bind the listener. Fails with `Error::PortInUse` if the port is
    /// taken; no fallback port is tried.
    async fn start(&mut self) -> Result<()>;

    /// Block until the redirect arrives or `timeout` elapses. The
    /// listener is closed before this returns, on every path.
    async fn wait_for_code(&mut self, timeout: Duration) -> Result<String>;

    /// Shut the listener down (idempotent).
    async fn stop(&mut self);
}

/// `CallbackServer` over a tokio TcpListener on 127.0.0.1.
pub struct LocalCallbackServer {
    port: u16,
    bound_port: Option<u16>,
    rx: Option<oneshot::Receiver<Result<String>>>,
    task: Option<JoinHandle<()>>,
}

impl LocalCallbackServer {
    /// Create a server for `port`. Port 0 binds an ephemeral port
    /// (used by tests); the real port is known after `start`.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            bound_port: None,
            rx: None,
            task: None,
        }
    }
}

#[async_trait]
impl CallbackServer for LocalCallbackServer {
    fn redirect_uri(&self) -> String {
        format!(
            "http://127.0.0.1:{}/callback",
            self.bound_port.unwrap_or(self.port)
        )
    }

    async fn start(&mut self) -> Result<()> {
        let listener = match TcpListener::bind(("127.0.0.1", self.port)).await {
            Ok(listener) => listener,
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                return Err(Error::PortInUse(self.port));
            }
            Err(e) => return Err(e.into()),
        };

        let port = listener.local_addr()?.port();
        self.bound_port = Some(port);

        let (tx, rx) = oneshot::channel();
        self.rx = Some(rx);
        self.task = Some(tokio::spawn(serve(listener, tx)));

        debug!(port, "OAuth callback listener started");
        Ok(())
    }

    async fn wait_for_code(&mut self, timeout: Duration) -> Result<String> {
        let rx = match self.rx.take() {
            Some(rx) => rx,
            None => return Err(Error::OAuth("callback server not started".to_string())),
        };

        let outcome = tokio::select! {
            res = rx => res.unwrap_or_else(|_| {
                Err(Error::OAuth("callback listener exited unexpectedly".to_string()))
            }),
            _ = tokio::time::sleep(timeout) => Err(Error::OAuthTimeout(timeout.as_secs())),
        };

        // Terminal state either way: release the socket before returning
        self.stop().await;
        outcome
    }

    async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            debug!("OAuth callback listener stopped");
        }
    }
}

async fn serve(listener: TcpListener, tx: oneshot::Sender<Result<String>>) {
    let mut tx = Some(tx);
    loop {
        let (stream, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Callback listener accept failed: {}", e);
                continue;
            }
        };

        match handle_connection(stream).await {
            Ok(Some(outcome)) => {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(outcome);
                }
                return;
            }
            // Unrelated request (favicon and friends): keep listening
            Ok(None) => {}
            Err(e) => debug!("Callback connection error: {}", e),
        }
    }
}

async fn handle_connection(mut stream: TcpStream) -> Result<Option<Result<String>>> {
    let request_line = {
        let mut reader = BufReader::new(&mut stream);
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        line
    };

    match parse_redirect(&request_line) {
        None => {
            stream.write_all(NOT_FOUND.as_bytes()).await?;
            stream.flush().await?;
            Ok(None)
        }
        Some(outcome) => {
            // Respond to the browser first so shutdown never races the
            // page write.
            let page = if outcome.is_ok() { SUCCESS_PAGE } else { FAILURE_PAGE };
            stream.write_all(page.as_bytes()).await?;
            stream.flush().await?;
            Ok(Some(outcome))
        }
    }
}

/// Parse `GET /callback?code=... HTTP/1.1` into the flow outcome.
/// Returns `None` for requests that are not an OAuth redirect.
fn parse_redirect(request_line: &str) -> Option<Result<String>> {
    let path = request_line.split_whitespace().nth(1)?;
    let query = path.split_once('?').map(|(_, q)| q).unwrap_or("");

    let mut code = None;
    let mut error = None;
    let mut description = None;

    for param in query.split('&') {
        let (key, value) = match param.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        let value = urlencoding::decode(&value.replace('+', " "))
            .map(|v| v.into_owned())
            .unwrap_or_default();
        match key {
            "code" => code = Some(value),
            "error" => error = Some(value),
            "error_description" => description = Some(value),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Err(Error::OAuthDenied {
            error,
            description: description.unwrap_or_default(),
        }));
    }

    code.map(Ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    async fn started_server() -> (LocalCallbackServer, u16) {
        let mut server = LocalCallbackServer::new(0);
        server.start().await.unwrap();
        let port = server.bound_port.unwrap();
        (server, port)
    }

    #[tokio::test]
    async fn test_callback_success_delivers_code() {
        let (mut server, port) = started_server().await;
        assert_eq!(
            server.redirect_uri(),
            format!("http://127.0.0.1:{}/callback", port)
        );

        let request = tokio::spawn(async move {
            reqwest::get(format!("http://127.0.0.1:{}/callback?code=abc123", port))
                .await
                .unwrap()
        });

        let code = server.wait_for_code(Duration::from_secs(5)).await.unwrap();
        assert_eq!(code, "abc123");

        let response = request.await.unwrap();
        assert_eq!(response.status(), 200);
        assert!(response.text().await.unwrap().contains("close this tab"));
    }

    #[tokio::test]
    async fn test_callback_provider_error() {
        let (mut server, port) = started_server().await;

        tokio::spawn(async move {
            let _ = reqwest::get(format!(
                "http://127.0.0.1:{}/callback?error=access_denied&error_description=User+denied",
                port
            ))
            .await;
        });

        let err = server
            .wait_for_code(Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("access_denied"));
        assert!(err.to_string().contains("User denied"));
    }

    #[tokio::test]
    async fn test_unrelated_requests_are_ignored() {
        let (mut server, port) = started_server().await;

        tokio::spawn(async move {
            let favicon = reqwest::get(format!("http://127.0.0.1:{}/favicon.ico", port))
                .await
                .unwrap();
            assert_eq!(favicon.status(), 404);

            let _ = reqwest::get(format!("http://127.0.0.1:{}/callback?code=later", port)).await;
        });

        let code = server.wait_for_code(Duration::from_secs(5)).await.unwrap();
        assert_eq!(code, "later");
    }

    #[tokio::test]
    async fn test_timeout_closes_listener() {
        let (mut server, port) = started_server().await;

        let start = Instant::now();
        let err = server
            .wait_for_code(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OAuthTimeout(_)));
        assert!(start.elapsed() < Duration::from_millis(200));

        // Socket must be released: the port is immediately bindable
        std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();
    }

    #[tokio::test]
    async fn test_port_in_use() {
        let holder = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = holder.local_addr().unwrap().port();

        let mut server = LocalCallbackServer::new(port);
        let err = server.start().await.unwrap_err();
        assert!(matches!(err, Error::PortInUse(p) if p == port));
    }
}
