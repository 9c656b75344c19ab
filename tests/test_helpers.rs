#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use sd_img2img_node::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// One call to [`FakeTransport::submit`].
#[derive(Debug, Clone)]
pub struct Submission {
    pub url: String,
    pub body: String,
    pub auth_header: Option<String>,
}

impl Submission {
    pub fn request(&self) -> GenerationRequest {
        codec::decode_request(&self.body).unwrap()
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Body(String),
    Status(u16),
    Refuse,
}

/// In-process transport that answers with a canned reply after `delay`.
#[derive(Debug, Clone)]
pub struct FakeTransport {
    reply: Reply,
    delay: Duration,
    submissions: Arc<Mutex<Vec<Submission>>>,
}

impl FakeTransport {
    pub fn replying(body: impl Into<String>) -> Self {
        Self::new(Reply::Body(body.into()))
    }

    pub fn failing_with_status(status: u16) -> Self {
        Self::new(Reply::Status(status))
    }

    /// Rejects every submission, as if the URL were malformed.
    pub fn refusing() -> Self {
        Self::new(Reply::Refuse)
    }

    fn new(reply: Reply) -> Self {
        Self {
            reply,
            delay: Duration::from_millis(100),
            submissions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> GenerationRequest {
        self.submissions().last().expect("no submission recorded").request()
    }
}

impl Transport for FakeTransport {
    fn submit(&self, url: &str, body: String, auth_header: Option<String>) -> Result<PendingResponse> {
        if let Reply::Refuse = self.reply {
            return Err(NodeError::InvalidUrl {
                url: url.to_string(),
                reason: "refused by fake transport".into(),
            });
        }

        self.submissions.lock().unwrap().push(Submission {
            url: url.to_string(),
            body,
            auth_header,
        });

        let reply = self.reply.clone();
        let delay = self.delay;
        Ok(PendingResponse::spawn(async move {
            tokio::time::sleep(delay).await;
            match reply {
                Reply::Body(body) => Ok(body),
                Reply::Status(status) => Err(NodeError::Http {
                    status,
                    body: "Internal Server Error".into(),
                }),
                Reply::Refuse => unreachable!(),
            }
        }))
    }
}

/// Always returns the same seed.
pub struct FixedSeeds(pub i64);

impl SeedSource for FixedSeeds {
    fn next_seed(&self, _min: i64, _max: i64) -> i64 {
        self.0
    }
}

pub fn solid_image(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(rgba))
}

pub fn png_base64(width: u32, height: u32) -> String {
    codec::encode_image(&solid_image(width, height, [200, 100, 50, 255])).unwrap()
}

pub fn response_json(images: &[String], info: &str) -> String {
    serde_json::json!({ "images": images, "info": info }).to_string()
}

/// Response with one `width`x`height` image and the given reported seed.
pub fn success_response(width: u32, height: u32, seed: i64) -> String {
    response_json(&[png_base64(width, height)], &format!("{{\"seed\":{}}}", seed))
}

pub fn source_bindings(width: u32, height: u32) -> InputBindings {
    InputBindings::new()
        .with(
            InputPort::InImage,
            PortValue::Image(Arc::new(solid_image(width, height, [0, 128, 255, 255]))),
        )
        .with(
            InputPort::Prompt,
            PortValue::Prompt(Prompt::new("a quiet harbor").negative("blurry")),
        )
}

pub fn node_with(transport: FakeTransport) -> Img2ImgNode<FakeTransport> {
    Img2ImgNode::with_transport(ServerConfig::default(), transport).with_seed_source(FixedSeeds(4242))
}

/// Records every event the node publishes.
pub fn record_events<T: Transport>(node: &mut Img2ImgNode<T>) -> Arc<Mutex<Vec<NodeEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    node.on_event(move |event: &NodeEvent| sink.lock().unwrap().push(event.clone()));
    events
}

pub fn states(events: &Arc<Mutex<Vec<NodeEvent>>>) -> Vec<WorkflowState> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            NodeEvent::StateChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}

/// Accept one HTTP request on a local port, answer it with `response_body`,
/// and hand back the raw request text.
pub async fn serve_once(response_body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let raw = read_request(&mut socket).await;
        let reply = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            response_body.len(),
            response_body
        );
        socket.write_all(reply.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        raw
    });

    (format!("http://{}", addr), handle)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}
