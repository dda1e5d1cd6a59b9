//! In-memory collaborators for pipeline and handler tests.

use crate::{
    error::{ImageBotError, Result},
    models::{GeneratedImage, StoredImage},
    notify::Notifier,
    providers::{
        AttemptFailure, AttemptOutcome, FailureKind, ImageProvider, ImageProviderChain, TextModel,
    },
    service::ImageService,
    storage::ImageStore,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const SECRET: &str = "s3cret";

pub struct FakeTextModel {
    reply: std::result::Result<String, String>,
    calls: AtomicUsize,
}

impl FakeTextModel {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextModel for FakeTextModel {
    async fn generate(&self, _instruction: &str, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .map_err(ImageBotError::ProviderError)
    }
}

pub struct ScriptedProvider {
    name: String,
    outcome: AttemptOutcome,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn ok(name: &str, mime_type: &str, caption: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            outcome: AttemptOutcome::Success(GeneratedImage {
                data: format!("{}-bytes", name),
                mime_type: mime_type.to_string(),
                caption: caption.to_string(),
                provider: name.to_string(),
            }),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &str, kind: FailureKind) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            outcome: AttemptOutcome::Failure(AttemptFailure::new(
                name,
                kind,
                "HTTP 429: quota exceeded for key",
            )),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, _prompt: &str) -> AttemptOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub data_uri: String,
    pub folder: String,
    pub unique_name: String,
}

#[derive(Default)]
pub struct RecordingStore {
    pub uploads: Mutex<Vec<Upload>>,
    fail_with: Option<String>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            uploads: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        })
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageStore for RecordingStore {
    async fn upload(&self, data_uri: &str, folder: &str, unique_name: &str) -> Result<StoredImage> {
        self.uploads.lock().unwrap().push(Upload {
            data_uri: data_uri.to_string(),
            folder: folder.to_string(),
            unique_name: unique_name.to_string(),
        });
        if let Some(message) = &self.fail_with {
            return Err(ImageBotError::UploadError(message.clone()));
        }
        Ok(StoredImage {
            url: format!(
                "https://res.cloudinary.com/demo/image/upload/{}/{}.png",
                folder, unique_name
            ),
            public_id: format!("{}/{}", folder, unique_name),
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Message { chat_id: i64, text: String },
    Photo { chat_id: i64, url: String, caption: String },
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Sent>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Message {
            chat_id,
            text: text.to_string(),
        });
        if self.fail {
            return Err(ImageBotError::ProviderError("telegram down".into()));
        }
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, url: &str, caption: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Photo {
            chat_id,
            url: url.to_string(),
            caption: caption.to_string(),
        });
        if self.fail {
            return Err(ImageBotError::ProviderError("telegram down".into()));
        }
        Ok(())
    }
}

pub fn chain_of(providers: &[Arc<ScriptedProvider>]) -> ImageProviderChain {
    ImageProviderChain::new(
        providers
            .iter()
            .map(|p| p.clone() as Arc<dyn ImageProvider>)
            .collect(),
    )
}

pub fn service_with(
    providers: &[Arc<ScriptedProvider>],
    store: Arc<RecordingStore>,
) -> ImageService {
    ImageService::new(SECRET, chain_of(providers), store)
}

pub fn request(prompt: &str, secret: &str) -> crate::models::GenerationRequest {
    crate::models::GenerationRequest {
        prompt: prompt.to_string(),
        chat_id: 4242,
        user_id: crate::models::UserId::Text("user-1".into()),
        shared_secret: secret.to_string(),
    }
}

/// Answers exactly one HTTP request on a loopback port with `raw_response`.
/// Returns the base URL and a handle yielding the request as received.
pub async fn serve_raw(raw_response: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(raw_response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        request
    });

    (base_url, handle)
}

pub async fn serve_once(status: u16, body: &str) -> (String, JoinHandle<String>) {
    serve_raw(format!(
        "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    ))
    .await
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
