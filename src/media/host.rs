use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::context::MediaContext;
use crate::audio::MediaDevices;
use crate::config::CaptureConfig;
use crate::error::{with_timeout, CaptureError};
use crate::messages::{Ack, OffscreenCommand, OffscreenReply};
use crate::platform::{ContextHost, ContextType, CreateDocumentParams, ExtensionContext, OffscreenBus};

const COMMAND_QUEUE_CAPACITY: usize = 32;

struct Envelope {
    command: OffscreenCommand,
    reply: oneshot::Sender<OffscreenReply>,
}

struct RunningDocument {
    url: String,
    sender: mpsc::Sender<Envelope>,
    task: JoinHandle<()>,
}

impl RunningDocument {
    fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// In-process host for the offscreen document.
///
/// Each created document runs one [`MediaContext`] on its own task, fed by a
/// FIFO queue. Closing the document releases its capture; the next document
/// starts idle.
pub struct LocalOffscreenHost {
    devices: Arc<dyn MediaDevices>,
    config: CaptureConfig,
    document: Mutex<Option<RunningDocument>>,
    created: AtomicUsize,
}

impl LocalOffscreenHost {
    pub fn new(devices: Arc<dyn MediaDevices>, config: CaptureConfig) -> Self {
        Self {
            devices,
            config,
            document: Mutex::new(None),
            created: AtomicUsize::new(0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_document()
            .as_ref()
            .map(RunningDocument::is_alive)
            .unwrap_or(false)
    }

    /// Number of documents created over the host's lifetime
    pub fn documents_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Tear the document down, as the browser may do at any time.
    ///
    /// Returns false when no document was running.
    pub async fn close_document(&self) -> bool {
        let document = self.lock_document().take();
        match document {
            Some(RunningDocument { url, sender, task }) => {
                drop(sender);
                if let Err(e) = task.await {
                    log::error!("Offscreen document task for {} failed: {}", url, e);
                }
                log::info!("📄 Offscreen document {} closed", url);
                true
            }
            None => false,
        }
    }

    fn lock_document(&self) -> std::sync::MutexGuard<'_, Option<RunningDocument>> {
        match self.document.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Recovering from poisoned mutex in LocalOffscreenHost");
                poisoned.into_inner()
            }
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<Envelope>> {
        self.lock_document()
            .as_ref()
            .filter(|doc| doc.is_alive())
            .map(|doc| doc.sender.clone())
    }
}

async fn run_document(mut context: MediaContext, mut receiver: mpsc::Receiver<Envelope>) {
    while let Some(Envelope { command, reply }) = receiver.recv().await {
        let name = command.name();
        let is_capture = matches!(command, OffscreenCommand::CaptureTab { .. });
        let response = context.handle(command).await;
        let started_capture = is_capture && response == OffscreenReply::Ack(Ack::On);
        if reply.send(response).is_err() {
            log::warn!("Reply to {} dropped, sender stopped waiting", name);
            // Nobody learned about this capture, so it must not stay live
            if started_capture && context.release_tab() {
                log::warn!("Released capture started by an abandoned captureTab");
            }
        }
    }
    context.shutdown();
}

#[async_trait]
impl ContextHost for LocalOffscreenHost {
    async fn get_contexts(&self) -> Result<Vec<ExtensionContext>, CaptureError> {
        let contexts = self
            .lock_document()
            .as_ref()
            .filter(|doc| doc.is_alive())
            .map(|doc| ExtensionContext {
                context_type: ContextType::OffscreenDocument,
                document_url: Some(doc.url.clone()),
            })
            .into_iter()
            .collect();
        Ok(contexts)
    }

    async fn create_document(&self, params: &CreateDocumentParams) -> Result<(), CaptureError> {
        if params.reasons.is_empty() {
            return Err(CaptureError::ContextUnavailable(
                "offscreen document needs at least one reason".to_string(),
            ));
        }

        let mut document = self.lock_document();
        if document.as_ref().map(RunningDocument::is_alive).unwrap_or(false) {
            return Err(CaptureError::ContextUnavailable(
                "only a single offscreen document may be created".to_string(),
            ));
        }

        let (sender, receiver) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let context = MediaContext::new(self.devices.clone(), &self.config);
        let task = tokio::spawn(run_document(context, receiver));

        *document = Some(RunningDocument {
            url: params.url.clone(),
            sender,
            task,
        });
        let count = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!(
            "📄 Offscreen document {} created ({:?}, #{}) - {}",
            params.url,
            params.reasons,
            count,
            params.justification
        );
        Ok(())
    }
}

#[async_trait]
impl OffscreenBus for LocalOffscreenHost {
    async fn send(&self, command: OffscreenCommand) -> Result<OffscreenReply, CaptureError> {
        let sender = self.sender().ok_or_else(|| {
            CaptureError::ContextUnavailable(format!(
                "no offscreen document to receive {}",
                command.name()
            ))
        })?;

        let name = command.name();
        with_timeout("offscreen message", self.config.message_timeout(), async move {
            let (reply, response) = oneshot::channel();
            sender
                .send(Envelope { command, reply })
                .await
                .map_err(|_| CaptureError::ContextUnavailable(format!("offscreen document closed before {}", name)))?;
            response
                .await
                .map_err(|_| CaptureError::ContextUnavailable(format!("offscreen document closed during {}", name)))
        })
        .await
    }
}
