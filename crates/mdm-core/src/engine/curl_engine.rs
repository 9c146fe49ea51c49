//! libcurl-backed transfer engine: one blocking Easy handle per transfer.

use std::cell::RefCell;
use std::str;

use tokio_util::sync::CancellationToken;

use crate::config::{HttpConfig, MdmConfig};

use super::head::ResponseHead;
use super::part::PartFile;
use super::{FetchRequest, TransferEngine, TransferError, TransferOutcome, TransferProgress};

/// Production engine. Cheap to share; holds only configuration.
#[derive(Debug, Clone, Default)]
pub struct CurlEngine {
    http: HttpConfig,
    auth_header: Option<String>,
}

impl CurlEngine {
    pub fn new(http: HttpConfig, auth_header: Option<String>) -> Self {
        Self { http, auth_header }
    }

    pub fn from_config(cfg: &MdmConfig) -> Self {
        Self::new(cfg.http.clone(), cfg.auth_header.clone())
    }

    fn configure(&self, easy: &mut curl::easy::Easy, url: &str) -> Result<(), curl::Error> {
        easy.url(url)?;
        easy.get(true)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.http.connect_timeout())?;
        // Prefer low-speed timeout so slow links are not killed by the wall clock.
        easy.low_speed_limit(self.http.low_speed_limit)?;
        easy.low_speed_time(self.http.low_speed_time())?;
        easy.timeout(self.http.timeout())?;
        easy.buffer_size(self.http.chunk_bytes.max(1024))?;
        easy.progress(true)?;
        if let Some(ua) = &self.http.user_agent {
            easy.useragent(ua)?;
        }
        if let Some(auth) = &self.auth_header {
            let mut list = curl::easy::List::new();
            list.append(&format!("Authorization: {}", auth.trim()))?;
            easy.http_headers(list)?;
        }
        Ok(())
    }

    /// Run the GET, streaming the body into `part`.
    fn stream(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
        part: &mut PartFile,
        on_progress: &mut dyn FnMut(TransferProgress),
    ) -> Result<(), TransferError> {
        let mut easy = curl::easy::Easy::new();
        self.configure(&mut easy, &request.url)?;

        let head = RefCell::new(ResponseHead::default());
        let write_error: RefCell<Option<std::io::Error>> = RefCell::new(None);

        let perform_result = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(line) = str::from_utf8(data) {
                    head.borrow_mut().observe_line(line);
                }
                true
            })?;
            transfer.write_function(|data| {
                if cancel.is_cancelled() {
                    return Ok(0);
                }
                let head = *head.borrow();
                // Error bodies never reach the destination file.
                if !head.is_success() {
                    return Ok(0);
                }
                if let Err(e) = part.write_chunk(data) {
                    write_error.borrow_mut().replace(e);
                    return Ok(0);
                }
                on_progress(TransferProgress {
                    bytes_transferred: part.written(),
                    bytes_total: head.content_length,
                });
                Ok(data.len())
            })?;
            transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
            transfer.perform()
        };

        if let Some(e) = write_error.into_inner() {
            return Err(TransferError::from_io(e));
        }
        let head = head.into_inner();
        if let Err(e) = perform_result {
            if e.is_write_error() && !head.is_success() {
                return Err(TransferError::Http(head.status.unwrap_or(0)));
            }
            return Err(TransferError::Curl(e));
        }

        let code = easy.response_code()?;
        if code != 0 && !(200..300).contains(&code) {
            return Err(TransferError::Http(code));
        }
        if let Some(expected) = head.content_length {
            let received = part.written();
            if received != expected {
                return Err(TransferError::PartialTransfer { expected, received });
            }
        }
        Ok(())
    }
}

impl TransferEngine for CurlEngine {
    fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
        on_progress: &mut dyn FnMut(TransferProgress),
    ) -> TransferOutcome {
        if cancel.is_cancelled() {
            return TransferOutcome::Cancelled;
        }
        let mut part = match PartFile::create(&request.destination) {
            Ok(p) => p,
            Err(e) => return TransferOutcome::Failed(TransferError::from_io(e)),
        };

        match self.stream(request, cancel, &mut part, on_progress) {
            Ok(()) => match part.commit() {
                Ok(bytes_written) => TransferOutcome::Done { bytes_written },
                Err(e) => TransferOutcome::Failed(TransferError::from_io(e)),
            },
            Err(_) if cancel.is_cancelled() => {
                part.discard();
                TransferOutcome::Cancelled
            }
            Err(e) => {
                tracing::debug!(url = %request.url, "transfer failed: {}", e);
                part.discard();
                TransferOutcome::Failed(e)
            }
        }
    }
}
