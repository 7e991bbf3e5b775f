//! Mock QR encoder for testing.

use std::sync::Mutex;

use crate::qr::{QrEncoder, QrError};

/// Mock implementation of the QrEncoder trait.
///
/// Records every payload and returns a predictable data URL, or fails on
/// demand to exercise the degraded path of ticket creation.
#[derive(Debug, Default)]
pub struct MockQrEncoder {
    payloads: Mutex<Vec<String>>,
    fail: Mutex<bool>,
}

impl MockQrEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// An encoder whose every call fails.
    pub fn failing() -> Self {
        let encoder = Self::new();
        encoder.set_failing(true);
        encoder
    }

    pub fn set_failing(&self, fail: bool) {
        if let Ok(mut guard) = self.fail.lock() {
            *guard = fail;
        }
    }

    /// Payloads received so far, oldest first.
    pub fn recorded_payloads(&self) -> Vec<String> {
        self.payloads
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

impl QrEncoder for MockQrEncoder {
    fn encode(&self, payload: &str) -> Result<String, QrError> {
        if let Ok(mut payloads) = self.payloads.lock() {
            payloads.push(payload.to_string());
        }

        if self.fail.lock().map(|f| *f).unwrap_or(false) {
            return Err(QrError::Encode("mock encoder failure".to_string()));
        }

        Ok(format!("data:text/plain,{}", payload.len()))
    }
}
