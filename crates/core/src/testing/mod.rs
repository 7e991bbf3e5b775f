//! Test doubles for the external collaborators of the queue core.
//!
//! # Example
//!
//! ```rust,ignore
//! use loket_core::testing::MockQrEncoder;
//!
//! let qr = Arc::new(MockQrEncoder::failing());
//! let sequencer = QueueSequencer::new(store, policy).with_qr_encoder(qr.clone());
//! // Ticket creation still succeeds, with no QR code attached.
//! ```

mod mock_qr;

pub use mock_qr::MockQrEncoder;
