//! QR rendering for ticket slips.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use qrcode::{types::Color, QrCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::QrConfig;
use crate::ticket::Ticket;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("Failed to encode QR payload: {0}")]
    Encode(String),

    #[error("Failed to serialize QR payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Data printed on the ticket slip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TicketQrPayload {
    pub ticket_number: String,
    pub service_type: String,
    pub scheduled_date: String,
    pub scheduled_time: String,
}

impl From<&Ticket> for TicketQrPayload {
    fn from(ticket: &Ticket) -> Self {
        Self {
            ticket_number: ticket.ticket_number.clone(),
            service_type: ticket.service_type.as_str().to_string(),
            scheduled_date: ticket.scheduled_date.format("%Y-%m-%d").to_string(),
            scheduled_time: ticket.scheduled_time.clone(),
        }
    }
}

impl TicketQrPayload {
    pub fn to_json(&self) -> Result<String, QrError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Turns a payload into an embeddable image.
pub trait QrEncoder: Send + Sync {
    /// Returns a data URL.
    fn encode(&self, payload: &str) -> Result<String, QrError>;
}

/// Renders QR codes as SVG data URLs.
#[derive(Debug, Clone)]
pub struct SvgQrEncoder {
    scale: u32,
    margin: u32,
}

impl SvgQrEncoder {
    pub fn new(scale: u32, margin: u32) -> Self {
        Self {
            scale: scale.max(1),
            margin,
        }
    }

    pub fn from_config(config: &QrConfig) -> Self {
        Self::new(config.scale, config.margin)
    }

    /// Render the SVG document for a payload.
    pub fn render_svg(&self, payload: &str) -> Result<String, QrError> {
        let code =
            QrCode::new(payload.as_bytes()).map_err(|e| QrError::Encode(e.to_string()))?;
        let module_count = code.width() as u32;
        let image_size = (module_count + self.margin * 2) * self.scale;
        let colors = code.to_colors();

        let mut svg = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 {size} {size}" shape-rendering="crispEdges"><rect width="{size}" height="{size}" fill="#ffffff"/>"##,
            size = image_size
        );

        for y in 0..module_count {
            for x in 0..module_count {
                let index = (y * module_count + x) as usize;
                if colors[index] == Color::Dark {
                    let x0 = (x + self.margin) * self.scale;
                    let y0 = (y + self.margin) * self.scale;
                    svg.push_str(&format!(
                        r##"<rect x="{}" y="{}" width="{s}" height="{s}" fill="#000000"/>"##,
                        x0,
                        y0,
                        s = self.scale
                    ));
                }
            }
        }

        svg.push_str("</svg>");
        Ok(svg)
    }
}

impl Default for SvgQrEncoder {
    fn default() -> Self {
        Self::from_config(&QrConfig::default())
    }
}

impl QrEncoder for SvgQrEncoder {
    fn encode(&self, payload: &str) -> Result<String, QrError> {
        let svg = self.render_svg(payload)?;
        Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg)))
    }
}
