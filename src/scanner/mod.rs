//! QR ingestion: live camera frames on a fixed interval, or one uploaded
//! still image. Both paths share decoding and catalog matching.

pub mod controller;
pub mod decoder;
pub mod frame;

pub use controller::{match_payload, ScanController, ScanStatus};
pub use decoder::{QrDecoder, RqrrDecoder};
pub use frame::{FrameSource, LumaFrame};
