// SPDX-License-Identifier: GPL-3.0-only

//! Input intake: verdicting raw codes into scan events

pub mod event;
pub mod normalizer;

pub use event::{Confirmation, ScanEvent, ScanSource};
pub use normalizer::{InputNormalizer, MANUAL_SEPARATOR, compose_manual, split_manual};
