// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Message decoding: payload cursor, decoder trees, and the
//! per-connection message iterator.

pub mod cursor;
pub mod decoder;
pub mod iter;

pub use decoder::{ArrayField, Field, MessageDecoder};
pub use iter::MessageIterator;
