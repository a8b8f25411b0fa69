// SPDX-License-Identifier: MPL-2.0

//! Non exposed modules.

pub mod arena;
pub mod flatten;
pub mod interning;
pub mod walker;
