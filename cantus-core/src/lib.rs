// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core bit-level I/O, checksums, and error types shared by the Cantus crates.

pub mod checksum;
pub mod errors;
pub mod io;
pub mod util;
