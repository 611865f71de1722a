/*
 *  Copyright (C) 2025 Michael Bachmann
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU Affero General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU Affero General Public License for more details.
 *
 *  You should have received a copy of the GNU Affero General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Consumer-side Ember+ library: S101 framing, BER/TLV codec, the Ember
//! tree model with its merge engine, and a tokio based client.

pub mod ber;
pub mod client;
pub mod error;
pub mod s101;
pub mod tree;
pub mod utils;

pub use ber::{AsnReader, AsnWriter, RelativeOid};
pub use client::{ClientConfig, EmberClient, TreeListener};
pub use error::{Crumb, EmberError, EmberResult, ErrorKind};
pub use tree::{Element, ElementTag, RootElement};
